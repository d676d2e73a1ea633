use serde::Deserialize;

/// Main configuration structure for govcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub governor: GovernorConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub checkpoint: CheckpointConfig,
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Search filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Portal root, e.g. "https://www.govinfo.gov/"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Portal collection code (court opinions live in "USCOURTS")
    pub collection: String,

    /// Nature-of-suit value to filter on
    #[serde(rename = "nature-of-suit")]
    pub nature_of_suit: String,

    /// First publish date to include (YYYY-MM-DD)
    #[serde(rename = "start-date")]
    pub start_date: String,

    /// Last publish date to include (YYYY-MM-DD)
    #[serde(rename = "end-date")]
    pub end_date: String,

    /// Results per search page (10, 50 or 100)
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Split the date range into windows of this many days, one job each
    #[serde(rename = "window-days", default)]
    pub window_days: Option<u32>,
}

/// Shared host pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GovernorConfig {
    /// Minimum spacing between requests (milliseconds)
    #[serde(rename = "base-interval-ms")]
    pub base_interval_ms: u64,

    /// Growth factor applied per consecutive transient failure
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Ceiling for the backed-off spacing (milliseconds)
    #[serde(rename = "max-interval-ms")]
    pub max_interval_ms: u64,

    /// Consecutive successes needed to drop back to the base spacing
    #[serde(rename = "successes-to-reset")]
    pub successes_to_reset: u32,
}

/// Retry ceilings for search pages and documents
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per search page before the enumeration fails
    #[serde(rename = "page-max-attempts")]
    pub page_max_attempts: u32,

    /// Attempts per document before it is reported as failed
    #[serde(rename = "item-max-attempts")]
    pub item_max_attempts: u32,

    /// First retry delay (milliseconds), doubled per attempt
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single retry delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

/// Download worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of concurrent download workers
    pub workers: u32,

    /// Queue capacity as a multiple of the worker count
    #[serde(rename = "queue-factor")]
    pub queue_factor: u32,
}

/// Checkpoint cadence
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoint after this many successful downloads
    #[serde(rename = "every-downloads")]
    pub every_downloads: u32,

    /// Checkpoint at least this often (seconds)
    #[serde(rename = "every-seconds")]
    pub every_seconds: u64,
}

/// Which artifact to download for each opinion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// The opinion PDF rendition
    Pdf,
    /// The MODS metadata record
    Mods,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Responses larger than this are rejected
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: u64,

    /// Artifact to fetch per document
    #[serde(rename = "document-kind")]
    pub document_kind: DocumentKind,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for downloaded documents
    #[serde(rename = "download-dir")]
    pub download_dir: String,
}
