//! Crawler module for enumerating and downloading documents
//!
//! This module contains the crawl engine, including:
//! - HTTP fetching with response classification
//! - Host-wide pacing and adaptive backoff
//! - Search-result pagination
//! - The download worker pool
//! - Job orchestration with checkpointing

mod fetcher;
mod governor;
mod job;
mod scheduler;
mod walker;

pub use fetcher::{build_http_client, HttpPageFetcher, PageFetcher};
pub use governor::{GovernorFeedback, RateGovernor};
pub use job::{CrawlDeps, CrawlJob, CrawlSummary};
pub use scheduler::DownloadScheduler;
pub use walker::{PaginationWalker, WalkOutcome, WalkReport};

use crate::config::RetryConfig;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based)
///
/// Doubles from `base-delay-ms` and is capped at `max-delay-ms`.
pub(crate) fn retry_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let millis = retry
        .base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.max_delay_ms);
    Duration::from_millis(millis)
}
