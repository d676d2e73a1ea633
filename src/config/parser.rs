use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use govcrawl::config::load_config;
///
/// let config = load_config(Path::new("govcrawl.toml")).unwrap();
/// println!("Workers: {}", config.scheduler.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be matched to the configuration they used.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[search]
base-url = "https://www.govinfo.gov/"
collection = "USCOURTS"
nature-of-suit = "Patent"
start-date = "2020-01-01"
end-date = "2020-12-31"
page-size = 100

[governor]
base-interval-ms = 1000
backoff-multiplier = 2.0
max-interval-ms = 60000
successes-to-reset = 5

[retry]
page-max-attempts = 5
item-max-attempts = 3
base-delay-ms = 500
max-delay-ms = 30000

[scheduler]
workers = 4
queue-factor = 2

[checkpoint]
every-downloads = 25
every-seconds = 30

[fetch]
timeout-secs = 30
connect-timeout-secs = 10
max-body-bytes = 52428800
document-kind = "pdf"

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./govcrawl.db"
download-dir = "./downloads"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(SAMPLE_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.search.nature_of_suit, "Patent");
        assert_eq!(config.search.page_size, 100);
        assert_eq!(config.search.window_days, None);
        assert_eq!(config.governor.base_interval_ms, 1000);
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.fetch.document_kind, DocumentKind::Pdf);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
    }

    #[test]
    fn test_window_days_is_optional() {
        let content = SAMPLE_CONFIG.replace("page-size = 100", "page-size = 100\nwindow-days = 90");
        let config = parse_config(&content).unwrap();
        assert_eq!(config.search.window_days, Some(90));
    }

    #[test]
    fn test_missing_knob_is_rejected() {
        // Crawl-behaviour knobs have no silent defaults
        let content = SAMPLE_CONFIG.replace("successes-to-reset = 5\n", "");
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/govcrawl.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = SAMPLE_CONFIG.replace("workers = 4", "workers = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
