use crate::config::types::{
    CheckpointConfig, Config, FetchConfig, GovernorConfig, OutputConfig, RetryConfig,
    SchedulerConfig, SearchConfig, UserAgentConfig,
};
use crate::ConfigError;
use chrono::NaiveDate;
use url::Url;

/// Page sizes the portal's search UI accepts
pub const ALLOWED_PAGE_SIZES: [u32; 3] = [10, 50, 100];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_governor_config(&config.governor)?;
    validate_retry_config(&config.retry)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_checkpoint_config(&config.checkpoint)?;
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Parses a YYYY-MM-DD date from the config
pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| ConfigError::InvalidDate(format!("'{}': {}", value, e)))
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if config.collection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "collection cannot be empty".to_string(),
        ));
    }

    if config.nature_of_suit.trim().is_empty() {
        return Err(ConfigError::Validation(
            "nature-of-suit cannot be empty".to_string(),
        ));
    }

    let start = parse_date(&config.start_date)?;
    let end = parse_date(&config.end_date)?;
    if start > end {
        return Err(ConfigError::Validation(format!(
            "start-date {} is after end-date {}",
            start, end
        )));
    }

    if !ALLOWED_PAGE_SIZES.contains(&config.page_size) {
        return Err(ConfigError::Validation(format!(
            "page-size must be one of {:?}, got {}",
            ALLOWED_PAGE_SIZES, config.page_size
        )));
    }

    if let Some(window_days) = config.window_days {
        if window_days == 0 {
            return Err(ConfigError::Validation(
                "window-days must be >= 1 when set".to_string(),
            ));
        }

        let range_days = (end - start).num_days() + 1;
        if i64::from(window_days) > range_days {
            return Err(ConfigError::Validation(format!(
                "window-days ({}) exceeds the {}-day date range",
                window_days, range_days
            )));
        }
    }

    Ok(())
}

fn validate_governor_config(config: &GovernorConfig) -> Result<(), ConfigError> {
    if config.base_interval_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "base-interval-ms must be >= 1, got {}",
            config.base_interval_ms
        )));
    }

    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-multiplier must be a finite value >= 1.0, got {}",
            config.backoff_multiplier
        )));
    }

    if config.max_interval_ms < config.base_interval_ms {
        return Err(ConfigError::Validation(format!(
            "max-interval-ms ({}) must be >= base-interval-ms ({})",
            config.max_interval_ms, config.base_interval_ms
        )));
    }

    if config.successes_to_reset < 1 {
        return Err(ConfigError::Validation(
            "successes-to-reset must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.page_max_attempts < 1 {
        return Err(ConfigError::Validation(
            "page-max-attempts must be >= 1".to_string(),
        ));
    }

    if config.item_max_attempts < 1 {
        return Err(ConfigError::Validation(
            "item-max-attempts must be >= 1".to_string(),
        ));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must be >= base-delay-ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.queue_factor < 1 || config.queue_factor > 16 {
        return Err(ConfigError::Validation(format!(
            "queue-factor must be between 1 and 16, got {}",
            config.queue_factor
        )));
    }

    Ok(())
}

fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    if config.every_downloads < 1 {
        return Err(ConfigError::Validation(
            "every-downloads must be >= 1".to_string(),
        ));
    }

    if config.every_seconds < 1 {
        return Err(ConfigError::Validation(
            "every-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs and connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_body_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.download_dir.is_empty() {
        return Err(ConfigError::Validation(
            "download-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
