use crate::config::{parse_date, SearchConfig};
use crate::ConfigError;
use chrono::{Duration, NaiveDate};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Query parameters scoping one crawl job
///
/// Immutable once built; every job is bound to exactly one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    /// Portal root, always ending in '/'
    pub base_url: Url,

    /// Collection code, e.g. "USCOURTS"
    pub collection: String,

    /// Nature-of-suit value
    pub nature_of_suit: String,

    /// First publish date included
    pub start_date: NaiveDate,

    /// Last publish date included
    pub end_date: NaiveDate,

    /// Results per page
    pub page_size: u32,
}

impl SearchFilter {
    /// Builds a filter from the `[search]` config section
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            collection: config.collection.clone(),
            nature_of_suit: config.nature_of_suit.clone(),
            start_date: parse_date(&config.start_date)?,
            end_date: parse_date(&config.end_date)?,
            page_size: config.page_size,
        })
    }

    /// Returns a copy of this filter for another nature of suit
    pub fn with_nature_of_suit(&self, nature_of_suit: impl Into<String>) -> Self {
        Self {
            nature_of_suit: nature_of_suit.into(),
            ..self.clone()
        }
    }

    /// Stable key identifying this filter's checkpoint and output folder
    pub fn job_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}-{}-{}-{}",
                self.collection, self.nature_of_suit, self.start_date, self.end_date
            )
            .as_bytes(),
        );
        hex::encode(hasher.finalize())
    }

    /// Splits the publish-date range into windows of `span_days`
    ///
    /// Windows are produced newest first, walking backward from the end
    /// date; the oldest window absorbs the remainder. A span reaching past
    /// the end date (or the calendar) yields the filter itself.
    pub fn windows(&self, span_days: u32) -> Vec<SearchFilter> {
        let span = Duration::days(i64::from(span_days.max(1)));
        let day = Duration::days(1);
        let stop = match self.start_date.checked_add_signed(span) {
            Some(stop) if stop < self.end_date => stop,
            _ => return vec![self.clone()],
        };

        // end > stop keeps every subtraction below at or after start_date
        let mut windows = Vec::new();
        let mut end = self.end_date;
        while end > stop {
            let current = end - span;
            windows.push(self.with_dates(current, end));
            end = current - day;
        }
        windows.push(self.with_dates(self.start_date, end));
        windows
    }

    fn with_dates(&self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            ..self.clone()
        }
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {}..{}",
            self.collection, self.nature_of_suit, self.start_date, self.end_date
        )
    }
}
