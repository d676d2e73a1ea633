//! Outcome definitions for fetches and documents
//!
//! A fetch outcome classifies a single network request; an item outcome is
//! the terminal result recorded for one document reference.

use std::fmt;
use std::time::Duration;

/// What a request is for, used for logging and size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A search-results page
    SearchPage,

    /// A document payload
    Document,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchPage => write!(f, "search page"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Response body was received in full
    Success {
        /// Response body
        bytes: Vec<u8>,
        /// Content-Type header value (empty when absent)
        content_type: String,
    },

    /// Retry later, possibly after backoff (timeouts, resets, 429, 5xx)
    TransientFailure {
        /// Failure description
        reason: String,
        /// Server-requested delay from a Retry-After header
        retry_after: Option<Duration>,
    },

    /// Do not retry (404, 410, malformed URL, oversized body)
    PermanentFailure {
        /// Failure description
        reason: String,
    },
}

impl FetchOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::TransientFailure {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::PermanentFailure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }
}

/// Terminal outcome for one document reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Fetched and acknowledged by the document store
    Downloaded { attempts: u32 },

    /// Already marked downloaded in the crawl state; nothing fetched
    AlreadyDownloaded,

    /// Permanent failure, or transient failures past the retry budget
    Failed { reason: String, attempts: u32 },

    /// Not finished because the job was cancelled; retried on resume
    NotAttempted,
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
