//! HTTP fetcher implementation
//!
//! This module performs every outbound request of a crawl job:
//! - Building the HTTP client with the crawler's user agent string
//! - GET requests for search pages and documents
//! - Classifying responses into success, transient or permanent failure
//!
//! The fetcher never retries and never waits; retry policy belongs to the
//! walker and the download workers, pacing to the rate governor.
//!
//! # Classification
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | HTTP 2xx | Success |
//! | HTTP 408, 429, 5xx | Transient (with `Retry-After` if sent) |
//! | HTTP 404, 410, other 4xx | Permanent |
//! | Timeout, connection or body error | Transient |
//! | Malformed URL, redirect loop | Permanent |
//! | Body larger than `max-body-bytes` | Permanent |

use crate::config::{FetchConfig, UserAgentConfig};
use crate::state::{FetchOutcome, RequestKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Performs a single request and classifies the result
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, kind: RequestKind) -> FetchOutcome;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `agent` - The user agent configuration
/// * `fetch` - Timeouts for each request
///
/// # Example
///
/// ```no_run
/// use govcrawl::config::{DocumentKind, FetchConfig, UserAgentConfig};
/// use govcrawl::crawler::build_http_client;
///
/// let agent = UserAgentConfig {
///     crawler_name: "GovCrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
/// let fetch = FetchConfig {
///     timeout_secs: 30,
///     connect_timeout_secs: 10,
///     max_body_bytes: 50 * 1024 * 1024,
///     document_kind: DocumentKind::Pdf,
/// };
///
/// let client = build_http_client(&agent, &fetch).unwrap();
/// ```
pub fn build_http_client(
    agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        agent.crawler_name, agent.crawler_version, agent.contact_url, agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageFetcher` over a reqwest client
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl HttpPageFetcher {
    pub fn new(client: Client, max_body_bytes: u64) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Builds the client from configuration
    pub fn from_config(
        agent: &UserAgentConfig,
        fetch: &FetchConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(agent, fetch)?,
            fetch.max_body_bytes,
        ))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, kind: RequestKind) -> FetchOutcome {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return FetchOutcome::permanent(format!("malformed URL {}: {}", url, e)),
        };

        tracing::trace!("GET {} ({})", parsed, kind);

        let mut response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            return classify_status(status, response.headers());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes {
                return FetchOutcome::permanent(format!(
                    "body of {} bytes exceeds limit of {}",
                    length, self.max_body_bytes
                ));
            }
        }

        let mut bytes = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if (bytes.len() + chunk.len()) as u64 > self.max_body_bytes {
                        return FetchOutcome::permanent(format!(
                            "body exceeds limit of {} bytes",
                            self.max_body_bytes
                        ));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => return classify_error(&e),
            }
        }

        FetchOutcome::Success {
            bytes,
            content_type,
        }
    }
}

/// Maps a non-success status code to an outcome
fn classify_status(status: StatusCode, headers: &HeaderMap) -> FetchOutcome {
    let reason = format!("HTTP {}", status.as_u16());

    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        return FetchOutcome::TransientFailure {
            reason,
            retry_after: parse_retry_after(headers),
        };
    }

    if status.is_client_error() || status.is_redirection() {
        return FetchOutcome::permanent(reason);
    }

    FetchOutcome::transient(reason)
}

/// Maps a transport error to an outcome
fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_builder() || error.is_redirect() {
        FetchOutcome::permanent(error.to_string())
    } else if error.is_timeout() {
        FetchOutcome::transient("request timeout")
    } else if error.is_connect() {
        FetchOutcome::transient(format!("connection failed: {}", error))
    } else {
        FetchOutcome::transient(error.to_string())
    }
}

/// Reads `Retry-After` as delta-seconds or an HTTP date
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
