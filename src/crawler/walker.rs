//! Pagination walker
//!
//! Walks the search results of one filter page by page, feeding every new
//! document reference into the download queue. The walker is the only writer
//! of the seen-set and the resume token.

use crate::config::RetryConfig;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::governor::RateGovernor;
use crate::crawler::retry_delay;
use crate::search::{ResultPageParser, SearchFilter, SearchUrlBuilder};
use crate::state::{DocumentRef, FetchOutcome, PageToken, RequestKind, SeenLedger};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How the enumeration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The last page was reached
    Done,

    /// A page could not be fetched or decoded
    Failed { reason: String },

    /// Stopped on request; the resume token points at the unfinished page
    Cancelled,
}

impl WalkOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for WalkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a walk plus what it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    pub outcome: WalkOutcome,

    /// References pushed into the queue
    pub emitted: u64,

    /// Pages fetched and decoded
    pub pages: u64,
}

enum PageFetch {
    Page(Vec<u8>),
    Failed(String),
    Cancelled,
}

/// Enumerates the document references of one search filter
pub struct PaginationWalker {
    filter: SearchFilter,
    urls: Arc<dyn SearchUrlBuilder>,
    parser: Arc<dyn ResultPageParser>,
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    ledger: SeenLedger,
    retry: RetryConfig,
}

impl PaginationWalker {
    pub fn new(
        filter: SearchFilter,
        urls: Arc<dyn SearchUrlBuilder>,
        parser: Arc<dyn ResultPageParser>,
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
        ledger: SeenLedger,
        retry: RetryConfig,
    ) -> Self {
        Self {
            filter,
            urls,
            parser,
            fetcher,
            governor,
            ledger,
            retry,
        }
    }

    /// Walks from the ledger's resume token to the last page
    ///
    /// Pushes suspend while the queue is full. The resume token only
    /// advances after every new reference of a page has been queued.
    pub async fn run(
        self,
        queue: mpsc::Sender<DocumentRef>,
        cancel: CancellationToken,
    ) -> WalkReport {
        let mut report = WalkReport {
            outcome: WalkOutcome::Done,
            emitted: 0,
            pages: 0,
        };
        let mut token = self.ledger.resume_token();

        loop {
            let current = match &token {
                Some(PageToken::End) => {
                    tracing::info!("Enumeration complete for {}", self.filter);
                    report.outcome = WalkOutcome::Done;
                    return report;
                }
                Some(PageToken::Token(value)) => Some(value.clone()),
                None => None,
            };

            if cancel.is_cancelled() {
                report.outcome = WalkOutcome::Cancelled;
                return report;
            }

            let url = match self.urls.search_url(&self.filter, current.as_deref()) {
                Ok(url) => url,
                Err(e) => {
                    report.outcome = WalkOutcome::Failed {
                        reason: e.to_string(),
                    };
                    return report;
                }
            };

            let bytes = match self.fetch_page(url.as_str(), &cancel).await {
                PageFetch::Page(bytes) => bytes,
                PageFetch::Failed(reason) => {
                    tracing::warn!("Search page {} failed: {}", url, reason);
                    report.outcome = WalkOutcome::Failed { reason };
                    return report;
                }
                PageFetch::Cancelled => {
                    report.outcome = WalkOutcome::Cancelled;
                    return report;
                }
            };

            let page = match self.parser.parse(&bytes) {
                Ok(page) => page,
                Err(e) => {
                    let reason = format!("cannot decode {}: {}", url, e);
                    tracing::warn!("{}", reason);
                    report.outcome = WalkOutcome::Failed { reason };
                    return report;
                }
            };
            report.pages += 1;

            let listed = page.refs.len();
            let mut queued = 0;
            for doc in page.refs {
                if self.ledger.contains(&doc.id) {
                    tracing::trace!("Already seen {}", doc.id);
                    continue;
                }

                // Recorded only once queued, so every seen ref has an outcome
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.outcome = WalkOutcome::Cancelled;
                        return report;
                    }
                    permit = queue.reserve() => permit,
                };
                let Ok(permit) = permit else {
                    report.outcome = WalkOutcome::Failed {
                        reason: "download queue closed".to_string(),
                    };
                    return report;
                };
                self.ledger.record(&doc);
                permit.send(doc);
                queued += 1;
                report.emitted += 1;
            }

            tracing::info!(
                "Page {} of {}: {} listed, {} new, next {}",
                current.as_deref().unwrap_or("0"),
                self.filter,
                listed,
                queued,
                page.next
            );

            self.ledger.advance(page.next.clone());
            token = Some(page.next);
        }
    }

    /// Fetches one search page with retries
    async fn fetch_page(&self, url: &str, cancel: &CancellationToken) -> PageFetch {
        let max_attempts = self.retry.page_max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return PageFetch::Cancelled,
                _ = self.governor.acquire() => {}
            }

            let outcome = self.fetcher.fetch(url, RequestKind::SearchPage).await;
            self.governor.report_outcome(&outcome);

            match outcome {
                FetchOutcome::Success { bytes, .. } => return PageFetch::Page(bytes),
                FetchOutcome::PermanentFailure { reason } => return PageFetch::Failed(reason),
                FetchOutcome::TransientFailure { reason, .. } => {
                    last_reason = reason;
                }
            }

            if attempt < max_attempts {
                let delay = retry_delay(&self.retry, attempt);
                tracing::warn!(
                    "Search page attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    max_attempts,
                    last_reason,
                    delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return PageFetch::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        PageFetch::Failed(format!(
            "{} (gave up after {} attempts)",
            last_reason, max_attempts
        ))
    }
}
