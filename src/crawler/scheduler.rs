//! Download worker pool
//!
//! A fixed number of workers pull references from the bounded queue and
//! download them one at a time. Every reference taken off the queue yields
//! exactly one `ItemOutcome` on the outcome channel.

use crate::config::{DocumentKind, RetryConfig};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::governor::RateGovernor;
use crate::crawler::retry_delay;
use crate::state::{DocumentRef, DownloadLedger, FetchOutcome, ItemOutcome, RequestKind};
use crate::storage::DocumentStore;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Channel the workers report terminal outcomes on
pub type OutcomeSender = mpsc::UnboundedSender<(DocumentRef, ItemOutcome)>;

/// Shared, read-only context of every worker
struct WorkerContext {
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    store: Arc<dyn DocumentStore>,
    ledger: DownloadLedger,
    base_url: Url,
    kind: DocumentKind,
    retry: RetryConfig,
}

/// Pool of download workers fed by the bounded queue
pub struct DownloadScheduler {
    workers: usize,
    context: Arc<WorkerContext>,
}

impl DownloadScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workers: usize,
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
        store: Arc<dyn DocumentStore>,
        ledger: DownloadLedger,
        base_url: Url,
        kind: DocumentKind,
        retry: RetryConfig,
    ) -> Self {
        Self {
            workers: workers.max(1),
            context: Arc::new(WorkerContext {
                fetcher,
                governor,
                store,
                ledger,
                base_url,
                kind,
                retry,
            }),
        }
    }

    /// Runs the pool until the queue is closed and empty, or until cancelled
    ///
    /// On cancellation the workers stop taking new items, and whatever is
    /// still queued is reported `NotAttempted`.
    pub async fn run(
        self,
        queue: mpsc::Receiver<DocumentRef>,
        outcomes: OutcomeSender,
        cancel: CancellationToken,
    ) {
        let queue = Arc::new(Mutex::new(queue));

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| {
                let context = Arc::clone(&self.context);
                let queue = Arc::clone(&queue);
                let outcomes = outcomes.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    context.work(worker_id, queue, outcomes, cancel).await;
                })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Download worker panicked: {}", e);
            }
        }

        let mut queue = queue.lock().await;
        queue.close();
        let mut drained = 0;
        while let Ok(doc) = queue.try_recv() {
            let _ = outcomes.send((doc, ItemOutcome::NotAttempted));
            drained += 1;
        }
        if drained > 0 {
            tracing::info!("{} queued documents left for the next run", drained);
        }
    }
}

impl WorkerContext {
    async fn work(
        &self,
        worker_id: usize,
        queue: Arc<Mutex<mpsc::Receiver<DocumentRef>>>,
        outcomes: OutcomeSender,
        cancel: CancellationToken,
    ) {
        loop {
            let next = {
                let mut queue = queue.lock().await;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    doc = queue.recv() => doc,
                }
            };

            let Some(doc) = next else {
                break;
            };

            let outcome = self.download(&doc, &cancel).await;
            match &outcome {
                ItemOutcome::Downloaded { attempts } => {
                    tracing::debug!("Worker {} downloaded {} ({} attempts)", worker_id, doc, attempts)
                }
                ItemOutcome::Failed { reason, attempts } => {
                    tracing::warn!("Failed {} after {} attempts: {}", doc, attempts, reason)
                }
                ItemOutcome::AlreadyDownloaded | ItemOutcome::NotAttempted => {}
            }

            if outcomes.send((doc, outcome)).is_err() {
                break;
            }
        }

        tracing::trace!("Worker {} stopped", worker_id);
    }

    /// Downloads one reference and stores it
    async fn download(&self, doc: &DocumentRef, cancel: &CancellationToken) -> ItemOutcome {
        if self.ledger.is_downloaded(&doc.id) {
            return ItemOutcome::AlreadyDownloaded;
        }

        let url = match doc.content_url(&self.base_url, self.kind) {
            Ok(url) => url,
            Err(e) => {
                return ItemOutcome::Failed {
                    reason: e.to_string(),
                    attempts: 0,
                }
            }
        };

        let max_attempts = self.retry.item_max_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ItemOutcome::NotAttempted,
                _ = self.governor.acquire() => {}
            }

            let outcome = self.fetcher.fetch(url.as_str(), RequestKind::Document).await;
            self.governor.report_outcome(&outcome);

            last_reason = match outcome {
                FetchOutcome::Success {
                    bytes,
                    content_type,
                } => match self.store.store(doc, &bytes, &content_type).await {
                    Ok(()) => {
                        self.ledger.mark_downloaded(&doc.id);
                        return ItemOutcome::Downloaded { attempts: attempt };
                    }
                    Err(e) => format!("store failed: {}", e),
                },
                FetchOutcome::PermanentFailure { reason } => {
                    return ItemOutcome::Failed {
                        reason,
                        attempts: attempt,
                    };
                }
                FetchOutcome::TransientFailure { reason, .. } => reason,
            };

            if attempt < max_attempts {
                let delay = retry_delay(&self.retry, attempt);
                tracing::debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    max_attempts,
                    doc.id,
                    last_reason,
                    delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ItemOutcome::NotAttempted,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        ItemOutcome::Failed {
            reason: last_reason,
            attempts: max_attempts,
        }
    }
}
