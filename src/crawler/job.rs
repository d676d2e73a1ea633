//! Crawl job orchestration
//!
//! A `CrawlJob` binds one search filter to its checkpointed `CrawlState`,
//! runs the pagination walker and the download pool concurrently over a
//! bounded queue, and reports a summary once every queued reference has an
//! outcome.

use crate::config::{CheckpointConfig, Config, DocumentKind, RetryConfig, SchedulerConfig};
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher};
use crate::crawler::governor::RateGovernor;
use crate::crawler::scheduler::DownloadScheduler;
use crate::crawler::walker::{PaginationWalker, WalkOutcome, WalkReport};
use crate::search::{GovinfoResultParser, GovinfoSearchUrl, ResultPageParser, SearchFilter, SearchUrlBuilder};
use crate::state::{CrawlState, DocumentRef, ItemOutcome, PageToken, SharedCrawlState};
use crate::storage::{CheckpointStore, DocumentStore, JobStatus, SharedCheckpointStore, StorageResult};
use crate::CrawlError;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const PROGRESS_EVERY: u64 = 100;

/// Collaborators shared by every job of a run
///
/// The governor in particular must be shared so that sequential jobs
/// against the same host keep its spacing.
#[derive(Clone)]
pub struct CrawlDeps {
    pub fetcher: Arc<dyn PageFetcher>,
    pub urls: Arc<dyn SearchUrlBuilder>,
    pub parser: Arc<dyn ResultPageParser>,
    pub governor: Arc<RateGovernor>,
}

impl CrawlDeps {
    /// Live HTTP collaborators for the GovInfo portal
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let fetcher = HttpPageFetcher::from_config(&config.user_agent, &config.fetch)?;
        Ok(Self {
            fetcher: Arc::new(fetcher),
            urls: Arc::new(GovinfoSearchUrl),
            parser: Arc::new(GovinfoResultParser::new(config.search.page_size)),
            governor: Arc::new(RateGovernor::from_config(&config.governor)),
        })
    }
}

/// Final report of one job run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub job_key: String,
    pub label: String,
    pub status: JobStatus,

    /// How the enumeration ended
    pub enumeration: WalkOutcome,

    /// References queued this run (replayed plus newly enumerated)
    pub enumerated: u64,

    /// Of `enumerated`, replayed from the checkpoint
    pub replayed: u64,

    /// Already downloaded, nothing fetched
    pub skipped: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub not_attempted: u64,

    /// Search pages fetched this run
    pub pages: u64,

    /// Failed references with the last failure reason
    pub failures: Vec<(DocumentRef, String)>,

    /// Where enumeration resumes next time
    pub resume_token: Option<PageToken>,

    pub elapsed: Duration,
}

impl CrawlSummary {
    fn new(job_key: String, label: String) -> Self {
        Self {
            job_key,
            label,
            status: JobStatus::Running,
            enumeration: WalkOutcome::Done,
            enumerated: 0,
            replayed: 0,
            skipped: 0,
            succeeded: 0,
            failed: 0,
            not_attempted: 0,
            pages: 0,
            failures: Vec::new(),
            resume_token: None,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, doc: DocumentRef, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Downloaded { .. } => self.succeeded += 1,
            ItemOutcome::AlreadyDownloaded => self.skipped += 1,
            ItemOutcome::Failed { reason, .. } => {
                self.failed += 1;
                self.failures.push((doc, reason));
            }
            ItemOutcome::NotAttempted => self.not_attempted += 1,
        }
    }

    /// Number of references with a terminal outcome
    pub fn accounted(&self) -> u64 {
        self.skipped + self.succeeded + self.failed + self.not_attempted
    }

    /// Every queued reference has exactly one outcome
    pub fn is_balanced(&self) -> bool {
        self.enumerated == self.accounted()
    }
}

/// One filter's crawl: enumerate, download, checkpoint
pub struct CrawlJob {
    filter: SearchFilter,
    deps: CrawlDeps,
    store: Arc<dyn DocumentStore>,
    checkpoints: SharedCheckpointStore,
    retry: RetryConfig,
    scheduler: SchedulerConfig,
    checkpoint: CheckpointConfig,
    kind: DocumentKind,
    fresh: bool,
}

impl CrawlJob {
    /// Creates a job for `filter`
    ///
    /// # Arguments
    ///
    /// * `config` - Retry, scheduler, checkpoint and fetch settings
    /// * `filter` - The search this job enumerates
    /// * `deps` - Fetcher, URL builder, parser and governor
    /// * `store` - Destination for downloaded documents
    /// * `checkpoints` - Where the crawl state is saved and restored
    pub fn new(
        config: &Config,
        filter: SearchFilter,
        deps: CrawlDeps,
        store: Arc<dyn DocumentStore>,
        checkpoints: SharedCheckpointStore,
    ) -> Self {
        Self {
            filter,
            deps,
            store,
            checkpoints,
            retry: config.retry.clone(),
            scheduler: config.scheduler.clone(),
            checkpoint: config.checkpoint.clone(),
            kind: config.fetch.document_kind,
            fresh: false,
        }
    }

    /// Ignore any existing checkpoint for this job
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn job_key(&self) -> String {
        self.filter.job_key()
    }

    /// Loads (or resets) the job's checkpoint
    fn load_state(&self, job_key: &str) -> StorageResult<CrawlState> {
        let mut checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.fresh {
            tracing::info!("Discarding checkpoint for {}", self.filter);
            checkpoints.clear_job(job_key)?;
        }
        checkpoints.register_job(job_key, &self.filter.to_string())?;

        Ok(checkpoints
            .load(job_key)?
            .unwrap_or_else(|| CrawlState::new(job_key)))
    }

    /// Saves a snapshot of the state, including the governor's backoff level
    fn save_checkpoint(&self, state: &SharedCrawlState, status: JobStatus) -> StorageResult<()> {
        state.set_backoff_level(self.deps.governor.level());
        let snapshot = state.snapshot();

        let mut checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        checkpoints.save(&snapshot, status)?;

        tracing::debug!(
            "Checkpoint: {} enumerated, {} downloaded, token {:?}",
            snapshot.seen_count(),
            snapshot.downloaded_count(),
            snapshot.resume_token
        );
        Ok(())
    }

    fn periodic_checkpoint(&self, state: &SharedCrawlState) {
        if let Err(e) = self.save_checkpoint(state, JobStatus::Running) {
            tracing::error!("Failed to save checkpoint: {}", e);
        }
    }

    /// Runs the job until enumeration ends and the queue drains, or until
    /// `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let job_key = self.filter.job_key();
        let mut summary = CrawlSummary::new(job_key.clone(), self.filter.to_string());

        let state = self.load_state(&job_key)?;
        let pending = state.pending();
        if state.seen_count() > 0 || state.resume_token.is_some() {
            tracing::info!(
                "Resuming {}: {} enumerated, {} downloaded, {} pending, token {:?}",
                self.filter,
                state.seen_count(),
                state.downloaded_count(),
                pending.len(),
                state.resume_token
            );
        } else {
            tracing::info!("Starting {} (job {})", self.filter, job_key);
        }

        self.deps.governor.restore_level(state.backoff_level);
        let shared = SharedCrawlState::new(state);
        self.save_checkpoint(&shared, JobStatus::Running)?;

        let workers = self.scheduler.workers.max(1) as usize;
        let capacity = workers * self.scheduler.queue_factor.max(1) as usize;
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        let scheduler = DownloadScheduler::new(
            workers,
            Arc::clone(&self.deps.fetcher),
            Arc::clone(&self.deps.governor),
            Arc::clone(&self.store),
            shared.download_ledger(),
            self.filter.base_url.clone(),
            self.kind,
            self.retry.clone(),
        );
        let scheduler_handle = tokio::spawn(scheduler.run(queue_rx, outcome_tx, cancel.clone()));

        let walker = PaginationWalker::new(
            self.filter.clone(),
            Arc::clone(&self.deps.urls),
            Arc::clone(&self.deps.parser),
            Arc::clone(&self.deps.fetcher),
            Arc::clone(&self.deps.governor),
            shared.seen_ledger(),
            self.retry.clone(),
        );
        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            let replayed = match replay(pending, &queue_tx, &producer_cancel).await {
                Ok(replayed) => replayed,
                Err((replayed, outcome)) => {
                    let report = WalkReport {
                        outcome,
                        emitted: 0,
                        pages: 0,
                    };
                    return (report, replayed);
                }
            };
            (walker.run(queue_tx, producer_cancel).await, replayed)
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(self.checkpoint.every_seconds.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let every_downloads = u64::from(self.checkpoint.every_downloads.max(1));
        let mut since_checkpoint = 0;

        loop {
            tokio::select! {
                item = outcome_rx.recv() => {
                    let Some((doc, outcome)) = item else {
                        break;
                    };
                    let downloaded = matches!(outcome, ItemOutcome::Downloaded { .. });
                    summary.record(doc, outcome);

                    if downloaded {
                        since_checkpoint += 1;
                        if since_checkpoint >= every_downloads {
                            self.periodic_checkpoint(&shared);
                            since_checkpoint = 0;
                        }
                    }

                    if summary.accounted() % PROGRESS_EVERY == 0 {
                        tracing::info!(
                            "Progress: {} done ({} downloaded, {} skipped, {} failed)",
                            summary.accounted(),
                            summary.succeeded,
                            summary.skipped,
                            summary.failed
                        );
                    }
                }
                _ = ticker.tick() => {
                    self.periodic_checkpoint(&shared);
                    since_checkpoint = 0;
                }
            }
        }

        let (report, replayed) = producer.await?;
        scheduler_handle.await?;

        // A walk that finished with every item attempted is complete even if
        // the token fired afterwards
        let finished = report.outcome.is_done() && summary.not_attempted == 0;
        summary.status = if finished {
            JobStatus::Completed
        } else if cancel.is_cancelled() {
            JobStatus::Interrupted
        } else {
            match report.outcome {
                WalkOutcome::Done => JobStatus::Completed,
                WalkOutcome::Failed { .. } => JobStatus::EnumerationFailed,
                WalkOutcome::Cancelled => JobStatus::Interrupted,
            }
        };
        summary.enumeration = report.outcome;
        summary.replayed = replayed;
        summary.enumerated = replayed + report.emitted;
        summary.pages = report.pages;

        self.save_checkpoint(&shared, summary.status)?;
        summary.resume_token = shared.snapshot().resume_token;
        summary.elapsed = started.elapsed();

        if !summary.is_balanced() {
            tracing::warn!(
                "Outcome count mismatch: {} queued, {} accounted",
                summary.enumerated,
                summary.accounted()
            );
        }

        tracing::info!(
            "Job {} {}: {} queued, {} downloaded, {} skipped, {} failed, {} not attempted",
            summary.label,
            summary.status,
            summary.enumerated,
            summary.succeeded,
            summary.skipped,
            summary.failed,
            summary.not_attempted
        );

        Ok(summary)
    }
}

/// Queues references left over from an earlier run
///
/// Returns the number queued; on cancellation or a closed queue, that
/// number together with the enumeration outcome to report.
async fn replay(
    pending: Vec<DocumentRef>,
    queue: &mpsc::Sender<DocumentRef>,
    cancel: &CancellationToken,
) -> Result<u64, (u64, WalkOutcome)> {
    if !pending.is_empty() {
        tracing::info!("Re-queueing {} pending documents", pending.len());
    }

    let mut replayed = 0;
    for doc in pending {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err((replayed, WalkOutcome::Cancelled)),
            sent = queue.send(doc) => {
                if sent.is_err() {
                    let outcome = WalkOutcome::Failed {
                        reason: "download queue closed".to_string(),
                    };
                    return Err((replayed, outcome));
                }
            }
        }
        replayed += 1;
    }
    Ok(replayed)
}
