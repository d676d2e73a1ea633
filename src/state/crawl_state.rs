use crate::state::{DocumentRef, PageToken};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Tracks the progress of one crawl job
///
/// This is the record a job checkpoints and resumes from. It holds every
/// reference the walker has emitted (in emission order), the identifiers
/// already stored, the continuation token to resume enumeration from, and
/// the rate governor's backoff level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlState {
    /// Key of the job this state belongs to
    pub job_key: String,

    /// Token of the next page to fetch; `None` until the first page is done
    pub resume_token: Option<PageToken>,

    /// Rate governor backoff level at the last checkpoint
    pub backoff_level: u32,

    /// References emitted by the walker, in emission order
    enumerated: Vec<DocumentRef>,

    /// Identifiers in `enumerated`
    seen: HashSet<String>,

    /// Identifiers acknowledged by the document store
    downloaded: HashSet<String>,
}

impl CrawlState {
    /// Creates an empty state for a fresh job
    pub fn new(job_key: impl Into<String>) -> Self {
        Self {
            job_key: job_key.into(),
            ..Self::default()
        }
    }

    /// Rebuilds a state from checkpointed parts
    pub fn from_parts(
        job_key: impl Into<String>,
        enumerated: Vec<DocumentRef>,
        downloaded: impl IntoIterator<Item = String>,
        resume_token: Option<PageToken>,
        backoff_level: u32,
    ) -> Self {
        let mut state = Self::new(job_key);
        for doc in enumerated {
            state.record_seen(doc);
        }
        state.downloaded = downloaded.into_iter().collect();
        state.resume_token = resume_token;
        state.backoff_level = backoff_level;
        state
    }

    /// Records a reference as seen
    ///
    /// Returns false (and records nothing) if the identifier was already seen.
    pub fn record_seen(&mut self, doc: DocumentRef) -> bool {
        if !self.seen.insert(doc.id.clone()) {
            return false;
        }
        self.enumerated.push(doc);
        true
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Marks an identifier as stored; returns false if it already was
    pub fn mark_downloaded(&mut self, id: &str) -> bool {
        self.downloaded.insert(id.to_string())
    }

    pub fn is_downloaded(&self, id: &str) -> bool {
        self.downloaded.contains(id)
    }

    /// Records the continuation token of the last fully processed page
    pub fn advance_token(&mut self, token: PageToken) {
        self.resume_token = Some(token);
    }

    /// All emitted references, in emission order
    pub fn enumerated(&self) -> &[DocumentRef] {
        &self.enumerated
    }

    /// Identifiers acknowledged by the document store
    pub fn downloaded_ids(&self) -> impl Iterator<Item = &str> {
        self.downloaded.iter().map(String::as_str)
    }

    /// References enumerated but not yet downloaded, in emission order
    pub fn pending(&self) -> Vec<DocumentRef> {
        self.enumerated
            .iter()
            .filter(|doc| !self.downloaded.contains(&doc.id))
            .cloned()
            .collect()
    }

    pub fn seen_count(&self) -> usize {
        self.enumerated.len()
    }

    pub fn downloaded_count(&self) -> usize {
        self.downloaded.len()
    }

    /// Whether the walker reached the last page
    pub fn is_enumeration_complete(&self) -> bool {
        matches!(self.resume_token, Some(PageToken::End))
    }

    /// Whether every enumerated reference has been downloaded
    pub fn is_complete(&self) -> bool {
        self.is_enumeration_complete()
            && self
                .enumerated
                .iter()
                .all(|doc| self.downloaded.contains(&doc.id))
    }
}

fn lock(inner: &Mutex<CrawlState>) -> MutexGuard<'_, CrawlState> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A crawl state shared between a job and its tasks
///
/// The job is the writer of record: it takes snapshots for checkpoints and
/// hands out narrow ledgers to the walker and the download workers. Every
/// ledger call holds the lock for a single step.
#[derive(Debug, Clone)]
pub struct SharedCrawlState {
    inner: Arc<Mutex<CrawlState>>,
}

impl SharedCrawlState {
    pub fn new(state: CrawlState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Copies the current state (for checkpoints and summaries)
    pub fn snapshot(&self) -> CrawlState {
        lock(&self.inner).clone()
    }

    pub fn set_backoff_level(&self, level: u32) {
        lock(&self.inner).backoff_level = level;
    }

    /// Handle for the pagination walker
    pub fn seen_ledger(&self) -> SeenLedger {
        SeenLedger {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Handle for the download workers
    pub fn download_ledger(&self) -> DownloadLedger {
        DownloadLedger {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Append-only view of the seen-set plus the resume token
#[derive(Debug, Clone)]
pub struct SeenLedger {
    inner: Arc<Mutex<CrawlState>>,
}

impl SeenLedger {
    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner).is_seen(id)
    }

    /// Records a reference; false if it was already seen
    pub fn record(&self, doc: &DocumentRef) -> bool {
        let mut state = lock(&self.inner);
        if state.is_seen(&doc.id) {
            return false;
        }
        state.record_seen(doc.clone())
    }

    pub fn resume_token(&self) -> Option<PageToken> {
        lock(&self.inner).resume_token.clone()
    }

    pub fn advance(&self, token: PageToken) {
        lock(&self.inner).advance_token(token);
    }
}

/// View of the downloaded-set used by download workers
#[derive(Debug, Clone)]
pub struct DownloadLedger {
    inner: Arc<Mutex<CrawlState>>,
}

impl DownloadLedger {
    pub fn is_downloaded(&self, id: &str) -> bool {
        lock(&self.inner).is_downloaded(id)
    }

    pub fn mark_downloaded(&self, id: &str) -> bool {
        lock(&self.inner).mark_downloaded(id)
    }
}
