//! Storage traits and error types
//!
//! This module defines the trait interfaces for the two persistence
//! collaborators of a crawl job: the checkpoint store (resume state) and the
//! document store (downloaded payloads).

use crate::state::{CrawlState, DocumentRef, PageToken};
use crate::storage::JobStatus;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt checkpoint for job {job_key}: {message}")]
    Corrupt { job_key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for checkpoint operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while storing a downloaded document
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot derive a file name for {0}")]
    InvalidRef(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary row for one job in the checkpoint store
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_key: String,
    pub label: String,
    pub status: JobStatus,
    pub resume_token: Option<PageToken>,
    pub backoff_level: u32,
    pub enumerated: u64,
    pub downloaded: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// Trait for checkpoint store implementations
///
/// A checkpoint is a complete snapshot of a job's `CrawlState`; a job can be
/// rebuilt from `load` alone.
pub trait CheckpointStore: Send {
    /// Registers a job, keeping any existing checkpoint
    ///
    /// # Arguments
    ///
    /// * `job_key` - The job's stable key
    /// * `label` - Human-readable description of the job's filter
    fn register_job(&mut self, job_key: &str, label: &str) -> StorageResult<()>;

    /// Persists a snapshot of the state with the job's current status
    fn save(&mut self, state: &CrawlState, status: JobStatus) -> StorageResult<()>;

    /// Loads the last checkpoint for a job, if any
    fn load(&self, job_key: &str) -> StorageResult<Option<CrawlState>>;

    /// Gets the summary row for a job
    fn get_job(&self, job_key: &str) -> StorageResult<Option<JobRecord>>;

    /// Lists all known jobs, most recently updated first
    fn list_jobs(&self) -> StorageResult<Vec<JobRecord>>;

    /// Drops a job's checkpoint (for fresh starts)
    fn clear_job(&mut self, job_key: &str) -> StorageResult<()>;
}

/// Storage collaborator for downloaded documents
///
/// `store` must only return `Ok` once the bytes are durably written; the
/// download workers mark a reference downloaded on that acknowledgement.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn store(
        &self,
        doc: &DocumentRef,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;
}
