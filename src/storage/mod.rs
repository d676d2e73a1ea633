//! Storage module for persisting crawl progress and documents
//!
//! This module handles:
//! - SQLite checkpoint database initialization and schema management
//! - Saving and restoring `CrawlState` snapshots per job
//! - Writing downloaded documents to disk

mod documents;
mod schema;
mod sqlite;
mod traits;

pub use documents::FsDocumentStore;
pub use sqlite::SqliteCheckpointStore;
pub use traits::{
    CheckpointStore, DocumentStore, JobRecord, StorageError, StorageResult, StoreError,
};

use crate::CrawlError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Checkpoint store shared between a job and its caller
pub type SharedCheckpointStore = Arc<Mutex<dyn CheckpointStore>>;

/// Opens (or creates) the checkpoint database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_checkpoint_store(path: &Path) -> Result<SqliteCheckpointStore, CrawlError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteCheckpointStore::new(path)
}

/// Status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Interrupted,
    EnumerationFailed,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::EnumerationFailed => "enumeration_failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "enumeration_failed" => Some(Self::EnumerationFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for status in &[
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Interrupted,
            JobStatus::EnumerationFailed,
        ] {
            let db_str = status.to_db_string();
            let parsed = JobStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_job_status_invalid() {
        assert_eq!(JobStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let store = open_checkpoint_store(&path);
        assert!(store.is_ok());
        assert!(path.exists());
    }
}
