//! Statistics from the checkpoint database
//!
//! This module provides the `--stats` view: one line of progress per job
//! known to the checkpoint store.

use crate::state::PageToken;
use crate::storage::{CheckpointStore, JobRecord, JobStatus, StorageResult};

/// Progress of one job as recorded at its last checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatistics {
    pub job_key: String,
    pub label: String,
    pub status: JobStatus,

    /// References enumerated so far
    pub enumerated: u64,

    /// References stored so far
    pub downloaded: u64,

    /// Whether the walker reached the last page
    pub enumeration_complete: bool,

    pub resume_token: Option<PageToken>,
    pub backoff_level: u32,
    pub updated_at: String,
}

impl JobStatistics {
    /// Enumerated but not yet downloaded
    pub fn pending(&self) -> u64 {
        self.enumerated.saturating_sub(self.downloaded)
    }
}

impl From<JobRecord> for JobStatistics {
    fn from(record: JobRecord) -> Self {
        Self {
            enumeration_complete: matches!(record.resume_token, Some(PageToken::End)),
            job_key: record.job_key,
            label: record.label,
            status: record.status,
            enumerated: record.enumerated,
            downloaded: record.downloaded,
            resume_token: record.resume_token,
            backoff_level: record.backoff_level,
            updated_at: record.updated_at,
        }
    }
}

/// Loads statistics for every job in the store
///
/// # Arguments
///
/// * `store` - The checkpoint store to query
pub fn load_statistics(store: &dyn CheckpointStore) -> StorageResult<Vec<JobStatistics>> {
    Ok(store
        .list_jobs()?
        .into_iter()
        .map(JobStatistics::from)
        .collect())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[JobStatistics]) {
    println!("=== Crawl Statistics ===\n");

    if stats.is_empty() {
        println!("No jobs recorded yet.");
        return;
    }

    let enumerated: u64 = stats.iter().map(|s| s.enumerated).sum();
    let downloaded: u64 = stats.iter().map(|s| s.downloaded).sum();
    println!("Overview:");
    println!("  Jobs: {}", stats.len());
    println!("  Documents enumerated: {}", enumerated);
    println!("  Documents downloaded: {}", downloaded);
    println!();

    for job in stats {
        println!("{}", job.label);
        println!("  Job key: {}", job.job_key);
        println!("  Status: {}", job.status);
        println!(
            "  Enumerated: {} ({})",
            job.enumerated,
            if job.enumeration_complete {
                "complete"
            } else {
                "in progress"
            }
        );

        let percentage = if job.enumerated > 0 {
            (job.downloaded as f64 / job.enumerated as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  Downloaded: {} ({:.1}%), pending: {}",
            job.downloaded,
            percentage,
            job.pending()
        );

        match &job.resume_token {
            Some(token) => println!("  Resume token: {}", token),
            None => println!("  Resume token: (first page)"),
        }
        if job.backoff_level > 0 {
            println!("  Backoff level: {}", job.backoff_level);
        }
        println!("  Last checkpoint: {}", job.updated_at);
        println!();
    }
}
