//! Output module for reporting crawl results
//!
//! This module handles:
//! - Printing job summaries at the end of a run
//! - Writing a markdown report of the run
//! - Reading job statistics back from the checkpoint database

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::{load_statistics, print_statistics, JobStatistics};

use crate::crawler::CrawlSummary;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Failed documents printed per job
const MAX_PRINTED_FAILURES: usize = 10;

/// Prints a job summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== {} ===", summary.label);
    println!("  Status: {} (enumeration {})", summary.status, summary.enumeration);
    println!(
        "  Queued: {} ({} replayed from checkpoint, {} search pages)",
        summary.enumerated, summary.replayed, summary.pages
    );
    println!("  Downloaded: {}", summary.succeeded);
    println!("  Already downloaded: {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    println!("  Not attempted: {}", summary.not_attempted);
    if let Some(token) = &summary.resume_token {
        println!("  Resume token: {}", token);
    }
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.failures.is_empty() {
        println!("  Failures:");
        for (doc, reason) in summary.failures.iter().take(MAX_PRINTED_FAILURES) {
            println!("    - {}: {}", doc, reason);
        }
        if summary.failures.len() > MAX_PRINTED_FAILURES {
            println!(
                "    ... and {} more",
                summary.failures.len() - MAX_PRINTED_FAILURES
            );
        }
    }
    println!();
}
