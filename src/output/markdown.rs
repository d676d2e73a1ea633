//! Markdown run report
//!
//! Renders the summaries of every job in a run as one markdown document:
//! counts per job, how each enumeration ended, and the documents that failed.

use crate::crawler::{CrawlSummary, WalkOutcome};
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed documents listed per job before the list is truncated
const MAX_LISTED_FAILURES: usize = 200;

/// Writes the markdown report for a run
///
/// # Arguments
///
/// * `summaries` - One summary per job, in run order
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_report(summaries: &[CrawlSummary], output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(summaries);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats the summaries of a run as markdown
pub fn format_markdown_report(summaries: &[CrawlSummary]) -> String {
    let mut md = String::new();

    md.push_str("# GovCrawl Run Report\n\n");

    let total = |f: fn(&CrawlSummary) -> u64| summaries.iter().map(f).sum::<u64>();
    md.push_str("## Totals\n\n");
    md.push_str(&format!("- **Jobs**: {}\n", summaries.len()));
    md.push_str(&format!("- **Queued**: {}\n", total(|s| s.enumerated)));
    md.push_str(&format!("- **Downloaded**: {}\n", total(|s| s.succeeded)));
    md.push_str(&format!("- **Already downloaded**: {}\n", total(|s| s.skipped)));
    md.push_str(&format!("- **Failed**: {}\n", total(|s| s.failed)));
    md.push_str(&format!("- **Not attempted**: {}\n\n", total(|s| s.not_attempted)));

    md.push_str("## Jobs\n\n");
    md.push_str("| Filter | Status | Queued | Downloaded | Skipped | Failed | Not attempted |\n");
    md.push_str("|--------|--------|--------|------------|---------|--------|---------------|\n");
    for summary in summaries {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            summary.label,
            summary.status,
            summary.enumerated,
            summary.succeeded,
            summary.skipped,
            summary.failed,
            summary.not_attempted
        ));
    }
    md.push('\n');

    for summary in summaries {
        md.push_str(&format!("### {}\n\n", summary.label));
        md.push_str(&format!("- **Job key**: `{}`\n", summary.job_key));
        md.push_str(&format!("- **Enumeration**: {}\n", summary.enumeration));
        md.push_str(&format!("- **Search pages fetched**: {}\n", summary.pages));
        md.push_str(&format!("- **Replayed from checkpoint**: {}\n", summary.replayed));
        match &summary.resume_token {
            Some(token) => md.push_str(&format!("- **Resume token**: {}\n", token)),
            None => md.push_str("- **Resume token**: (first page)\n"),
        }
        md.push_str(&format!(
            "- **Elapsed**: {:.1} seconds\n\n",
            summary.elapsed.as_secs_f64()
        ));

        if let WalkOutcome::Failed { reason } = &summary.enumeration {
            md.push_str(&format!(
                "> Enumeration stopped early: {}. Rerun to continue from the resume token.\n\n",
                reason
            ));
        }

        if !summary.failures.is_empty() {
            md.push_str("| Document | Case | Reason |\n");
            md.push_str("|----------|------|--------|\n");
            for (doc, reason) in summary.failures.iter().take(MAX_LISTED_FAILURES) {
                md.push_str(&format!(
                    "| `{}` | {} | {} |\n",
                    doc.id,
                    doc.case_number,
                    reason.replace('|', "\\|")
                ));
            }
            if summary.failures.len() > MAX_LISTED_FAILURES {
                md.push_str(&format!(
                    "\n... and {} more\n",
                    summary.failures.len() - MAX_LISTED_FAILURES
                ));
            }
            md.push('\n');
        }
    }

    md
}
