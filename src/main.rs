//! GovCrawl main entry point
//!
//! This is the command-line interface for the GovInfo court-opinion crawler.

use anyhow::{bail, Context};
use clap::Parser;
use govcrawl::config::{load_config_with_hash, Config};
use govcrawl::crawler::{CrawlDeps, CrawlJob, CrawlSummary};
use govcrawl::output::{generate_markdown_report, load_statistics, print_statistics, print_summary};
use govcrawl::search::{GovinfoSearchUrl, SearchFilter, SearchUrlBuilder};
use govcrawl::storage::{open_checkpoint_store, FsDocumentStore, JobStatus, SharedCheckpointStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// GovCrawl: a filtered court-opinion crawler
///
/// GovCrawl enumerates every court opinion that GovInfo's advanced search
/// returns for one nature of suit and publish-date range, downloads each
/// document at a polite pace, and resumes from its last checkpoint when
/// interrupted.
#[derive(Parser, Debug)]
#[command(name = "govcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A filtered court-opinion crawler for GovInfo", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start fresh, discarding the checkpoints of the jobs about to run
    #[arg(long)]
    fresh: bool,

    /// Override the nature of suit from the config file
    #[arg(long, value_name = "NATURE")]
    nature_of_suit: Option<String>,

    /// Validate config and show the jobs that would run without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the checkpoint database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "fresh"])]
    stats: bool,

    /// Write a markdown report of the run to this path
    #[arg(long, value_name = "PATH")]
    export_summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let mut filter = SearchFilter::from_config(&config.search)?;
    if let Some(nature_of_suit) = &cli.nature_of_suit {
        filter = filter.with_nature_of_suit(nature_of_suit.as_str());
    }
    let jobs = match config.search.window_days {
        Some(days) => filter.windows(days),
        None => vec![filter],
    };

    if cli.dry_run {
        handle_dry_run(&config, &jobs)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, jobs, cli.fresh, cli.export_summary.as_deref()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("govcrawl=info,warn"),
            1 => EnvFilter::new("govcrawl=debug,info"),
            2 => EnvFilter::new("govcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the planned jobs
fn handle_dry_run(config: &Config, jobs: &[SearchFilter]) -> anyhow::Result<()> {
    println!("=== GovCrawl Dry Run ===\n");

    println!("Search:");
    println!("  Portal: {}", config.search.base_url);
    println!("  Collection: {}", config.search.collection);
    println!("  Page size: {}", config.search.page_size);
    println!("  Document kind: {:?}", config.fetch.document_kind);

    println!("\nPacing:");
    println!("  Base interval: {}ms", config.governor.base_interval_ms);
    println!(
        "  Backoff: x{} up to {}ms, reset after {} successes",
        config.governor.backoff_multiplier,
        config.governor.max_interval_ms,
        config.governor.successes_to_reset
    );
    println!(
        "  Workers: {} (queue capacity {})",
        config.scheduler.workers,
        config.scheduler.workers * config.scheduler.queue_factor
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Downloads: {}", config.output.download_dir);

    println!("\nJobs ({}):", jobs.len());
    for job in jobs {
        let url = GovinfoSearchUrl.search_url(job, None)?;
        println!("  - {}", job);
        println!("    key: {}", job.job_key());
        println!("    first page: {}", url);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows progress recorded in the checkpoint database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_checkpoint_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation: one job per date window, in order
async fn handle_crawl(
    config: &Config,
    jobs: Vec<SearchFilter>,
    fresh: bool,
    export_summary: Option<&Path>,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous checkpoints)");
    } else {
        tracing::info!("Starting crawl (resuming from checkpoints where present)");
    }

    let store = open_checkpoint_store(Path::new(&config.output.database_path))
        .context("Failed to open checkpoint database")?;
    let checkpoints: SharedCheckpointStore = Arc::new(Mutex::new(store));
    let deps = CrawlDeps::from_config(config).context("Failed to build HTTP client")?;
    let download_dir = PathBuf::from(&config.output.download_dir);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            interrupt.cancel();
        }
    });

    let mut summaries: Vec<CrawlSummary> = Vec::new();
    for filter in jobs {
        if cancel.is_cancelled() {
            break;
        }

        let documents = Arc::new(FsDocumentStore::for_job(&download_dir, &filter));
        let job = CrawlJob::new(config, filter, deps.clone(), documents, checkpoints.clone())
            .fresh(fresh);
        let summary = job.run(cancel.clone()).await?;

        print_summary(&summary);
        summaries.push(summary);
    }

    if let Some(path) = export_summary {
        generate_markdown_report(&summaries, path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("✓ Report written to: {}", path.display());
    }

    if cancel.is_cancelled() {
        bail!("Crawl interrupted; rerun to resume from the last checkpoint");
    }

    let unfinished = summaries
        .iter()
        .filter(|s| s.status == JobStatus::EnumerationFailed)
        .count();
    if unfinished > 0 {
        bail!(
            "{} job(s) stopped before the last search page; rerun to continue",
            unfinished
        );
    }

    tracing::info!("Crawl completed successfully");
    Ok(())
}
