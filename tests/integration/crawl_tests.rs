//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the search portal and run whole
//! jobs end-to-end with the live HTTP fetcher, the GovInfo URL builder and
//! result parser, a SQLite checkpoint file, and documents written to disk.

use govcrawl::config::{parse_config, Config};
use govcrawl::crawler::{CrawlDeps, CrawlJob, CrawlSummary};
use govcrawl::search::SearchFilter;
use govcrawl::state::PageToken;
use govcrawl::storage::{
    CheckpointStore, FsDocumentStore, JobStatus, SharedCheckpointStore, SqliteCheckpointStore,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF_BYTES: &[u8] = b"%PDF-1.4 opinion";

/// Creates a test configuration pointing at the mock portal
fn create_test_config(base_url: &str, base_interval_ms: u64, workers: u32) -> Config {
    let toml = format!(
        r#"
[search]
base-url = "{base_url}/"
collection = "USCOURTS"
nature-of-suit = "Patent"
start-date = "2020-01-01"
end-date = "2020-12-31"
page-size = 10

[governor]
base-interval-ms = {base_interval_ms}
backoff-multiplier = 2.0
max-interval-ms = 1000
successes-to-reset = 3

[retry]
page-max-attempts = 2
item-max-attempts = 2
base-delay-ms = 5
max-delay-ms = 20

[scheduler]
workers = {workers}
queue-factor = 2

[checkpoint]
every-downloads = 2
every-seconds = 30

[fetch]
timeout-secs = 5
connect-timeout-secs = 5
max-body-bytes = 1048576
document-kind = "pdf"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "./unused.db"
download-dir = "./unused"
"#
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn doc_id(n: u32) -> String {
    format!("USCOURTS-ded-1_20-cv-{:05}/USCOURTS-ded-1_20-cv-{:05}-0", n, n)
}

fn content_path(n: u32) -> String {
    format!(
        "/content/pkg/USCOURTS-ded-1_20-cv-{:05}/pdf/USCOURTS-ded-1_20-cv-{:05}-0.pdf",
        n, n
    )
}

/// Renders one results page in the portal's markup
fn results_page(docs: &[u32], active_page: u32, has_next: bool) -> String {
    let rows: String = docs
        .iter()
        .map(|n| {
            format!(
                r#"<div class="result"><a class="displayShare" addthis:title="1:20-cv-{:05} - Plaintiff {} v. Defendant" addthis:url="/app/details/{}">Share</a></div>"#,
                n,
                n,
                doc_id(*n)
            )
        })
        .collect();
    let next_class = if has_next { "next" } else { "next disabled" };
    format!(
        r#"<html><body><div id="results">{}</div><ul class="pagination"><li class="active"><a>{}</a></li><li class="{}"><a>Next</a></li></ul></body></html>"#,
        rows, active_page, next_class
    )
}

/// Mounts a results page served for the given page offset
async fn mount_search_page(server: &MockServer, offset: u32, body: String) {
    Mock::given(method("GET"))
        .and(path_regex(format!("^/app/search/.*%22offset%22:{},", offset)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn mount_document(server: &MockServer, n: u32) {
    Mock::given(method("GET"))
        .and(path(content_path(n)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PDF_BYTES, "application/pdf"))
        .mount(server)
        .await;
}

async fn mount_missing_document(server: &MockServer, n: u32) {
    Mock::given(method("GET"))
        .and(path(content_path(n)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Two result pages: documents 1-3, then 4-5
async fn mount_two_page_search(server: &MockServer) {
    mount_search_page(server, 0, results_page(&[1, 2, 3], 1, true)).await;
    mount_search_page(server, 1, results_page(&[4, 5], 2, false)).await;
}

async fn requests_matching(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("Request recording is disabled")
        .iter()
        .filter(|request| request.url.path().starts_with(prefix))
        .count()
}

/// One run's worth of wiring against a temp directory
struct Harness {
    config: Config,
    filter: SearchFilter,
    deps: CrawlDeps,
    checkpoints: SharedCheckpointStore,
    download_dir: PathBuf,
    _dir: TempDir,
}

impl Harness {
    fn new(server: &MockServer, base_interval_ms: u64, workers: u32) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&server.uri(), base_interval_ms, workers);
        let filter = SearchFilter::from_config(&config.search).expect("Invalid filter");
        let deps = CrawlDeps::from_config(&config).expect("Failed to build HTTP client");

        let store = SqliteCheckpointStore::new(&dir.path().join("checkpoints.db"))
            .expect("Failed to open checkpoint database");
        let checkpoints: SharedCheckpointStore = Arc::new(Mutex::new(store));

        let download_dir = dir.path().join("downloads");

        Self {
            config,
            filter,
            deps,
            checkpoints,
            download_dir,
            _dir: dir,
        }
    }

    async fn run_with(&self, fresh: bool, cancel: CancellationToken) -> CrawlSummary {
        let documents = Arc::new(FsDocumentStore::for_job(&self.download_dir, &self.filter));
        CrawlJob::new(
            &self.config,
            self.filter.clone(),
            self.deps.clone(),
            documents,
            self.checkpoints.clone(),
        )
        .fresh(fresh)
        .run(cancel)
        .await
        .expect("Crawl job failed")
    }

    async fn run(&self) -> CrawlSummary {
        self.run_with(false, CancellationToken::new()).await
    }

    /// `{download-dir}/{collection}/{nature}/{job-key}/{court}/{file}`
    fn stored_file(&self, n: u32) -> PathBuf {
        self.download_dir
            .join("USCOURTS")
            .join("Patent")
            .join(self.filter.job_key())
            .join("ded")
            .join(format!("ded-1_20-cv-{:05}-0.pdf", n))
    }
}

fn file_exists(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[tokio::test]
async fn test_full_crawl_downloads_every_document() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;
    for n in 1..=5 {
        mount_document(&server, n).await;
    }

    let harness = Harness::new(&server, 5, 2);
    let summary = harness.run().await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert!(summary.enumeration.is_done());
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.enumerated, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_balanced());
    assert_eq!(summary.resume_token, Some(PageToken::End));

    for n in 1..=5 {
        let stored = harness.stored_file(n);
        assert!(file_exists(&stored), "missing {}", stored.display());
        assert_eq!(std::fs::read(&stored).unwrap(), PDF_BYTES);
    }

    // Each document was fetched exactly once
    assert_eq!(requests_matching(&server, "/content/pkg/").await, 5);
    assert_eq!(requests_matching(&server, "/app/search/").await, 2);

    let checkpoints = harness.checkpoints.lock().unwrap();
    let record = checkpoints
        .get_job(&harness.filter.job_key())
        .unwrap()
        .expect("Job not recorded");
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.enumerated, 5);
    assert_eq!(record.downloaded, 5);
}

#[tokio::test]
async fn test_missing_document_is_reported_once() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;
    for n in [1, 2, 4, 5] {
        mount_document(&server, n).await;
    }
    mount_missing_document(&server, 3).await;

    let harness = Harness::new(&server, 5, 2);
    let summary = harness.run().await;

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert!(summary.is_balanced());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0.id, doc_id(3));

    // A 404 is permanent and is not retried
    assert_eq!(requests_matching(&server, &content_path(3)).await, 1);
    assert!(!file_exists(&harness.stored_file(3)));
}

#[tokio::test]
async fn test_rerun_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;
    for n in [1, 2, 4, 5] {
        mount_document(&server, n).await;
    }
    mount_missing_document(&server, 3).await;

    let harness = Harness::new(&server, 5, 2);
    let first = harness.run().await;
    assert_eq!(first.succeeded, 4);
    assert_eq!(first.failed, 1);

    let second = harness.run().await;

    // Enumeration already reached the last page; only the failed
    // document is queued again
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.pages, 0);
    assert_eq!(second.replayed, 1);
    assert_eq!(second.enumerated, 1);
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.failed, 1);
    assert!(second.is_balanced());

    assert_eq!(requests_matching(&server, "/app/search/").await, 2);
    assert_eq!(requests_matching(&server, "/content/pkg/").await, 6);
    assert_eq!(requests_matching(&server, &content_path(3)).await, 2);
}

#[tokio::test]
async fn test_fresh_run_discards_checkpoint() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;
    for n in 1..=5 {
        mount_document(&server, n).await;
    }

    let harness = Harness::new(&server, 5, 2);
    harness.run().await;

    let summary = harness.run_with(true, CancellationToken::new()).await;
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.replayed, 0);
    assert_eq!(summary.enumerated, 5);
    assert_eq!(summary.succeeded, 5);

    assert_eq!(requests_matching(&server, "/app/search/").await, 4);
    assert_eq!(requests_matching(&server, "/content/pkg/").await, 10);
}

#[tokio::test]
async fn test_requests_are_spaced_by_governor() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;
    for n in 1..=5 {
        mount_document(&server, n).await;
    }

    let base_interval_ms = 40;
    let harness = Harness::new(&server, base_interval_ms, 1);

    let started = Instant::now();
    let summary = harness.run().await;
    let elapsed = started.elapsed();

    assert_eq!(summary.succeeded, 5);

    // Two search pages and five documents pass through one governor; the
    // first grant is immediate, each later one waits a full interval
    let minimum = Duration::from_millis(base_interval_ms * 6);
    assert!(
        elapsed >= minimum,
        "7 requests finished in {:?}, expected at least {:?}",
        elapsed,
        minimum
    );
}

#[tokio::test]
async fn test_search_failure_stops_enumeration() {
    let server = MockServer::start().await;
    mount_search_page(&server, 0, results_page(&[1, 2], 1, true)).await;
    Mock::given(method("GET"))
        .and(path_regex("^/app/search/.*%22offset%22:1,"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    for n in 1..=2 {
        mount_document(&server, n).await;
    }

    let harness = Harness::new(&server, 5, 2);
    let summary = harness.run().await;

    assert_eq!(summary.status, JobStatus::EnumerationFailed);
    assert!(!summary.enumeration.is_done());
    assert_eq!(summary.enumerated, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.resume_token, Some(PageToken::Token("1".to_string())));

    // The failing page was tried page-max-attempts times
    let offset_one = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path().contains("%22offset%22:1,"))
        .count();
    assert_eq!(offset_one, 2);
}

#[tokio::test]
async fn test_cancelled_job_makes_no_requests() {
    let server = MockServer::start().await;
    mount_two_page_search(&server).await;

    let harness = Harness::new(&server, 5, 2);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = harness.run_with(false, cancel).await;

    assert_eq!(summary.status, JobStatus::Interrupted);
    assert_eq!(summary.enumerated, 0);
    assert!(summary.is_balanced());
    assert!(server.received_requests().await.unwrap().is_empty());

    let checkpoints = harness.checkpoints.lock().unwrap();
    let record = checkpoints
        .get_job(&harness.filter.job_key())
        .unwrap()
        .expect("Job not recorded");
    assert_eq!(record.status, JobStatus::Interrupted);
    assert_eq!(record.resume_token, None);
}
