//! State module for tracking crawl progress
//!
//! This module provides the values that move through a crawl and the
//! per-job record that is checkpointed between runs.
//!
//! # Components
//!
//! - `DocumentRef` / `PageToken`: what the walker emits and resumes from
//! - `FetchOutcome` / `ItemOutcome`: per-request and per-document results
//! - `CrawlState`: seen-set, downloaded-set, resume token, backoff level
//! - `SeenLedger` / `DownloadLedger`: narrow handles onto a shared `CrawlState`

mod crawl_state;
mod document;
mod outcome;

// Re-export main types
pub use crawl_state::{CrawlState, DownloadLedger, SeenLedger, SharedCrawlState};
pub use document::{DocumentRef, PageToken, RefError};
pub use outcome::{FetchOutcome, ItemOutcome, RequestKind};
