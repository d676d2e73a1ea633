//! Search-results page parser
//!
//! Turns one rendered results page into the document references it lists
//! and the token of the following page.
//!
//! # GovInfo result markup
//!
//! Every result row carries a share anchor:
//!
//! ```html
//! <a class="displayShare"
//!    addthis:title="19-1234 - Acme Corp. v. Widget Inc."
//!    addthis:url="/app/details/USCOURTS-cafc-19-1234/USCOURTS-cafc-19-1234-0">
//! ```
//!
//! Pagination is a list with an `li.active` item holding the current
//! (1-based) page number and an `li.next` item that is absent or carries the
//! `disabled` class on the last page.

use crate::state::{DocumentRef, PageToken};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// The portal never serves results past this many records
pub const MAX_RESULT_RECORDS: u64 = 10_000;

const DETAILS_PREFIX: &str = "/app/details/";

/// Errors decoding a results page
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Malformed results page: {0}")]
    Malformed(String),
}

/// One decoded results page
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    /// References in page order
    pub refs: Vec<DocumentRef>,

    /// Token of the following page, or `End`
    pub next: PageToken,
}

/// Decodes raw page bytes into references plus continuation state
pub trait ResultPageParser: Send + Sync {
    fn parse(&self, page: &[u8]) -> Result<ParsedPage, ParseError>;
}

/// Parser for GovInfo advanced-search result pages
#[derive(Debug, Clone)]
pub struct GovinfoResultParser {
    page_size: u32,
}

impl GovinfoResultParser {
    pub fn new(page_size: u32) -> Self {
        Self { page_size }
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{}: {:?}", css, e)))
}

impl ResultPageParser for GovinfoResultParser {
    fn parse(&self, page: &[u8]) -> Result<ParsedPage, ParseError> {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);

        let share_selector = selector("a.displayShare")?;
        let refs = document
            .select(&share_selector)
            .filter_map(extract_ref)
            .collect();

        let next = next_token(&document, self.page_size)?;

        Ok(ParsedPage { refs, next })
    }
}

/// Extracts a reference from one share anchor
///
/// Anchors missing either attribute are skipped.
fn extract_ref(anchor: ElementRef<'_>) -> Option<DocumentRef> {
    let element = anchor.value();
    let title_attr = element.attr("addthis:title")?;
    let url_attr = element.attr("addthis:url")?;

    let id = url_attr
        .find(DETAILS_PREFIX)
        .map(|pos| &url_attr[pos + DETAILS_PREFIX.len()..])?
        .split(['?', '#'])
        .next()?
        .trim_end_matches('/');

    if id.is_empty() {
        tracing::debug!("Skipping result without document id: {}", url_attr);
        return None;
    }

    let (case_number, title) = match title_attr.split_once(" - ") {
        Some((number, name)) => (number.trim(), name.trim()),
        None => (title_attr.trim(), ""),
    };

    Some(DocumentRef::new(id, case_number, title))
}

/// Reads the pagination block
fn next_token(document: &Html, page_size: u32) -> Result<PageToken, ParseError> {
    let next_selector = selector("li.next")?;
    let has_next = document
        .select(&next_selector)
        .next()
        .map(|item| !item.value().classes().any(|class| class == "disabled"))
        .unwrap_or(false);

    if !has_next {
        return Ok(PageToken::End);
    }

    let active_selector = selector("li.active")?;
    let active_text = document
        .select(&active_selector)
        .next()
        .map(|item| item.text().collect::<String>())
        .ok_or_else(|| ParseError::Malformed("next page without an active page".to_string()))?;

    let current_page: u64 = active_text.trim().parse().map_err(|_| {
        ParseError::Malformed(format!("active page '{}' is not a number", active_text.trim()))
    })?;

    // The active page is 1-based, offsets are 0-based
    let next_offset = current_page;
    if next_offset.saturating_mul(u64::from(page_size)) >= MAX_RESULT_RECORDS {
        return Ok(PageToken::End);
    }

    Ok(PageToken::Token(next_offset.to_string()))
}
