//! Search module: what to ask the portal and how to read its answers
//!
//! - `SearchFilter`: the immutable query scoping one crawl job
//! - `SearchUrlBuilder`: filter + page token → results-page URL
//! - `ResultPageParser`: results-page bytes → document references + next token

mod filter;
mod parser;
mod url;

pub use self::url::{GovinfoSearchUrl, SearchUrlBuilder, SearchUrlError};
pub use filter::SearchFilter;
pub use parser::{GovinfoResultParser, ParseError, ParsedPage, ResultPageParser, MAX_RESULT_RECORDS};
