//! Search URL construction
//!
//! The crawl engine treats the search URL as an opaque function of the filter
//! and the continuation token. `GovinfoSearchUrl` encodes the portal's
//! advanced-search form: a JSON query document carried as a single path
//! segment under `app/search/`, with the page token used as the page offset.

use crate::search::SearchFilter;
use thiserror::Error;
use url::Url;

/// Errors building a search URL
#[derive(Debug, Error)]
pub enum SearchUrlError {
    #[error("Failed to build search URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Base URL cannot carry a path: {0}")]
    CannotBeABase(String),

    #[error("Unusable page token '{0}'")]
    InvalidToken(String),
}

/// Builds the URL of one search-results page
pub trait SearchUrlBuilder: Send + Sync {
    /// `token` is `None` for the first page
    fn search_url(&self, filter: &SearchFilter, token: Option<&str>)
        -> Result<Url, SearchUrlError>;
}

/// Search URLs for the GovInfo advanced-search UI
#[derive(Debug, Clone, Default)]
pub struct GovinfoSearchUrl;

impl SearchUrlBuilder for GovinfoSearchUrl {
    fn search_url(
        &self,
        filter: &SearchFilter,
        token: Option<&str>,
    ) -> Result<Url, SearchUrlError> {
        let offset: u64 = match token {
            None => 0,
            Some(value) => value
                .parse()
                .map_err(|_| SearchUrlError::InvalidToken(value.to_string()))?,
        };

        let query = format!(
            "collection:({}) AND publishdate:range({},{}) AND naturesuit:({})",
            filter.collection, filter.start_date, filter.end_date, filter.nature_of_suit
        );
        let document = format!(
            r#"{{"query":"{}","offset":{},"pageSize":"{}"}}"#,
            json_escape(&query),
            offset,
            filter.page_size
        );

        let mut url = filter.base_url.join("app/search/")?;
        url.path_segments_mut()
            .map_err(|_| SearchUrlError::CannotBeABase(filter.base_url.to_string()))?
            .pop_if_empty()
            .push(&document);

        Ok(url)
    }
}

fn json_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn filter() -> SearchFilter {
        SearchFilter {
            base_url: Url::parse("https://www.govinfo.gov/").unwrap(),
            collection: "USCOURTS".to_string(),
            nature_of_suit: "Patent".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            page_size: 100,
        }
    }

    #[test]
    fn test_first_page_url() {
        let url = GovinfoSearchUrl.search_url(&filter(), None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.govinfo.gov/app/search/\
             %7B%22query%22:%22collection:(USCOURTS)%20AND%20publishdate:range(2020-01-01,2020-12-31)\
             %20AND%20naturesuit:(Patent)%22,%22offset%22:0,%22pageSize%22:%22100%22%7D"
        );
    }

    #[test]
    fn test_token_becomes_offset() {
        let url = GovinfoSearchUrl.search_url(&filter(), Some("7")).unwrap();
        assert!(url.as_str().contains("%22offset%22:7,"));
    }

    #[test]
    fn test_path_stays_one_segment() {
        let mut f = filter();
        f.nature_of_suit = "Civil Rights/Jobs".to_string();
        let url = GovinfoSearchUrl.search_url(&f, None).unwrap();
        let segments: Vec<_> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(&segments[..2], &["app", "search"]);
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(json_escape(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }

    #[test]
    fn test_non_numeric_token_rejected() {
        let result = GovinfoSearchUrl.search_url(&filter(), Some("abc"));
        assert!(matches!(result, Err(SearchUrlError::InvalidToken(_))));
    }
}
