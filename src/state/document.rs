//! Document references and page tokens
//!
//! These are the values that flow from the pagination walker to the
//! download workers.

use crate::config::DocumentKind;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use url::Url;

/// Errors raised when a document reference cannot be turned into a request
#[derive(Debug, Error)]
pub enum RefError {
    #[error("Malformed document id '{0}': expected <package>/<granule>")]
    Malformed(String),

    #[error("Failed to build document URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A stable reference to one opinion document
///
/// Equality and hashing use the identifier only; the case number and title
/// are carried for logging and output naming.
#[derive(Debug, Clone, Eq)]
pub struct DocumentRef {
    /// Package/granule path, e.g. `USCOURTS-cafc-19-1234/USCOURTS-cafc-19-1234-0`
    pub id: String,

    /// Docket number as shown in the search results
    pub case_number: String,

    /// Case name as shown in the search results
    pub title: String,
}

impl DocumentRef {
    pub fn new(
        id: impl Into<String>,
        case_number: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            case_number: case_number.into(),
            title: title.into(),
        }
    }

    fn split_id(&self) -> Option<(&str, &str)> {
        self.id
            .split_once('/')
            .filter(|(package, granule)| !package.is_empty() && !granule.is_empty())
    }

    /// The package part of the identifier
    pub fn package_id(&self) -> Option<&str> {
        self.split_id().map(|(package, _)| package)
    }

    /// The granule part of the identifier
    pub fn granule_id(&self) -> Option<&str> {
        self.split_id().map(|(_, granule)| granule)
    }

    /// Court code embedded in the granule id (`USCOURTS-<court>-...`)
    pub fn court_code(&self) -> Option<&str> {
        self.granule_id()
            .and_then(|granule| granule.split('-').nth(1))
            .filter(|court| !court.is_empty())
    }

    /// Builds the fetch URL for this document
    ///
    /// * `Pdf` resolves to `content/pkg/{package}/pdf/{granule}.pdf`
    /// * `Mods` resolves to `metadata/granule/{id}/mods.xml`
    pub fn content_url(&self, base: &Url, kind: DocumentKind) -> Result<Url, RefError> {
        let (package, granule) = self
            .split_id()
            .ok_or_else(|| RefError::Malformed(self.id.clone()))?;

        let relative = match kind {
            DocumentKind::Pdf => format!("content/pkg/{}/pdf/{}.pdf", package, granule),
            DocumentKind::Mods => format!("metadata/granule/{}/{}/mods.xml", package, granule),
        };

        Ok(base.join(&relative)?)
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for DocumentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.case_number)
    }
}

/// Continuation cursor returned by a search-results page
///
/// Tokens are opaque: they are never compared, ordered or assumed to be
/// sequential. "Not started" is represented by the absence of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// Cursor for the next page
    Token(String),

    /// No more pages
    End,
}

impl PageToken {
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// The cursor value, if this is not the end sentinel
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Token(value) => Some(value),
            Self::End => None,
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(value) => write!(f, "{}", value),
            Self::End => write!(f, "<end>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_ref() -> DocumentRef {
        DocumentRef::new(
            "USCOURTS-cafc-19-1234/USCOURTS-cafc-19-1234-0",
            "19-1234",
            "Acme Corp. v. Widget Inc.",
        )
    }

    #[test]
    fn test_equality_by_id_only() {
        let a = sample_ref();
        let mut b = sample_ref();
        b.title = "Different title".to_string();
        b.case_number = "other".to_string();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_id_parts() {
        let doc = sample_ref();
        assert_eq!(doc.package_id(), Some("USCOURTS-cafc-19-1234"));
        assert_eq!(doc.granule_id(), Some("USCOURTS-cafc-19-1234-0"));
        assert_eq!(doc.court_code(), Some("cafc"));
    }

    #[test]
    fn test_pdf_url() {
        let base = Url::parse("https://www.govinfo.gov/").unwrap();
        let url = sample_ref().content_url(&base, DocumentKind::Pdf).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.govinfo.gov/content/pkg/USCOURTS-cafc-19-1234/pdf/USCOURTS-cafc-19-1234-0.pdf"
        );
    }

    #[test]
    fn test_mods_url() {
        let base = Url::parse("https://www.govinfo.gov/").unwrap();
        let url = sample_ref().content_url(&base, DocumentKind::Mods).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.govinfo.gov/metadata/granule/USCOURTS-cafc-19-1234/USCOURTS-cafc-19-1234-0/mods.xml"
        );
    }

    #[test]
    fn test_malformed_id() {
        let base = Url::parse("https://www.govinfo.gov/").unwrap();
        for id in ["no-slash", "/granule-only", "package-only/"] {
            let doc = DocumentRef::new(id, "1", "x");
            assert!(matches!(
                doc.content_url(&base, DocumentKind::Pdf),
                Err(RefError::Malformed(_))
            ));
            assert!(doc.court_code().is_none());
        }
    }

    #[test]
    fn test_page_token() {
        let token = PageToken::Token("3".to_string());
        assert!(!token.is_end());
        assert_eq!(token.as_str(), Some("3"));
        assert!(PageToken::End.is_end());
        assert_eq!(PageToken::End.as_str(), None);
    }
}
