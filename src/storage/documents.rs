//! Filesystem document store
//!
//! Documents land under one directory per job, grouped by court:
//!
//! ```text
//! {download-dir}/{collection}/{nature-of-suit}/{job-key}/{court}/{granule}.{ext}
//! ```
//!
//! Writes go to a `.part` file first and are renamed into place, so a file
//! with the final name is always complete.

use crate::search::SearchFilter;
use crate::state::DocumentRef;
use crate::storage::traits::{DocumentStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const UNKNOWN_COURT: &str = "unknown";

/// Stores documents as plain files
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    collection: String,
}

impl FsDocumentStore {
    /// Creates a store writing directly under `root`
    pub fn new(root: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            collection: collection.into(),
        }
    }

    /// Creates the store for one job's filter
    pub fn for_job(download_dir: &Path, filter: &SearchFilter) -> Self {
        let root = download_dir
            .join(sanitize(&filter.collection))
            .join(sanitize(&filter.nature_of_suit))
            .join(filter.job_key());
        Self::new(root, filter.collection.clone())
    }

    /// Final path of a document with the given content type
    pub fn path_for(&self, doc: &DocumentRef, content_type: &str) -> Result<PathBuf, StoreError> {
        let granule = doc
            .granule_id()
            .ok_or_else(|| StoreError::InvalidRef(doc.id.clone()))?;

        let prefix = format!("{}-", self.collection);
        let stem = granule.strip_prefix(&prefix).unwrap_or(granule);
        let stem = sanitize(stem);
        if stem.is_empty() {
            return Err(StoreError::InvalidRef(doc.id.clone()));
        }

        let court = doc.court_code().map(sanitize).unwrap_or_default();
        let court = if court.is_empty() {
            UNKNOWN_COURT.to_string()
        } else {
            court
        };

        Ok(self
            .root
            .join(court)
            .join(format!("{}.{}", stem, extension_for(content_type))))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn store(
        &self,
        doc: &DocumentRef,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(doc, content_type)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!("Stored {} ({} bytes) at {}", doc.id, bytes.len(), path.display());
        Ok(())
    }
}

/// File extension for a response content type
fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.ends_with("/pdf") {
        "pdf"
    } else if mime.ends_with("/xml") || mime.ends_with("+xml") {
        "xml"
    } else if mime == "text/html" {
        "html"
    } else {
        "bin"
    }
}

/// Keeps a path component to a safe character set
fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentRef {
        DocumentRef::new(
            "USCOURTS-cafc-19-1234/USCOURTS-cafc-19-1234-0",
            "19-1234",
            "Acme Corp. v. Widget Inc.",
        )
    }

    #[test]
    fn test_path_layout() {
        let store = FsDocumentStore::new("/data/job", "USCOURTS");
        let path = store.path_for(&doc(), "application/pdf").unwrap();
        assert_eq!(path, PathBuf::from("/data/job/cafc/cafc-19-1234-0.pdf"));
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("application/xml; charset=utf-8"), "xml");
        assert_eq!(extension_for("application/mods+xml"), "xml");
        assert_eq!(extension_for("text/html"), "html");
        assert_eq!(extension_for(""), "bin");
    }

    #[test]
    fn test_unknown_court() {
        let store = FsDocumentStore::new("/data", "USCOURTS");
        let doc = DocumentRef::new("PKG/GRANULE", "1", "A v. B");
        let path = store.path_for(&doc, "application/pdf").unwrap();
        assert_eq!(path, PathBuf::from("/data/unknown/GRANULE.pdf"));
    }

    #[test]
    fn test_id_without_granule_is_rejected() {
        let store = FsDocumentStore::new("/data", "USCOURTS");
        let doc = DocumentRef::new("PKG-ONLY", "1", "A v. B");
        assert!(matches!(
            store.path_for(&doc, "application/pdf"),
            Err(StoreError::InvalidRef(_))
        ));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Civil Rights/Jobs"), "Civil_Rights_Jobs");
        assert_eq!(sanitize(".."), "");
    }

    #[tokio::test]
    async fn test_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path(), "USCOURTS");

        store.store(&doc(), b"%PDF-1.4", "application/pdf").await.unwrap();

        let path = dir.path().join("cafc").join("cafc-19-1234-0.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!dir.path().join("cafc").join("cafc-19-1234-0.pdf.part").exists());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path(), "USCOURTS");

        store.store(&doc(), b"old", "application/pdf").await.unwrap();
        store.store(&doc(), b"new", "application/pdf").await.unwrap();

        let path = store.path_for(&doc(), "application/pdf").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }
}
