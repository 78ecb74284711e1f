//! Ingestion reports and corpus loading
//!
//! Ingestion never aborts a batch because of one bad row: every failure is
//! recorded as a [`SkippedItem`] and processing moves on.

use crate::chunking::Document;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Why a document or chunk was left out of an index
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("unreadable: {0}")]
    Unreadable(String),

    #[error("contextualization failed: {0}")]
    Contextualize(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store rejected chunk: {0}")]
    Store(String),
}

/// A skipped document (`chunk_index` is `None`) or chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub source: String,
    pub chunk_index: Option<usize>,
    pub reason: SkipReason,
}

/// Outcome of ingesting one or more documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents processed
    pub documents: usize,
    /// Chunks added to the lexical index
    pub lexical_chunks: usize,
    /// Chunks added to the semantic index
    pub semantic_chunks: usize,
    pub skipped: Vec<SkippedItem>,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.documents += other.documents;
        self.lexical_chunks += other.lexical_chunks;
        self.semantic_chunks += other.semantic_chunks;
        self.skipped.extend(other.skipped);
    }

    pub fn skip(&mut self, source: &str, chunk_index: Option<usize>, reason: SkipReason) {
        tracing::warn!(
            "Skipping {}{}: {}",
            source,
            chunk_index.map(|i| format!(" chunk {i}")).unwrap_or_default(),
            reason
        );
        self.skipped.push(SkippedItem {
            source: source.to_string(),
            chunk_index,
            reason,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Read every file in `dir` whose extension matches one of `extensions`
/// (case-insensitive, without the dot), sorted by file name. Not recursive.
///
/// Each entry is either a document or the reason the file was skipped.
pub fn load_documents(
    dir: &Path,
    extensions: &[String],
) -> std::io::Result<Vec<Result<Document, SkippedItem>>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        tracing::warn!("No matching files found in {}", dir.display());
    }

    Ok(paths
        .into_iter()
        .map(|path| {
            Document::from_path(&path).map_err(|e| SkippedItem {
                source: path.display().to_string(),
                chunk_index: None,
                reason: SkipReason::Unreadable(e.to_string()),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec!["txt".to_string(), "md".to_string()]
    }

    #[test]
    fn test_load_documents_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), "Second.").unwrap();
        std::fs::write(temp.path().join("a.MD"), "First.").unwrap();
        std::fs::write(temp.path().join("skip.pdf"), "binary").unwrap();
        std::fs::create_dir(temp.path().join("nested.txt")).unwrap();

        let docs: Vec<Document> = load_documents(temp.path(), &exts())
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let names: Vec<&str> = docs.iter().map(Document::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_unreadable_file_is_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("good.txt"), "Fine.").unwrap();
        std::fs::write(temp.path().join("bad.txt"), [0xff, 0xfe, 0xfd]).unwrap();

        let entries = load_documents(temp.path(), &exts()).unwrap();
        assert_eq!(entries.len(), 2);

        let skipped = entries[0].as_ref().unwrap_err();
        assert!(skipped.source.ends_with("bad.txt"));
        assert!(matches!(skipped.reason, SkipReason::Unreadable(_)));
        assert_eq!(entries[1].as_ref().unwrap().name(), "good");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        assert!(load_documents(&temp.path().join("absent"), &exts()).is_err());
    }

    #[test]
    fn test_merge_reports() {
        let mut total = IngestReport {
            documents: 1,
            lexical_chunks: 3,
            ..IngestReport::default()
        };
        let mut other = IngestReport {
            documents: 1,
            semantic_chunks: 2,
            ..IngestReport::default()
        };
        other.skip("doc", Some(4), SkipReason::Embedding("boom".to_string()));

        total.merge(other);
        assert_eq!(total.documents, 2);
        assert_eq!(total.lexical_chunks, 3);
        assert_eq!(total.semantic_chunks, 2);
        assert!(!total.is_clean());
        assert_eq!(total.skipped[0].chunk_index, Some(4));
    }
}
