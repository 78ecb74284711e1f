//! Documents and the chunks derived from them

use std::path::Path;
use std::sync::Arc;

/// A named body of raw text. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Document {
    name: Arc<str>,
    text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            text: text.into(),
        }
    }

    /// Read a document from disk, naming it after the file stem
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the body has no non-whitespace content
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}

/// A contiguous span of a document's text, the unit stored in both indices.
///
/// The chunk refers back to its document by name; it does not own the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    source: Arc<str>,
    index: usize,
    text: String,
}

impl Chunk {
    pub(crate) fn new(source: Arc<str>, index: usize, text: String) -> Self {
        Self {
            source,
            index,
            text,
        }
    }

    /// Name of the owning document
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Zero-based position within the owning document
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_from_path_uses_stem() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("onset-2024.txt");
        std::fs::write(&path, "Monsoon onset over Kerala.").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.name(), "onset-2024");
        assert_eq!(doc.text(), "Monsoon onset over Kerala.");
    }

    #[test]
    fn test_blank_document() {
        assert!(Document::new("empty", "  \n\t ").is_blank());
        assert!(!Document::new("full", " x ").is_blank());
    }
}
