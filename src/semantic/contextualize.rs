//! Chunk contextualization before embedding
//!
//! A contextualizer may rewrite a chunk using its whole document so the
//! embedded text stands on its own. LLM-backed rewriting lives outside this
//! crate; the built-in implementations are deterministic.

use crate::chunking::{Chunk, Document};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ContextualizeError(pub String);

pub trait ChunkContextualizer: Send + Sync {
    /// Text to embed and store for `chunk`
    fn contextualize(&self, document: &Document, chunk: &Chunk) -> Result<String, ContextualizeError>;
}

/// Stores chunks verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContextualizer;

impl ChunkContextualizer for NoopContextualizer {
    fn contextualize(&self, _document: &Document, chunk: &Chunk) -> Result<String, ContextualizeError> {
        Ok(chunk.text().to_string())
    }
}

/// Prefixes each chunk with its document and position: `[name - Chunk i] text`
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLabelContextualizer;

impl ChunkContextualizer for SourceLabelContextualizer {
    fn contextualize(&self, document: &Document, chunk: &Chunk) -> Result<String, ContextualizeError> {
        Ok(format!(
            "[{} - Chunk {}] {}",
            document.name(),
            chunk.index(),
            chunk.text()
        ))
    }
}

/// Names accepted by [`contextualizer_from_name`]
pub const CONTEXTUALIZERS: [&str; 2] = ["none", "source-label"];

pub fn contextualizer_from_name(name: &str) -> Option<Arc<dyn ChunkContextualizer>> {
    match name {
        "none" => Some(Arc::new(NoopContextualizer)),
        "source-label" => Some(Arc::new(SourceLabelContextualizer)),
        _ => None,
    }
}
