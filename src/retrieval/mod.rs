//! Retrieval & Reranking
//!
//! Queries one index (lexical or semantic), normalizes its hits into a uniform
//! candidate list, and reorders them with a cross-encoder reranker.

mod fusion;
mod ingest;
mod reranker;
mod searcher;

pub use fusion::{normalize, FusionError, RawResults};
pub use ingest::{load_documents, IngestReport, SkipReason, SkippedItem};
pub use reranker::{CrossEncoder, FastEmbedCrossEncoder, RerankError, Reranker};
pub use searcher::{ContextSearcher, SearchError, SearchSettings};

use crate::chunking::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which index answers a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Lexical,
    Semantic,
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "bm25" | "keyword" => Ok(Self::Lexical),
            "semantic" | "embedding" | "vector" => Ok(Self::Semantic),
            other => Err(format!(
                "unknown retrieval mode '{}', expected 'lexical' or 'semantic'",
                other
            )),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => f.write_str("lexical"),
            Self::Semantic => f.write_str("semantic"),
        }
    }
}

/// A single index hit: chunk text with the index's own relevance score.
///
/// Scores from different indices are on different scales and must not be
/// compared with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub score: f32,
    /// Name of the document the chunk came from, when known
    pub source: Option<String>,
}

/// A final result, ordered by descending score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk: String,
    /// Reranker score, or the index score when reranking was skipped
    pub score: f32,
    pub source: Option<String>,
}

/// Search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum number of results
    pub top_k: usize,

    /// Index to query
    pub mode: RetrievalMode,

    /// Reorder candidates with the cross-encoder before truncating
    pub rerank: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize, mode: RetrievalMode) -> Self {
        Self {
            query: query.into(),
            top_k,
            mode,
            rerank: true,
        }
    }

    pub fn without_rerank(mut self) -> Self {
        self.rerank = false;
        self
    }
}

/// Capability shared by the lexical and semantic indices
pub trait RetrievalIndex: Send + Sync {
    fn mode(&self) -> RetrievalMode;

    /// Chunk a document with the index's own policy and register the chunks.
    /// Failures on individual chunks are reported, never raised.
    fn ingest_document(&self, document: &Document) -> IngestReport;

    /// Return up to `limit` raw hits for the query
    fn query(&self, text: &str, limit: usize) -> Result<RawResults, SearchError>;
}
