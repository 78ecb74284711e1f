//! Retrieval facade: one entry point for ingest and search

use crate::chunking::Document;
use crate::config::Config;
use crate::embedding::{
    EmbeddingError, EmbeddingProvider, FastEmbedProvider, HnswVectorStore, VectorStoreError,
};
use crate::error::{CtxSearchError, Result};
use crate::lexical::LexicalIndex;
use crate::retrieval::{
    load_documents, normalize, FusionError, IngestReport, RankedResult, RerankError, Reranker,
    RetrievalIndex, RetrievalMode, SearchRequest,
};
use crate::semantic::{contextualizer_from_name, SemanticIndex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector search failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    #[error("No {0} index is configured")]
    IndexUnavailable(RetrievalMode),

    #[error("Reranking was requested but no reranker is loaded")]
    RerankerUnavailable,
}

/// Query defaults and candidate pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub mode: RetrievalMode,
    pub top_k: usize,
    pub rerank: bool,
    pub search_multiplier: usize,
    pub min_candidates: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Semantic,
            top_k: 5,
            rerank: true,
            search_multiplier: 3,
            min_candidates: 10,
        }
    }
}

impl SearchSettings {
    /// Number of candidates to fetch from an index for `top_k` results
    pub fn candidate_pool(&self, top_k: usize) -> usize {
        top_k
            .saturating_mul(self.search_multiplier)
            .max(self.min_candidates)
            .max(top_k)
    }
}

/// Holds the lexical index, optionally a semantic index and a reranker, and
/// routes each request to exactly one index.
pub struct ContextSearcher {
    lexical: LexicalIndex,
    semantic: Option<SemanticIndex>,
    reranker: Option<Reranker>,
    settings: SearchSettings,
}

impl ContextSearcher {
    pub fn new(lexical: LexicalIndex, settings: SearchSettings) -> Self {
        Self {
            lexical,
            semantic: None,
            reranker: None,
            settings,
        }
    }

    pub fn with_semantic(mut self, semantic: SemanticIndex) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build a searcher from configuration, loading only the models needed
    /// to serve `modes` (and the reranker when `rerank` is set).
    ///
    /// Model load failures abort construction.
    pub fn from_config(config: &Config, modes: &[RetrievalMode], rerank: bool) -> Result<Self> {
        let lexical = LexicalIndex::new(config.lexical_chunker()?, config.bm25_params());
        let mut searcher = Self::new(lexical, config.search_settings()?);

        if modes.contains(&RetrievalMode::Semantic) {
            let embedder = FastEmbedProvider::new(&config.embedding.model)?;
            let store = HnswVectorStore::new(embedder.dimension(), config.hnsw_params())?;
            let contextualizer = contextualizer_from_name(&config.semantic.contextualizer)
                .ok_or_else(|| CtxSearchError::InvalidConfigValue {
                    path: "semantic.contextualizer".to_string(),
                    message: format!("Unknown contextualizer '{}'", config.semantic.contextualizer),
                })?;

            let semantic = SemanticIndex::new(
                Arc::new(embedder),
                Arc::new(store),
                config.semantic_chunker()?,
                config.semantic.collection.clone(),
            )
            .with_contextualizer(contextualizer)
            .with_batch_size(config.embedding.batch_size);

            searcher = searcher.with_semantic(semantic);
        }

        if rerank {
            searcher = searcher.with_reranker(Reranker::new(&config.reranker.model)?);
        }

        Ok(searcher)
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn semantic(&self) -> Option<&SemanticIndex> {
        self.semantic.as_ref()
    }

    /// A request for `query` using the configured defaults
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            top_k: self.settings.top_k,
            mode: self.settings.mode,
            rerank: self.settings.rerank,
        }
    }

    fn index(&self, mode: RetrievalMode) -> std::result::Result<&dyn RetrievalIndex, SearchError> {
        match mode {
            RetrievalMode::Lexical => Ok(&self.lexical),
            RetrievalMode::Semantic => self
                .semantic
                .as_ref()
                .map(|index| index as &dyn RetrievalIndex)
                .ok_or(SearchError::IndexUnavailable(mode)),
        }
    }

    /// Register one document in each index named by `modes`
    pub fn ingest(
        &self,
        document: &Document,
        modes: &[RetrievalMode],
    ) -> std::result::Result<IngestReport, SearchError> {
        let mut report = IngestReport {
            documents: 1,
            ..IngestReport::default()
        };

        for &mode in modes {
            report.merge(self.index(mode)?.ingest_document(document));
        }

        Ok(report)
    }

    /// Load every matching file in `dir` and ingest it into the indices named
    /// by `modes`. Unreadable files are reported and skipped.
    pub fn ingest_dir(
        &self,
        dir: &Path,
        extensions: &[String],
        modes: &[RetrievalMode],
    ) -> Result<IngestReport> {
        let entries = load_documents(dir, extensions).map_err(|e| CtxSearchError::Io {
            source: e,
            context: format!("Failed to read corpus directory: {:?}", dir),
        })?;

        let mut report = IngestReport::default();
        for entry in entries {
            match entry {
                Ok(document) => report.merge(self.ingest(&document, modes)?),
                Err(skipped) => {
                    report.skip(&skipped.source, skipped.chunk_index, skipped.reason)
                }
            }
        }

        info!(
            "Ingested {} documents from {}: {} lexical chunks, {} semantic chunks, {} skipped",
            report.documents,
            dir.display(),
            report.lexical_chunks,
            report.semantic_chunks,
            report.skipped.len()
        );

        Ok(report)
    }

    /// Query the selected index, normalize its hits, then rerank or truncate.
    ///
    /// An empty corpus yields an empty list. Any failure along the way is
    /// returned as an error, never as an empty list.
    pub fn search(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<Vec<RankedResult>, SearchError> {
        let index = self.index(request.mode)?;

        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        let pool = if request.rerank {
            self.settings.candidate_pool(request.top_k)
        } else {
            request.top_k
        };

        let raw = index.query(&request.query, pool)?;
        let mut candidates = normalize(raw)?;

        debug!(
            "{} index returned {} candidates for pool of {}",
            request.mode,
            candidates.len(),
            pool
        );

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if !request.rerank {
            candidates.truncate(request.top_k);
            return Ok(candidates
                .into_iter()
                .map(|c| RankedResult {
                    chunk: c.text,
                    score: c.score,
                    source: c.source,
                })
                .collect());
        }

        let reranker = self
            .reranker
            .as_ref()
            .ok_or(SearchError::RerankerUnavailable)?;

        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let ranked = reranker.rank(&request.query, &texts, request.top_k)?;

        Ok(ranked
            .into_iter()
            .map(|(i, score)| {
                let candidate = &candidates[i];
                RankedResult {
                    chunk: candidate.text.clone(),
                    score,
                    source: candidate.source.clone(),
                }
            })
            .collect())
    }
}
