//! Semantic index: embedded chunks in a vector store collection
//!
//! Embedding and nearest-neighbour search are delegated to the injected
//! [`EmbeddingProvider`] and [`VectorStore`]; this module owns the ingest and
//! query contract around them.

mod contextualize;

pub use contextualize::{
    contextualizer_from_name, ChunkContextualizer, ContextualizeError, NoopContextualizer,
    SourceLabelContextualizer, CONTEXTUALIZERS,
};

use crate::chunking::{Chunk, Chunker, Document};
use crate::embedding::{EmbeddingProvider, VectorHit, VectorStore};
use crate::retrieval::{
    IngestReport, RawResults, RetrievalIndex, RetrievalMode, SearchError, SkipReason,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_COLLECTION: &str = "semantra_contextual";

pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    contextualizer: Arc<dyn ChunkContextualizer>,
    chunker: Chunker,
    collection: String,
    batch_size: usize,
}

impl SemanticIndex {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunker: Chunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            contextualizer: Arc::new(NoopContextualizer),
            chunker,
            collection: collection.into(),
            batch_size: 32,
        }
    }

    pub fn with_contextualizer(mut self, contextualizer: Arc<dyn ChunkContextualizer>) -> Self {
        self.contextualizer = contextualizer;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Number of records in this index's collection
    pub fn len(&self) -> usize {
        self.store.len(&self.collection)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contextualize, embed and store each chunk of `document`.
    ///
    /// Chunks are embedded in batches; if a batch fails, its chunks are retried
    /// one at a time so only the failing ones are skipped.
    pub fn ingest(&self, document: &Document, chunks: &[Chunk]) -> IngestReport {
        let mut report = IngestReport::default();
        let name = document.name();

        let mut rows: Vec<(usize, String)> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.contextualizer.contextualize(document, chunk) {
                Ok(text) if !text.trim().is_empty() => rows.push((chunk.index(), text)),
                Ok(_) => report.skip(
                    name,
                    Some(chunk.index()),
                    SkipReason::Contextualize("rewrite produced empty text".to_string()),
                ),
                Err(e) => report.skip(name, Some(chunk.index()), SkipReason::Contextualize(e.0)),
            }
        }

        for batch in rows.chunks(self.batch_size) {
            for (index, text, vector) in self.embed_rows(name, batch, &mut report) {
                let metadata = json!({ "source": name, "chunk_index": index });
                match self.store.upsert(&self.collection, &vector, &text, metadata) {
                    Ok(_) => report.semantic_chunks += 1,
                    Err(e) => report.skip(name, Some(index), SkipReason::Store(e.to_string())),
                }
            }
        }

        info!(
            "Inserted {} chunks for document '{}' into '{}'",
            report.semantic_chunks, name, self.collection
        );

        report
    }

    fn embed_rows(
        &self,
        name: &str,
        batch: &[(usize, String)],
        report: &mut IngestReport,
    ) -> Vec<(usize, String, Vec<f32>)> {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

        match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == batch.len() => batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|((index, text), vector)| (index, text, vector))
                .collect(),
            outcome => {
                if let Err(e) = outcome {
                    warn!("Batch embedding failed for '{}', retrying per chunk: {}", name, e);
                }

                batch
                    .iter()
                    .filter_map(|(index, text)| match self.embedder.embed(text) {
                        Ok(vector) => Some((*index, text.clone(), vector)),
                        Err(e) => {
                            report.skip(name, Some(*index), SkipReason::Embedding(e.to_string()));
                            None
                        }
                    })
                    .collect()
            }
        }
    }

    /// Nearest chunks to the query, with the store's native scores and order
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<VectorHit>, SearchError> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text)?;
        let hits = self.store.query(&self.collection, &vector, top_k)?;

        debug!(
            "Semantic query on '{}' returned {} hits",
            self.collection,
            hits.len()
        );

        Ok(hits)
    }
}

impl RetrievalIndex for SemanticIndex {
    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Semantic
    }

    fn ingest_document(&self, document: &Document) -> IngestReport {
        let chunks = self.chunker.chunk(document);
        self.ingest(document, &chunks)
    }

    fn query(&self, text: &str, limit: usize) -> Result<RawResults, SearchError> {
        Ok(RawResults::Semantic(SemanticIndex::query(self, text, limit)?))
    }
}
