//! In-memory lexical index with BM25 ranking
//!
//! Every ingest appends to the corpus and rebuilds the ranking model over the
//! whole corpus. The model is swapped in behind an `Arc`, so queries never
//! observe a half-built model and never block on a rebuild.

mod bm25;

pub use bm25::{tokenize, Bm25Params};

use crate::chunking::{Chunk, Chunker, Document};
use crate::retrieval::{
    Candidate, IngestReport, RawResults, RetrievalIndex, RetrievalMode, SearchError,
};
use bm25::Bm25Model;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Snapshot {
    corpus: Vec<Chunk>,
    model: Bm25Model,
}

/// Lexical index over chunk text
pub struct LexicalIndex {
    params: Bm25Params,
    chunker: Chunker,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Serialises writers so concurrent ingests cannot drop each other's chunks
    writer: Mutex<()>,
}

impl LexicalIndex {
    pub fn new(chunker: Chunker, params: Bm25Params) -> Self {
        Self {
            params,
            chunker,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        }
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Append chunks to the corpus and rebuild the ranking model
    pub fn ingest(&self, chunks: &[Chunk]) {
        if chunks.is_empty() {
            return;
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();

        let mut corpus = current.corpus.clone();
        corpus.extend_from_slice(chunks);
        let model = Bm25Model::build(corpus.iter().map(Chunk::text), self.params);

        info!(
            "Lexical index rebuilt: {} chunks, {} terms",
            model.len(),
            model.vocabulary_size()
        );

        let next = Arc::new(Snapshot { corpus, model });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Rank every chunk against the query and return the best `top_n`.
    ///
    /// Ties keep insertion order. An empty corpus yields an empty result.
    pub fn query(&self, text: &str, top_n: usize) -> Vec<Candidate> {
        let snapshot = self.current();
        if snapshot.corpus.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, f32)> = snapshot
            .model
            .scores(text)
            .into_iter()
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_n);

        debug!(
            "Lexical query scored {} chunks, returning {}",
            snapshot.corpus.len(),
            ranked.len()
        );

        ranked
            .into_iter()
            .map(|(i, score)| {
                let chunk = &snapshot.corpus[i];
                Candidate {
                    text: chunk.text().to_string(),
                    score,
                    source: Some(chunk.source().to_string()),
                }
            })
            .collect()
    }

    /// Number of chunks in the corpus
    pub fn len(&self) -> usize {
        self.current().corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct terms seen so far
    pub fn vocabulary_size(&self) -> usize {
        self.current().model.vocabulary_size()
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RetrievalIndex for LexicalIndex {
    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Lexical
    }

    fn ingest_document(&self, document: &Document) -> IngestReport {
        let chunks = self.chunker.chunk(document);
        self.ingest(&chunks);

        IngestReport {
            lexical_chunks: chunks.len(),
            ..IngestReport::default()
        }
    }

    fn query(&self, text: &str, limit: usize) -> Result<RawResults, SearchError> {
        Ok(RawResults::Lexical(LexicalIndex::query(self, text, limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMode;

    fn index() -> LexicalIndex {
        LexicalIndex::new(
            Chunker::new(ChunkMode::Sentence, 1).unwrap(),
            Bm25Params::default(),
        )
    }

    fn texts(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = index();
        assert!(index.is_empty());
        assert!(index.query("anything", 10).is_empty());
    }

    #[test]
    fn test_single_chunk_exact_query_ranks_first() {
        let index = index();
        index.ingest_document(&Document::new("doc", "Monsoon onset over Kerala."));

        let results = index.query("Monsoon onset over Kerala.", 5);
        assert_eq!(texts(&results), vec!["Monsoon onset over Kerala."]);
        assert_eq!(results[0].source.as_deref(), Some("doc"));
    }

    #[test]
    fn test_boils_water_scenario() {
        let index = index();
        let report = index.ingest_document(&Document::new(
            "facts",
            "The sky is blue. Grass is green. Water boils at 100 degrees.",
        ));
        assert_eq!(report.lexical_chunks, 3);

        let results = index.query("boils water", 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "Water boils at 100 degrees.");
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_sentence_final_word_ranks_its_chunk_first() {
        let index = index();
        index.ingest_document(&Document::new("colors", "The sky is blue. Grass is green."));

        let results = index.query("green", 2);
        assert_eq!(texts(&results), vec!["Grass is green.", "The sky is blue."]);
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index();
        index.ingest_document(&Document::new("a", "First chunk. Second chunk. Third chunk."));

        let results = index.query("unrelated", 10);
        assert_eq!(
            texts(&results),
            vec!["First chunk.", "Second chunk.", "Third chunk."]
        );
        assert!(results.iter().all(|c| c.score == 0.0));
    }

    #[test]
    fn test_top_n_truncates() {
        let index = index();
        index.ingest_document(&Document::new("a", "One thing. Two things. Three things. Four things."));
        let results = index.query("two", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "Two things.");
    }

    #[test]
    fn test_vocabulary_grows_across_ingests() {
        let index = index();
        index.ingest_document(&Document::new("a", "alpha beta."));
        let before = index.vocabulary_size();

        index.ingest_document(&Document::new("b", "gamma delta."));
        assert!(index.vocabulary_size() > before);
        assert_eq!(index.len(), 2);

        let results = index.query("gamma", 1);
        assert_eq!(results[0].source.as_deref(), Some("b"));
    }

    #[test]
    fn test_blank_document_ingests_nothing() {
        let index = index();
        let report = index.ingest_document(&Document::new("blank", "   \n\n  "));
        assert_eq!(report.lexical_chunks, 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_concurrent_readers_during_ingest() {
        let index = Arc::new(index());
        index.ingest_document(&Document::new("seed", "seed sentence."));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        index.ingest_document(&Document::new(format!("d{i}"), "more text."));
                    } else {
                        assert!(!index.query("seed", 5).is_empty());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(index.len(), 3);
    }
}
