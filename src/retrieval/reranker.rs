//! Cross-encoder reranking

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Could not load reranker model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reranking failed: {0}")]
    Scoring(String),
}

/// Scores (query, candidate) pairs jointly. Higher means more relevant; the
/// scale is model specific and not bounded to [0, 1].
pub trait CrossEncoder: Send + Sync {
    /// One score per candidate, in candidate order
    fn score(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

/// FastEmbed cross-encoder
pub struct FastEmbedCrossEncoder {
    model: TextRerank,
    model_name: String,
}

impl FastEmbedCrossEncoder {
    /// Load a reranker model
    ///
    /// # Arguments
    /// * `model_name` - e.g. "BAAI/bge-reranker-base"
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let reranker_model = match model_name {
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            "jinaai/jina-reranker-v1-turbo-en" | "jina-reranker-v1-turbo-en" => {
                RerankerModel::JINARerankerV1TurboEn
            }
            _ => {
                return Err(RerankError::ModelLoad {
                    model: model_name.to_string(),
                    reason: "unsupported model; supported: BAAI/bge-reranker-base, \
                             jinaai/jina-reranker-v1-turbo-en"
                        .to_string(),
                })
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options = RerankInitOptions::new(reranker_model).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options).map_err(|e| RerankError::ModelLoad {
            model: model_name.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!("Successfully loaded reranker model: {}", model_name);

        Ok(Self {
            model,
            model_name: model_name.to_string(),
        })
    }
}

impl CrossEncoder for FastEmbedCrossEncoder {
    fn score(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>, RerankError> {
        let results = self
            .model
            .rerank(query, candidates.to_vec(), false, None)
            .map_err(|e| RerankError::Scoring(e.to_string()))?;

        // fastembed returns hits sorted by score; put them back in input order
        let mut scores = vec![None; candidates.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankError::Scoring(format!("score for unknown candidate {}", result.index))
            })?;
            *slot = Some(result.score);
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| RerankError::Scoring(format!("no score for candidate {i}"))))
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Reorders candidates by cross-encoder relevance and truncates to top-k.
///
/// The underlying scorer is not assumed reentrant: concurrent calls are
/// serialised.
pub struct Reranker {
    scorer: Arc<dyn CrossEncoder>,
    gate: Mutex<()>,
}

impl Reranker {
    /// Load the configured FastEmbed model. Failure is fatal to the caller.
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let scorer = FastEmbedCrossEncoder::new(model_name)?;
        Ok(Self::with_scorer(Arc::new(scorer)))
    }

    /// Wrap an already loaded scorer
    pub fn with_scorer(scorer: Arc<dyn CrossEncoder>) -> Self {
        Self {
            scorer,
            gate: Mutex::new(()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.scorer.model_name()
    }

    /// Rank candidates against the query
    ///
    /// # Returns
    /// Up to `top_k` (candidate index, score) pairs, score descending; equal
    /// scores keep candidate order
    ///
    /// # Errors
    /// `InvalidInput` when the query is blank and there is at least one
    /// candidate. `ContextSearcher::search` with rerank enabled surfaces this
    /// for whitespace-only queries instead of returning results.
    pub fn rank<S: AsRef<str>>(
        &self,
        query: &str,
        candidates: &[S],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let texts: Vec<&str> = candidates.iter().map(AsRef::as_ref).collect();

        let scores = {
            let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.scorer.score(query, &texts)?
        };

        if scores.len() != texts.len() {
            return Err(RerankError::Scoring(format!(
                "Score count mismatch: expected {}, got {}",
                texts.len(),
                scores.len()
            )));
        }
        if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
            return Err(RerankError::Scoring(format!(
                "Non-finite score for candidate {}",
                pos
            )));
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);

        tracing::debug!(
            "Reranked {} candidates with {}, kept {}",
            texts.len(),
            self.model_name(),
            ranked.len()
        );

        Ok(ranked)
    }

    /// Rerank candidate texts, returning the top `top_k` texts and their
    /// scores as parallel lists
    ///
    /// Fails with `InvalidInput` on a blank query, like [`Reranker::rank`].
    pub fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<(Vec<String>, Vec<f32>), RerankError> {
        Ok(self
            .rank(query, candidates, top_k)?
            .into_iter()
            .map(|(i, score)| (candidates[i].clone(), score))
            .unzip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts query words present in the candidate
    struct OverlapScorer;

    impl CrossEncoder for OverlapScorer {
        fn score(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>, RerankError> {
            let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
            Ok(candidates
                .iter()
                .map(|c| {
                    let c = c.to_lowercase();
                    terms.iter().filter(|t| c.contains(t.as_str())).count() as f32
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "overlap"
        }
    }

    struct FailingScorer;

    impl CrossEncoder for FailingScorer {
        fn score(&self, _query: &str, _candidates: &[&str]) -> Result<Vec<f32>, RerankError> {
            Err(RerankError::Scoring("runtime exploded".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    struct ShortScorer;

    impl CrossEncoder for ShortScorer {
        fn score(&self, _query: &str, _candidates: &[&str]) -> Result<Vec<f32>, RerankError> {
            Ok(vec![1.0])
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    fn reranker() -> Reranker {
        Reranker::with_scorer(Arc::new(OverlapScorer))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_candidates() {
        let (texts, scores) = reranker().rerank("anything", &[], 5).unwrap();
        assert!(texts.is_empty());
        assert!(scores.is_empty());

        let (texts, scores) = reranker().rerank("", &[], 0).unwrap();
        assert!(texts.is_empty() && scores.is_empty());
    }

    #[test]
    fn test_full_sort_when_k_exceeds_candidates() {
        let candidates = strings(&["no match", "water boils", "water"]);
        let (texts, scores) = reranker().rerank("water boils", &candidates, 10).unwrap();

        assert_eq!(texts, vec!["water boils", "water", "no match"]);
        assert_eq!(scores, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let candidates = strings(&["a", "b water", "c water boils"]);
        let (texts, scores) = reranker().rerank("water boils", &candidates, 1).unwrap();
        assert_eq!(texts, vec!["c water boils"]);
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn test_ties_are_stable() {
        let candidates = strings(&["first", "second", "third"]);
        let (texts, _) = reranker().rerank("unrelated", &candidates, 3).unwrap();
        assert_eq!(texts, candidates);
    }

    #[test]
    fn test_idempotent() {
        let candidates = strings(&["sky blue", "grass green", "water boils at 100"]);
        let first = reranker().rerank("water 100", &candidates, 3).unwrap();
        let second = reranker().rerank("water 100", &candidates, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_query_rejected() {
        let result = reranker().rerank("   ", &strings(&["x"]), 1);
        assert!(matches!(result, Err(RerankError::InvalidInput(_))));
    }

    #[test]
    fn test_scoring_failure_aborts() {
        let reranker = Reranker::with_scorer(Arc::new(FailingScorer));
        let result = reranker.rerank("q", &strings(&["x", "y"]), 2);
        assert!(matches!(result, Err(RerankError::Scoring(_))));
    }

    #[test]
    fn test_score_count_mismatch_is_error() {
        let reranker = Reranker::with_scorer(Arc::new(ShortScorer));
        assert!(reranker.rank("q", &["x", "y"], 2).is_err());
    }

    #[test]
    fn test_unsupported_model_is_load_error() {
        let result = Reranker::new("BAAI/bge-reranker-large");
        assert!(matches!(result, Err(RerankError::ModelLoad { .. })));
    }

    #[test]
    #[ignore] // Requires model download
    fn test_fastembed_rerank_basic() {
        let reranker = Reranker::new("BAAI/bge-reranker-base").unwrap();

        let candidates = strings(&[
            "Paris is the capital of France.",
            "London is the capital of England.",
            "The weather is nice today.",
        ]);

        let (texts, scores) = reranker
            .rerank("What is the capital of France?", &candidates, 2)
            .unwrap();

        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], candidates[0]);
        assert!(scores[0] >= scores[1]);
    }
}
