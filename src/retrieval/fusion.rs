//! Normalizing raw index output into one candidate shape

use crate::embedding::VectorHit;
use crate::retrieval::{Candidate, RetrievalMode};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Malformed candidate at position {position}: no 'chunk' text field in {found}")]
    MalformedCandidate { position: usize, found: String },
}

/// Raw output of one index for one query
#[derive(Debug, Clone)]
pub enum RawResults {
    /// Lexical hits are already plain text
    Lexical(Vec<Candidate>),
    /// Semantic hits carry the chunk inside the store payload
    Semantic(Vec<VectorHit>),
}

impl RawResults {
    pub fn mode(&self) -> RetrievalMode {
        match self {
            Self::Lexical(_) => RetrievalMode::Lexical,
            Self::Semantic(_) => RetrievalMode::Semantic,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Lexical(c) => c.len(),
            Self::Semantic(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Present either index's output as an ordered list of candidates.
///
/// Order and scores are kept as the index produced them; nothing is re-scored
/// or merged across modes. A semantic payload may be a record with a
/// `"chunk"` string field or a bare string.
pub fn normalize(raw: RawResults) -> Result<Vec<Candidate>, FusionError> {
    match raw {
        RawResults::Lexical(candidates) => Ok(candidates),
        RawResults::Semantic(hits) => hits
            .into_iter()
            .enumerate()
            .map(|(position, hit)| semantic_candidate(position, hit))
            .collect(),
    }
}

fn semantic_candidate(position: usize, hit: VectorHit) -> Result<Candidate, FusionError> {
    let text = match &hit.payload {
        Value::String(text) => text.clone(),
        Value::Object(record) => match record.get("chunk") {
            Some(Value::String(text)) => text.clone(),
            _ => return Err(malformed(position, &hit.payload)),
        },
        _ => return Err(malformed(position, &hit.payload)),
    };

    let source = hit
        .payload
        .get("source")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Candidate {
        text,
        score: hit.score,
        source,
    })
}

fn malformed(position: usize, payload: &Value) -> FusionError {
    FusionError::MalformedCandidate {
        position,
        found: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(score: f32, payload: Value) -> VectorHit {
        VectorHit {
            key: format!("k{score}"),
            score,
            payload,
        }
    }

    #[test]
    fn test_lexical_passes_through() {
        let candidates = vec![Candidate {
            text: "plain".to_string(),
            score: 2.5,
            source: None,
        }];
        let raw = RawResults::Lexical(candidates.clone());
        assert_eq!(raw.mode(), RetrievalMode::Lexical);
        assert_eq!(normalize(raw).unwrap(), candidates);
    }

    #[test]
    fn test_semantic_accepts_record_and_string() {
        let raw = RawResults::Semantic(vec![
            hit(0.1, json!({ "chunk": "from record", "source": "doc-a" })),
            hit(0.3, json!("bare string")),
        ]);

        let out = normalize(raw).unwrap();
        assert_eq!(out[0].text, "from record");
        assert_eq!(out[0].source.as_deref(), Some("doc-a"));
        assert_eq!(out[0].score, 0.1);
        assert_eq!(out[1].text, "bare string");
        assert_eq!(out[1].source, None);
    }

    #[test]
    fn test_semantic_keeps_store_order() {
        let raw = RawResults::Semantic(vec![
            hit(0.05, json!({ "chunk": "closest" })),
            hit(0.40, json!({ "chunk": "further" })),
        ]);
        let texts: Vec<String> = normalize(raw).unwrap().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["closest", "further"]);
    }

    #[test]
    fn test_missing_chunk_field_is_malformed() {
        let raw = RawResults::Semantic(vec![
            hit(0.1, json!({ "chunk": "fine" })),
            hit(0.2, json!({ "text": "wrong field" })),
        ]);
        assert!(matches!(
            normalize(raw),
            Err(FusionError::MalformedCandidate { position: 1, .. })
        ));
    }

    #[test]
    fn test_non_string_chunk_is_malformed() {
        let raw = RawResults::Semantic(vec![hit(0.1, json!({ "chunk": 42 }))]);
        assert!(normalize(raw).is_err());
        let raw = RawResults::Semantic(vec![hit(0.1, json!(7))]);
        assert!(normalize(raw).is_err());
    }
}
