//! BM25 Okapi ranking model over an in-memory corpus

use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};

/// BM25 saturation and length-normalisation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Document length normalisation (0 = none, 1 = full)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Whitespace tokenizer, case-folded. Leading and trailing punctuation is
/// stripped from each token so sentence-final words match bare query terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Default)]
struct DocStats {
    term_freqs: HashMap<String, u32>,
    len: u32,
}

/// Immutable ranking model built from a full corpus snapshot
#[derive(Debug, Default)]
pub(crate) struct Bm25Model {
    params: Bm25Params,
    docs: Vec<DocStats>,
    doc_freqs: HashMap<String, u32>,
    avgdl: f32,
}

impl Bm25Model {
    pub(crate) fn build<'a>(texts: impl IntoIterator<Item = &'a str>, params: Bm25Params) -> Self {
        let mut docs = Vec::new();
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_len: u64 = 0;

        for text in texts {
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            let tokens = tokenize(text);
            let len = tokens.len() as u32;

            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }

            total_len += u64::from(len);
            docs.push(DocStats { term_freqs, len });
        }

        let avgdl = if docs.is_empty() {
            0.0
        } else {
            total_len as f32 / docs.len() as f32
        };

        Self {
            params,
            docs,
            doc_freqs,
            avgdl,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }

    pub(crate) fn vocabulary_size(&self) -> usize {
        self.doc_freqs.len()
    }

    /// Score every document against the query, in corpus order.
    /// Repeated query terms contribute once per occurrence.
    pub(crate) fn scores(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0_f32; self.docs.len()];
        if self.docs.is_empty() || self.avgdl <= 0.0 {
            return scores;
        }

        let n = self.docs.len() as f32;
        let Bm25Params { k1, b } = self.params;

        for term in tokenize(query) {
            let Some(&df) = self.doc_freqs.get(&term) else {
                continue;
            };
            let df = df as f32;
            // IDF: ln((N - df + 0.5) / (df + 0.5) + 1), never negative
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (doc, score) in self.docs.iter().zip(scores.iter_mut()) {
                let Some(&tf) = doc.term_freqs.get(&term) else {
                    continue;
                };
                let tf = tf as f32;
                let dl = doc.len as f32;
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / self.avgdl));
                *score += idf * tf_norm;
            }
        }

        scores
    }
}
