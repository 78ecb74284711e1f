/// Vector store trait and HNSW implementation
use ahash::{HashMap, HashMapExt};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid store parameters: {0}")]
    InvalidParameters(String),
}

/// A nearest-neighbour hit as the store reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    /// Record key assigned at upsert
    pub key: String,
    /// Store-native score. For [`HnswVectorStore`] this is cosine distance:
    /// lower is closer, and hits arrive in ascending order.
    pub score: f32,
    /// Stored payload; carries the chunk text under `"chunk"`
    pub payload: Value,
}

/// Storage collaborator for embedded chunks, partitioned by collection name
pub trait VectorStore: Send + Sync {
    /// Insert or replace a record, returning its key
    fn upsert(
        &self,
        collection: &str,
        vector: &[f32],
        text: &str,
        metadata: Value,
    ) -> Result<String, VectorStoreError>;

    /// Nearest neighbours within one collection, in the store's own ranking order
    fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Number of records in a collection (0 if it does not exist)
    fn len(&self, collection: &str) -> usize;
}

/// HNSW graph parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Connections per layer
    pub m: usize,
    /// Build-time candidate list size (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Query-time candidate list size (higher = better recall, slower search)
    pub ef_search: usize,
    /// Capacity hint for each collection graph
    pub max_elements: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            max_elements: 100_000,
        }
    }
}

const MAX_LAYERS: usize = 16;

struct StoredPoint {
    key: String,
    payload: Value,
}

struct Collection {
    graph: Hnsw<'static, f32, DistCosine>,
    points: Vec<StoredPoint>,
    by_key: HashMap<String, usize>,
}

impl Collection {
    fn new(params: &HnswParams) -> Self {
        Self {
            graph: Hnsw::<f32, DistCosine>::new(
                params.m,
                params.max_elements,
                MAX_LAYERS,
                params.ef_construction,
                DistCosine,
            ),
            points: Vec::new(),
            by_key: HashMap::new(),
        }
    }
}

/// In-process vector store: one HNSW graph per collection, cosine distance.
///
/// Records are keyed by a BLAKE3 hash of (text, metadata). Upserting an
/// existing key replaces its payload; the graph keeps the vector from the
/// first insert, which is identical for a deterministic embedder.
pub struct HnswVectorStore {
    dimension: usize,
    params: HnswParams,
    collections: RwLock<HashMap<String, Collection>>,
}

impl HnswVectorStore {
    pub fn new(dimension: usize, params: HnswParams) -> Result<Self, VectorStoreError> {
        if dimension == 0 || params.m == 0 || params.ef_construction == 0 {
            return Err(VectorStoreError::InvalidParameters(format!(
                "dimension={}, m={}, ef_construction={} must all be positive",
                dimension, params.m, params.ef_construction
            )));
        }

        Ok(Self {
            dimension,
            params,
            collections: RwLock::new(HashMap::new()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Hash text and metadata into a record key (32 hex chars)
    fn record_key(text: &str, metadata: &Value) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        hasher.update(&[0]);
        hasher.update(metadata.to_string().as_bytes());
        format!("{:.32}", hasher.finalize().to_hex())
    }

    fn payload(text: &str, metadata: Value) -> Value {
        match metadata {
            Value::Object(mut map) => {
                map.insert("chunk".to_string(), Value::String(text.to_string()));
                Value::Object(map)
            }
            Value::Null => json!({ "chunk": text }),
            other => json!({ "chunk": text, "metadata": other }),
        }
    }
}

impl VectorStore for HnswVectorStore {
    fn upsert(
        &self,
        collection: &str,
        vector: &[f32],
        text: &str,
        metadata: Value,
    ) -> Result<String, VectorStoreError> {
        self.check_dimension(vector)?;

        let key = Self::record_key(text, &metadata);
        let payload = Self::payload(text, metadata);

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(&self.params));

        if let Some(&id) = entry.by_key.get(&key) {
            entry.points[id].payload = payload;
            tracing::debug!("Upsert replaced payload of {} in '{}'", key, collection);
            return Ok(key);
        }

        let id = entry.points.len();
        let data = vector.to_vec();
        entry.graph.insert((&data, id));
        entry.points.push(StoredPoint {
            key: key.clone(),
            payload,
        });
        entry.by_key.insert(key.clone(), id);

        Ok(key)
    }

    fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.check_dimension(vector)?;

        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        if k == 0 || entry.points.is_empty() {
            return Ok(Vec::new());
        }

        let ef_search = self.params.ef_search.max(k);
        let mut neighbours = entry.graph.search(vector, k, ef_search);
        neighbours.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(neighbours
            .into_iter()
            .filter_map(|n| {
                entry.points.get(n.d_id).map(|point| VectorHit {
                    key: point.key.clone(),
                    score: n.distance,
                    payload: point.payload.clone(),
                })
            })
            .collect())
    }

    fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, |c| c.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIM: usize = 8;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    fn store() -> HnswVectorStore {
        HnswVectorStore::new(DIM, HnswParams::default()).unwrap()
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(HnswVectorStore::new(0, HnswParams::default()).is_err());
        let params = HnswParams {
            m: 0,
            ..HnswParams::default()
        };
        assert!(HnswVectorStore::new(DIM, params).is_err());
    }

    #[test]
    fn test_query_missing_collection_is_empty() {
        let store = store();
        assert!(store.query("nowhere", &axis(0), 3).unwrap().is_empty());
        assert_eq!(store.len("nowhere"), 0);
    }

    #[test]
    fn test_upsert_and_query_ascending_distance() {
        let store = store();
        store
            .upsert("docs", &axis(0), "east", json!({ "source": "a" }))
            .unwrap();
        store
            .upsert("docs", &axis(1), "north", json!({ "source": "a" }))
            .unwrap();
        let mut mostly_east = axis(0);
        mostly_east[1] = 0.2;
        store
            .upsert("docs", &mostly_east, "east by north", json!({ "source": "b" }))
            .unwrap();

        let hits = store.query("docs", &axis(0), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].payload["chunk"], "east");
        assert_eq!(hits[1].payload["chunk"], "east by north");
        assert_eq!(hits[1].payload["source"], "b");
        assert!(hits[0].score <= hits[1].score && hits[1].score <= hits[2].score);
        assert!(hits[0].score.abs() < 1e-4);
    }

    #[test]
    fn test_collections_are_partitioned() {
        let store = store();
        store.upsert("one", &axis(0), "in one", Value::Null).unwrap();
        store.upsert("two", &axis(0), "in two", Value::Null).unwrap();

        let hits = store.query("one", &axis(0), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload["chunk"], "in one");
        assert_eq!(store.len("two"), 1);
    }

    #[test]
    fn test_upsert_same_record_does_not_duplicate() {
        let store = store();
        let first = store
            .upsert("docs", &axis(2), "same", json!({ "source": "a" }))
            .unwrap();
        let second = store
            .upsert("docs", &axis(2), "same", json!({ "source": "a" }))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert_eq!(store.len("docs"), 1);
    }

    #[test]
    fn test_dimension_validation() {
        let store = store();
        let result = store.upsert("docs", &[1.0; 3], "short", Value::Null);
        assert!(matches!(
            result,
            Err(VectorStoreError::InvalidDimension {
                expected: DIM,
                actual: 3
            })
        ));
        assert!(store.query("docs", &[1.0; 3], 1).is_err());
    }

    #[test]
    fn test_non_object_metadata_is_wrapped() {
        let store = store();
        store.upsert("docs", &axis(3), "text", json!("note")).unwrap();
        let hits = store.query("docs", &axis(3), 1).unwrap();
        assert_eq!(hits[0].payload, json!({ "chunk": "text", "metadata": "note" }));
    }
}
