//! Embedding and vector storage collaborators
//!
//! - `EmbeddingProvider` trait, with `FastEmbedProvider` for local embedding
//! - `VectorStore` trait, with `HnswVectorStore` (one HNSW graph per collection)
mod provider;
mod vector_store;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_store::{HnswParams, HnswVectorStore, VectorHit, VectorStore, VectorStoreError};
