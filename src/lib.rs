//! ctxsearch - context search over a document corpus
//!
//! Documents are chunked into a lexical (BM25) index and/or a semantic
//! (embedding) index. A query is answered by one index, its hits are
//! normalized into plain candidates, and a cross-encoder reranks them before
//! the top results are returned.

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod lexical;
pub mod retrieval;
pub mod semantic;

pub use error::{CtxSearchError, Result};
