//! Configuration management for ctxsearch
//!
//! Configuration is read from TOML, then environment overrides and an
//! optional named profile are applied, and the result is validated as a
//! whole so every problem is reported at once.

use crate::chunking::{ChunkError, Chunker};
use crate::embedding::HnswParams;
use crate::error::{CtxSearchError, Result};
use crate::lexical::Bm25Params;
use crate::retrieval::{RetrievalMode, SearchSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub lexical: LexicalConfig,
    pub embedding: EmbeddingConfig,
    pub semantic: SemanticConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where documents are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub directory: PathBuf,
    /// File extensions to ingest, without the dot
    pub extensions: Vec<String>,
}

/// Lexical index chunking and BM25 parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    pub chunk_mode: String,
    pub chunk_size: usize,
    pub k1: f32,
    pub b: f32,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Semantic index chunking, collection and HNSW parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    pub chunk_mode: String,
    pub chunk_size: usize,
    pub collection: String,
    /// "none" or "source-label"
    pub contextualizer: String,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_elements: usize,
}

/// Cross-encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub model: String,
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "lexical" or "semantic"
    pub mode: String,
    pub top_k: usize,
    pub rerank: bool,
    /// Candidates fetched per requested result before reranking
    pub search_multiplier: usize,
    /// Lower bound on the candidate pool
    pub min_candidates: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contextualizer: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CtxSearchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CtxSearchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Resolve the configuration the CLI runs with.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present and built-in defaults otherwise.
    pub fn resolve(path: Option<&Path>, profile: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load(&default)?
                } else {
                    tracing::warn!(
                        "No config file at {}, using defaults",
                        default.display()
                    );
                    let mut config = Self::default();
                    config.apply_env_overrides();
                    config
                }
            }
        };

        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }

        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file, stamping `last_modified`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.meta.last_modified = current_timestamp();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CtxSearchError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CtxSearchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self.profiles.get(profile).cloned().ok_or_else(|| {
            CtxSearchError::InvalidConfigValue {
                path: format!("profiles.{}", profile),
                message: "Profile is not defined".to_string(),
            }
        })?;

        if let Some(mode) = overrides.retrieval_mode {
            self.retrieval.mode = mode;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(rerank) = overrides.rerank {
            self.retrieval.rerank = rerank;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(model) = overrides.reranker_model {
            self.reranker.model = model;
        }
        if let Some(contextualizer) = overrides.contextualizer {
            self.semantic.contextualizer = contextualizer;
        }

        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CTXSEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `CTXSEARCH_SECTION__KEY=value` pairs; other keys are ignored
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("CTXSEARCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__DIRECTORY" => self.corpus.directory = PathBuf::from(value),
            "CORPUS__EXTENSIONS" => {
                self.corpus.extensions = value
                    .split(',')
                    .map(|ext| ext.trim().trim_start_matches('.').to_string())
                    .filter(|ext| !ext.is_empty())
                    .collect();
            }
            "LEXICAL__CHUNK_MODE" => self.lexical.chunk_mode = value.to_string(),
            "LEXICAL__CHUNK_SIZE" => self.lexical.chunk_size = parse_value(path, value)?,
            "LEXICAL__K1" => self.lexical.k1 = parse_value(path, value)?,
            "LEXICAL__B" => self.lexical.b = parse_value(path, value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "SEMANTIC__CHUNK_MODE" => self.semantic.chunk_mode = value.to_string(),
            "SEMANTIC__CHUNK_SIZE" => self.semantic.chunk_size = parse_value(path, value)?,
            "SEMANTIC__COLLECTION" => self.semantic.collection = value.to_string(),
            "SEMANTIC__CONTEXTUALIZER" => self.semantic.contextualizer = value.to_string(),
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            "RETRIEVAL__MODE" => self.retrieval.mode = value.to_string(),
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_value(path, value)?,
            "RETRIEVAL__RERANK" => self.retrieval.rerank = parse_value(path, value)?,
            "RETRIEVAL__SEARCH_MULTIPLIER" => {
                self.retrieval.search_multiplier = parse_value(path, value)?
            }
            "RETRIEVAL__MIN_CANDIDATES" => {
                self.retrieval.min_candidates = parse_value(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CtxSearchError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("ctxsearch").join("config.toml"))
    }

    pub fn lexical_chunker(&self) -> std::result::Result<Chunker, ChunkError> {
        Chunker::from_config(&self.lexical.chunk_mode, self.lexical.chunk_size)
    }

    pub fn semantic_chunker(&self) -> std::result::Result<Chunker, ChunkError> {
        Chunker::from_config(&self.semantic.chunk_mode, self.semantic.chunk_size)
    }

    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.lexical.k1,
            b: self.lexical.b,
        }
    }

    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams {
            m: self.semantic.hnsw_m,
            ef_construction: self.semantic.hnsw_ef_construction,
            ef_search: self.semantic.hnsw_ef_search,
            max_elements: self.semantic.max_elements,
        }
    }

    pub fn retrieval_mode(&self) -> Result<RetrievalMode> {
        self.retrieval
            .mode
            .parse()
            .map_err(|message| CtxSearchError::InvalidConfigValue {
                path: "retrieval.mode".to_string(),
                message,
            })
    }

    pub fn search_settings(&self) -> Result<SearchSettings> {
        Ok(SearchSettings {
            mode: self.retrieval_mode()?,
            top_k: self.retrieval.top_k,
            rerank: self.retrieval.rerank,
            search_multiplier: self.retrieval.search_multiplier,
            min_candidates: self.retrieval.min_candidates,
        })
    }
}

fn parse_value<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CtxSearchError::InvalidConfigValue {
            path: path.to_string(),
            message: format!(
                "Cannot parse '{}' as {}",
                value,
                std::any::type_name::<T>()
            ),
        })
}

impl Default for Config {
    fn default() -> Self {
        let hnsw = HnswParams::default();
        let bm25 = Bm25Params::default();

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            corpus: CorpusConfig {
                directory: PathBuf::from("documents"),
                extensions: vec!["txt".to_string(), "md".to_string()],
            },
            lexical: LexicalConfig {
                chunk_mode: "sentence".to_string(),
                chunk_size: 1,
                k1: bm25.k1,
                b: bm25.b,
            },
            embedding: EmbeddingConfig {
                model: "bge-small-en-v1.5".to_string(),
                batch_size: 32,
            },
            semantic: SemanticConfig {
                chunk_mode: "sentence".to_string(),
                chunk_size: 2,
                collection: crate::semantic::DEFAULT_COLLECTION.to_string(),
                contextualizer: "none".to_string(),
                hnsw_m: hnsw.m,
                hnsw_ef_construction: hnsw.ef_construction,
                hnsw_ef_search: hnsw.ef_search,
                max_elements: hnsw.max_elements,
            },
            reranker: RerankerConfig {
                model: "BAAI/bge-reranker-base".to_string(),
            },
            retrieval: RetrievalConfig {
                mode: "semantic".to_string(),
                top_k: 5,
                rerank: true,
                search_multiplier: 3,
                min_candidates: 10,
            },
            profiles: HashMap::new(),
        }
    }
}
