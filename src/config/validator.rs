use crate::chunking::Chunker;
use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{CtxSearchError, Result, ValidationError};
use crate::retrieval::RetrievalMode;
use crate::semantic::CONTEXTUALIZERS;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_lexical(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_semantic(config, &mut errors);
        Self::validate_reranker(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CtxSearchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.corpus.extensions.is_empty() {
            errors.push(ValidationError::new(
                "corpus.extensions",
                "At least one file extension is required",
            ));
        }

        if config.corpus.extensions.iter().any(|ext| ext.trim().is_empty()) {
            errors.push(ValidationError::new(
                "corpus.extensions",
                "File extensions cannot be empty",
            ));
        }
    }

    fn validate_lexical(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_chunking(
            "lexical",
            &config.lexical.chunk_mode,
            config.lexical.chunk_size,
            errors,
        );

        let k1 = config.lexical.k1;
        if !k1.is_finite() || k1 <= 0.0 {
            errors.push(ValidationError::new(
                "lexical.k1",
                format!("k1 must be greater than 0, got {}", k1),
            ));
        }

        let b = config.lexical.b;
        if !(0.0..=1.0).contains(&b) {
            errors.push(ValidationError::new(
                "lexical.b",
                format!("b must be between 0.0 and 1.0, got {}", b),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_semantic(config: &Config, errors: &mut Vec<ValidationError>) {
        let semantic = &config.semantic;

        Self::validate_chunking("semantic", &semantic.chunk_mode, semantic.chunk_size, errors);

        if semantic.collection.trim().is_empty() {
            errors.push(ValidationError::new(
                "semantic.collection",
                "Collection name cannot be empty",
            ));
        }

        if !CONTEXTUALIZERS.contains(&semantic.contextualizer.as_str()) {
            errors.push(ValidationError::new(
                "semantic.contextualizer",
                format!(
                    "Contextualizer must be one of {:?}, got '{}'",
                    CONTEXTUALIZERS, semantic.contextualizer
                ),
            ));
        }

        for (key, value) in [
            ("semantic.hnsw_m", semantic.hnsw_m),
            ("semantic.hnsw_ef_construction", semantic.hnsw_ef_construction),
            ("semantic.hnsw_ef_search", semantic.hnsw_ef_search),
            ("semantic.max_elements", semantic.max_elements),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(key, "Must be greater than 0"));
            }
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.reranker.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if let Err(message) = retrieval.mode.parse::<RetrievalMode>() {
            errors.push(ValidationError::new("retrieval.mode", message));
        }

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if retrieval.search_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.search_multiplier",
                "Search multiplier must be greater than 0",
            ));
        }
    }

    fn validate_chunking(
        section: &str,
        mode: &str,
        size: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Err(e) = Chunker::from_config(mode, size) {
            errors.push(ValidationError::new(format!("{}.chunk_mode", section), e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(CtxSearchError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_chunk_mode() {
        let mut config = Config::default();
        config.lexical.chunk_mode = "line".to_string();
        assert_eq!(error_paths(&config), vec!["lexical.chunk_mode"]);
    }

    #[test]
    fn test_zero_size_allowed_for_paragraphs_only() {
        let mut config = Config::default();
        config.semantic.chunk_mode = "PARAGRAPH".to_string();
        config.semantic.chunk_size = 0;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.semantic.chunk_mode = "word".to_string();
        assert_eq!(error_paths(&config), vec!["semantic.chunk_mode"]);
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.lexical.b = 1.5;
        config.retrieval.top_k = 0;
        config.retrieval.mode = "fuzzy".to_string();
        config.semantic.contextualizer = "gpt".to_string();

        let paths = error_paths(&config);
        assert_eq!(paths.len(), 4);
        assert!(paths.contains(&"lexical.b".to_string()));
        assert!(paths.contains(&"retrieval.top_k".to_string()));
        assert!(paths.contains(&"retrieval.mode".to_string()));
        assert!(paths.contains(&"semantic.contextualizer".to_string()));
    }
}
