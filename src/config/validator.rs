use crate::config::Config;
use crate::embedding::supported_models;
use crate::error::{AtomwireError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate storage settings
        Self::validate_storage(config, &mut errors);

        // Validate source settings
        Self::validate_sources(config, &mut errors);

        // Validate chunking settings
        Self::validate_chunking(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate retrieval settings
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AtomwireError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.meta.schema_version.is_empty() {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                "Schema version cannot be empty",
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_sources(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.sources.file.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "sources.file",
                "Source file path cannot be empty",
            ));
        }

        if config.sources.max_content_chars == Some(0) {
            errors.push(ValidationError::new(
                "sources.max_content_chars",
                "Content cap must be at least 1 character (omit to disable)",
            ));
        }

        for (i, site) in config.sources.sites.iter().enumerate() {
            if site.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("sources.sites[{}]", i),
                    "Site entry cannot be blank",
                ));
            }
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.max_size == 0 {
            errors.push(ValidationError::new(
                "chunking.max_size",
                "Chunk size budget must be at least 1",
            ));
        }

        if let Some(keyword) = &config.chunking.keyword {
            if keyword.trim().is_empty() {
                errors.push(ValidationError::new(
                    "chunking.keyword",
                    "Keyword cannot be blank (omit to disable filtering)",
                ));
            }
            if config.chunking.keyword_min_count == 0 {
                errors.push(ValidationError::new(
                    "chunking.keyword_min_count",
                    "Minimum keyword count must be at least 1",
                ));
            }
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Embedding model cannot be empty",
            ));
        } else if !supported_models().any(|m| m.eq_ignore_ascii_case(&config.embedding.model)) {
            errors.push(ValidationError::new(
                "embedding.model",
                format!(
                    "Unsupported model '{}'. Supported: {}",
                    config.embedding.model,
                    supported_models().collect::<Vec<_>>().join(", ")
                ),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.default_limit == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_limit",
                "Default result limit must be at least 1",
            ));
        }

        if config.retrieval.context_max_chars == 0 {
            errors.push(ValidationError::new(
                "retrieval.context_max_chars",
                "Context budget must be at least 1 character",
            ));
        }
    }
}
