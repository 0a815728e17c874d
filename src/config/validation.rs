use crate::config::types::{ChunkMethod, Config, RunDefaults, SourceDefinition};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_defaults(&config.run)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_run_defaults(run: &RunDefaults) -> Result<(), ConfigError> {
    if run.workers < 1 || run.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            run.workers
        )));
    }

    if run.rate_limit < 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate-limit must be non-negative, got {}",
            run.rate_limit
        )));
    }

    Ok(())
}

fn validate_sources(sources: &[SourceDefinition]) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for source in sources {
        if source.id.is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !source
            .id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "source id must contain only alphanumeric characters, hyphens, \
                 and underscores, got '{}'",
                source.id
            )));
        }

        if !seen_ids.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        let url = Url::parse(&source.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("source '{}': {}", source.id, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "source '{}': only http and https URLs are supported, got '{}'",
                source.id,
                url.scheme()
            )));
        }

        if source.output.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}': output cannot be empty",
                source.id
            )));
        }

        // Single ignores the cap; every other method needs a positive one.
        if source.chunk_method != ChunkMethod::Single && source.chunk_size < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}': chunk-size must be >= 1 for the {} method",
                source.id, source.chunk_method
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ExtractorConfig;

    fn base_source(id: &str) -> SourceDefinition {
        SourceDefinition {
            id: id.to_string(),
            url: "https://example.com/".to_string(),
            output: format!("{id}.md"),
            chunk_method: ChunkMethod::Recursive,
            chunk_size: 10,
            prompt_file: "default.txt".to_string(),
            enabled: true,
            include_pattern: None,
            exclude_pattern: None,
            content_selector: None,
        }
    }

    fn config_with(sources: Vec<SourceDefinition>) -> Config {
        Config {
            run: RunDefaults::default(),
            extractor: ExtractorConfig::default(),
            sources,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = config_with(vec![base_source("a"), base_source("b")]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = config_with(vec![base_source("a"), base_source("a")]);
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut source = base_source("a");
        source.url = "not a url".to_string();
        let config = config_with(vec![source]);
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_ftp_url_rejected() {
        let mut source = base_source("a");
        source.url = "ftp://example.com/".to_string();
        let config = config_with(vec![source]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected_for_recursive() {
        let mut source = base_source("a");
        source.chunk_size = 0;
        let config = config_with(vec![source]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_chunk_size_allowed_for_single() {
        let mut source = base_source("a");
        source.chunk_method = ChunkMethod::Single;
        source.chunk_size = 0;
        let config = config_with(vec![source]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_excessive_workers_rejected() {
        let mut config = config_with(vec![base_source("a")]);
        config.run.workers = 200;
        assert!(validate(&config).is_err());
    }
}
