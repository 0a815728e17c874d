use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a sources file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML sources file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the sources file content
///
/// Used to detect configuration changes between runs in diagnostics.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Loads a prompt template from the prompts directory
///
/// Falls back to `default.txt` when the named file does not exist.
pub fn load_prompt(prompt_file: &str, prompts_dir: &Path) -> Result<String, ConfigError> {
    let mut path = prompts_dir.join(prompt_file);
    if !path.exists() {
        tracing::warn!(
            "Prompt file '{}' not found, falling back to default.txt",
            prompt_file
        );
        path = prompts_dir.join("default.txt");
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[run]
workers = 4
rate-limit = 0.5

[[source]]
id = "docs"
url = "https://example.com/docs"
output = "docs.md"
chunk-method = "recursive"
chunk-size = 20
include-pattern = "/docs/**"

[[source]]
id = "glossary"
url = "https://example.com/glossary"
output = "glossary.md"
chunk-method = "alphabetical"
chunk-size = 50
enabled = false
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.workers, 4);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].chunk_method, ChunkMethod::Recursive);
        assert_eq!(config.sources[0].prompt_file, "default.txt");
        assert!(config.sources[0].enabled);
        assert!(!config.sources[1].enabled);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/sources.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_rejects_unknown_chunk_method() {
        let config_content = r#"
[[source]]
id = "bad"
url = "https://example.com/"
output = "bad.md"
chunk-method = "spiral"
chunk-size = 5
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_compute_config_hash_is_stable() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_load_prompt_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.txt"), "Summarize: {content}").unwrap();

        let prompt = load_prompt("missing.txt", dir.path()).unwrap();
        assert_eq!(prompt, "Summarize: {content}");
    }
}
