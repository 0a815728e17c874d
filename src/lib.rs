//! llms-gen: generates structured text artifacts from website sources
//!
//! This crate crawls configured sources according to a chunking strategy,
//! caches fetched pages, sends page content to an external extraction
//! service, and assembles ordered output documents with cost accounting.

pub mod cache;
pub mod config;
pub mod cost;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod html;
pub mod output;
pub mod pipeline;
pub mod sitemap;
pub mod strategy;

use thiserror::Error;

/// Main error type for llms-gen operations
#[derive(Debug, Error)]
pub enum GenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Resolver error for source '{source_id}': {message}")]
    Resolver { source_id: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for llms-gen operations
pub type Result<T> = std::result::Result<T, GenError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{ChunkMethod, Config, RunOptions, SourceDefinition};
pub use cost::{CostTracker, RunCostSummary};
pub use extract::{ExtractionResult, ExtractionStatus};
pub use strategy::{FetchUnit, Frontier};
