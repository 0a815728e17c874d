//! Configuration module for llms-gen
//!
//! This module handles loading, parsing, and validating the TOML sources
//! file. A sources file declares one `[[source]]` table per website source
//! plus optional `[run]` and `[extractor]` defaults.
//!
//! # Example
//!
//! ```no_run
//! use llms_gen::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sources.toml")).unwrap();
//! println!("{} sources configured", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_prompt};
pub use types::{
    ChunkMethod, Config, ExtractorConfig, RateLimitScope, RunDefaults, RunOptions,
    SourceDefinition,
};
