use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for llms-gen
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunDefaults,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default, rename = "source")]
    pub sources: Vec<SourceDefinition>,
}

impl Config {
    /// Returns the enabled sources, optionally restricted to a set of ids
    pub fn selected_sources(&self, only: Option<&[String]>) -> Vec<&SourceDefinition> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| match only {
                Some(ids) => ids.iter().any(|id| id == &s.id),
                None => true,
            })
            .collect()
    }
}

/// The chunking strategy that turns a source into an ordered set of
/// fetch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    Single,
    Paginated,
    Recursive,
    Alphabetical,
    Sitemap,
}

impl ChunkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Paginated => "paginated",
            Self::Recursive => "recursive",
            Self::Alphabetical => "alphabetical",
            Self::Sitemap => "sitemap",
        }
    }
}

impl std::fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single configured website source
///
/// Immutable once loaded; the id must be unique across the run.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier for this source
    pub id: String,

    /// Root URL (or sitemap URL for the sitemap method)
    pub url: String,

    /// Output file name (e.g., "products.md")
    pub output: String,

    /// Chunking strategy for this source
    #[serde(rename = "chunk-method")]
    pub chunk_method: ChunkMethod,

    /// Maximum number of fetch units this source may produce
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Prompt template file name, resolved against the prompts directory
    #[serde(rename = "prompt-file", default = "default_prompt_file")]
    pub prompt_file: String,

    /// Whether this source is processed at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Glob pattern(s) for URLs to include, separated by `|`
    #[serde(rename = "include-pattern")]
    pub include_pattern: Option<String>,

    /// Glob pattern(s) for URLs to exclude, separated by `|`
    #[serde(rename = "exclude-pattern")]
    pub exclude_pattern: Option<String>,

    /// CSS selector narrowing pages to their main content region
    #[serde(rename = "content-selector")]
    pub content_selector: Option<String>,
}

fn default_prompt_file() -> String {
    "default.txt".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Whether the fetch rate limit is tracked per host or across all hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitScope {
    PerHost,
    Global,
}

/// Run defaults declared in the `[run]` table
///
/// Command-line flags override these values; the resolved set is carried in
/// [`RunOptions`].
#[derive(Debug, Clone, Deserialize)]
pub struct RunDefaults {
    /// Number of parallel workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Delay between network fetches, in seconds
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Rate limit scope: per-host or global
    #[serde(rename = "rate-limit-scope", default = "default_scope")]
    pub rate_limit_scope: RateLimitScope,
}

fn default_workers() -> usize {
    2
}

fn default_rate_limit() -> f64 {
    1.0
}

fn default_scope() -> RateLimitScope {
    RateLimitScope::Global
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rate_limit: default_rate_limit(),
            rate_limit_scope: default_scope(),
        }
    }
}

/// Extraction service configuration from the `[extractor]` table
///
/// The API key itself is never stored in the config file; it is read from
/// the environment variable named by `api_key_env`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Base URL of the chat-completions style endpoint
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum prompt length in characters before truncation
    #[serde(rename = "max-content-length", default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Retry ceiling for transient extraction failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_content_length() -> usize {
    100_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_api_key_env() -> String {
    "LLMS_GEN_API_KEY".to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_content_length: default_max_content_length(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Resolved run options consumed by the orchestrator
///
/// Built by the binary from `[run]` defaults plus command-line flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of parallel workers (forced to 1 when `parallel` is false)
    pub workers: usize,

    /// Minimum interval between network fetches
    pub rate_limit: Duration,

    /// Rate limit scope: per-host or global
    pub rate_limit_scope: RateLimitScope,

    /// Whether units are processed concurrently at all
    pub parallel: bool,

    /// Bypass cache reads (cache is still written after network fetches)
    pub force: bool,

    /// Skip extraction service calls, producing placeholder results
    pub dry_run: bool,

    /// Restrict the run to these source ids
    pub only: Option<Vec<String>>,
}

impl RunOptions {
    pub fn from_defaults(defaults: &RunDefaults) -> Self {
        Self {
            workers: defaults.workers,
            rate_limit: Duration::from_secs_f64(defaults.rate_limit),
            rate_limit_scope: defaults.rate_limit_scope,
            parallel: true,
            force: false,
            dry_run: false,
            only: None,
        }
    }

    /// The effective worker count, honoring the parallel flag
    pub fn effective_workers(&self) -> usize {
        if self.parallel {
            self.workers.max(1)
        } else {
            1
        }
    }
}
