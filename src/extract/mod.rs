//! Extraction service client
//!
//! Sends page text through a chat-completions style endpoint and returns
//! the extracted text plus token usage. Failures are classified so the
//! orchestrator can tell unit-level failures (skip the unit, keep going)
//! from run-fatal conditions (bad credentials, exhausted quota).

use crate::config::ExtractorConfig;
use crate::cost::CostTracker;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Backoff ceiling between retries
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Placeholder substituted with page content in prompt templates
const CONTENT_PLACEHOLDER: &str = "{content}";

/// Errors from the extraction service
#[derive(Debug, Error)]
pub enum ExtractError {
    /// API key environment variable not set; run-fatal
    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),

    /// Rejected credentials; run-fatal
    #[error("Extraction service rejected credentials: {0}")]
    Auth(String),

    /// Exhausted account quota; run-fatal
    #[error("Extraction service quota exhausted: {0}")]
    Quota(String),

    /// Rate limit or server-side failure; retried with backoff
    #[error("Transient extraction failure: {0}")]
    Transient(String),

    /// Malformed request or unusable response; terminal for the unit
    #[error("Permanent extraction failure: {0}")]
    Permanent(String),
}

impl ExtractError {
    /// Run-fatal errors abort dispatch of further units; the run still
    /// flushes whatever completed before them.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey(_) | Self::Auth(_) | Self::Quota(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Outcome of one extraction call
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Whether the input was cut down to the content-length ceiling
    pub truncated: bool,
}

/// Terminal state of a unit after the pipeline is done with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Succeeded,
    Failed,
    /// Not attempted (dispatch was aborted by a run-fatal error)
    Skipped,
}

/// Per-unit result carried through ordered aggregation
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub source_id: String,
    /// Short identifier used in logs and section separators
    pub display_id: String,
    pub url: String,
    /// Discovery order index within the source
    pub index: usize,
    pub status: ExtractionStatus,
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub failure: Option<String>,
}

impl ExtractionResult {
    pub fn succeeded(&self) -> bool {
        self.status == ExtractionStatus::Succeeded
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Client for the external extraction service
///
/// Shared by all workers; holds the run's cost tracker so every completed
/// call is recorded exactly once.
pub struct Extractor {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_content_length: usize,
    max_retries: u32,
    initial_delay: Duration,
    dry_run: bool,
    tracker: Arc<CostTracker>,
}

impl Extractor {
    /// Builds the extractor from config, reading the API key from the
    /// environment
    ///
    /// A dry run never contacts the service, so the key may be absent.
    pub fn new(
        config: &ExtractorConfig,
        tracker: Arc<CostTracker>,
        dry_run: bool,
    ) -> Result<Self, ExtractError> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ if dry_run => String::new(),
            _ => return Err(ExtractError::MissingApiKey(config.api_key_env.clone())),
        };

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_content_length: config.max_content_length,
            max_retries: config.max_retries.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            dry_run,
            tracker,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs one extraction call, retrying transient failures with
    /// exponential backoff
    ///
    /// In dry-run mode returns a placeholder without contacting the
    /// service or recording any usage.
    pub async fn extract(
        &self,
        source_id: &str,
        prompt_template: &str,
        content: &str,
    ) -> Result<Extraction, ExtractError> {
        let (content, truncated) = self.truncate(content);
        if truncated {
            tracing::warn!(
                "Source '{}': content truncated to {} characters",
                source_id,
                self.max_content_length
            );
        }

        if self.dry_run {
            return Ok(Extraction {
                text: format!("[dry-run] extraction skipped ({} chars of input)", content.len()),
                input_tokens: 0,
                output_tokens: 0,
                truncated,
            });
        }

        let prompt = build_prompt(prompt_template, &content);
        let mut delay = self.initial_delay;
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying extraction for '{}' (attempt {}/{}) after {:?}",
                    source_id,
                    attempt + 1,
                    self.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }

            match self.attempt(&prompt).await {
                Ok((text, input_tokens, output_tokens)) => {
                    self.tracker
                        .record(source_id, input_tokens, output_tokens, truncated);
                    return Ok(Extraction {
                        text,
                        input_tokens,
                        output_tokens,
                        truncated,
                    });
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ExtractError::Transient("retry attempts exhausted".to_string())
        }))
    }

    fn truncate(&self, content: &str) -> (String, bool) {
        if content.len() <= self.max_content_length {
            return (content.to_string(), false);
        }
        let mut cut = self.max_content_length;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        (content[..cut].to_string(), true)
    }

    async fn attempt(&self, prompt: &str) -> Result<(String, u64, u64), ExtractError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ExtractError::Transient(e.to_string())
                } else {
                    ExtractError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Permanent(format!("malformed response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractError::Permanent("response carried no content".to_string()))?;

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok((text, input_tokens, output_tokens))
    }
}

fn build_prompt(template: &str, content: &str) -> String {
    if template.contains(CONTENT_PLACEHOLDER) {
        template.replace(CONTENT_PLACEHOLDER, content)
    } else {
        format!("{}\n\n{}", template.trim_end(), content)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ExtractError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExtractError::Auth(snippet),
        StatusCode::TOO_MANY_REQUESTS => {
            // The quota error shares the 429 status with ordinary rate
            // limiting but never resolves by waiting
            if body.contains("insufficient_quota") {
                ExtractError::Quota(snippet)
            } else {
                ExtractError::Transient(format!("HTTP 429: {}", snippet))
            }
        }
        s if s.is_server_error() => ExtractError::Transient(format!("HTTP {}", s.as_u16())),
        s => ExtractError::Permanent(format!("HTTP {}: {}", s.as_u16(), snippet)),
    }
}
