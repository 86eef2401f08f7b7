//! Completion-model capability: a narrow trait plus the default Groq client.
//!
//! The pipeline consumes exactly one operation — `complete(request) → text`.
//! Keeping the trait this narrow lets tests substitute a deterministic stub
//! without any network, and lets callers plug in any OpenAI-compatible
//! backend by implementing one method.
//!
//! The default implementation talks to the Groq chat-completions endpoint
//! with `llama-3.3-70b-versatile`, temperature 0 — determinism matters far
//! more than creativity when the output must be strictly-valid JSON.

use crate::error::{ModelError, PipelineError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Default model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// One completion request: a system message carrying the rules and contract,
/// and a user message carrying the extracted document text.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The completion capability consumed by the normalizer.
///
/// Implementations must be `Send + Sync`: the handle is a process-wide
/// singleton shared read-only across concurrent pipeline invocations.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run one completion to completion (no streaming) and return the raw text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;

    /// Model identifier, for logs and error messages.
    fn model_id(&self) -> &str;
}

// One HTTP client for the whole process; reqwest clients pool connections
// internally and are cheap to clone.
static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Groq chat-completions client (OpenAI-compatible wire format).
pub struct GroqModel {
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl GroqModel {
    /// Build a client from an explicit API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GROQ_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }

    /// Build a client from `GROQ_API_KEY`.
    pub fn from_env(model: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        match std::env::var("GROQ_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self {
                api_key: key,
                model: model.to_string(),
                base_url: GROQ_BASE_URL.to_string(),
                timeout_secs,
            }),
            _ => Err(PipelineError::ModelNotConfigured {
                model: model.to_string(),
                hint: "Set GROQ_API_KEY, or inject a TextModel via \
                       PipelineConfigBuilder::model_handle."
                    .to_string(),
            }),
        }
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextModel for GroqModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = HTTP
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ModelError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!("completion API rate-limited, retry-after={:?}s", retry_after_secs);
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiStatus {
                status: status.as_u16(),
                body: crate::output::truncate_at_char_boundary(&body, 300).to_string(),
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::ResponseParse(e.to_string()))?;

        let content = extract_completion(&value)?;
        debug!("completion received: {} chars", content.len());
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_completion(value: &serde_json::Value) -> Result<String, ModelError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ModelError::ResponseParse(format!(
                "no choices[0].message.content in response: {}",
                crate::output::truncate_at_char_boundary(&value.to_string(), 200)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_completion_happy_path() {
        let value = json!({
            "choices": [ { "message": { "role": "assistant", "content": "{\"a\":1}" } } ]
        });
        assert_eq!(extract_completion(&value).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn extract_completion_missing_choices() {
        let value = json!({ "error": { "message": "boom" } });
        assert!(matches!(
            extract_completion(&value),
            Err(ModelError::ResponseParse(_))
        ));
    }

    #[test]
    fn from_env_without_key_is_not_configured() {
        // GROQ_API_KEY is not set in the test environment.
        std::env::remove_var("GROQ_API_KEY");
        let result = GroqModel::from_env(DEFAULT_MODEL, 60);
        assert!(matches!(
            result,
            Err(PipelineError::ModelNotConfigured { .. })
        ));
    }
}
