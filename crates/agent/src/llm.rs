use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use smartshop_core::config::LlmConfig;

/// Per-call generation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub system_prompt: Option<String>,
}

impl CompletionConfig {
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmFailureKind {
    Unreachable,
    ModelMissing,
    Timeout,
    EmptyResponse,
    Rejected,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm runtime is unreachable: {0}")]
    Unreachable(String),
    #[error("model `{0}` is not available on the llm runtime")]
    ModelMissing(String),
    #[error("llm call exceeded {0:?}")]
    Timeout(Duration),
    #[error("llm returned no usable text")]
    EmptyResponse,
    #[error("llm runtime rejected the request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl LlmError {
    pub fn kind(&self) -> LlmFailureKind {
        match self {
            Self::Unreachable(_) => LlmFailureKind::Unreachable,
            Self::ModelMissing(_) => LlmFailureKind::ModelMissing,
            Self::Timeout(_) => LlmFailureKind::Timeout,
            Self::EmptyResponse => LlmFailureKind::EmptyResponse,
            Self::Rejected { .. } => LlmFailureKind::Rejected,
        }
    }

    /// Failures worth another attempt when retries are configured.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::EmptyResponse)
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String, LlmError>;
}

/// Client for an Ollama-compatible `/api/generate` endpoint. Never retries.
pub struct OllamaClient {
    base_url: String,
    api_key: Option<SecretString>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(config.base_url.clone());
        client.api_key = config.api_key.clone();
        client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String, LlmError> {
        let mut body = json!({
            "model": config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
            },
        });
        if let Some(system) = &config.system_prompt {
            body["system"] = json!(system);
        }

        let endpoint = self.generate_endpoint();
        let mut request = self.client.post(&endpoint).timeout(config.timeout).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(config.timeout)
            } else if e.is_connect() {
                LlmError::Unreachable(format!("failed to connect to {endpoint}: {e}"))
            } else {
                LlmError::Unreachable(format!("request to {endpoint} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|payload| payload.error)
                .unwrap_or_default();
            return Err(classify_rejection(status, &config.model, message));
        }

        let payload = response.json::<GenerateResponse>().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(config.timeout)
            } else {
                LlmError::EmptyResponse
            }
        })?;

        let text = payload.response.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(
            event_name = "llm.completion.received",
            model = %config.model,
            prompt_chars = prompt.len(),
            response_chars = text.len(),
            "llm completion received"
        );
        Ok(text.to_string())
    }
}

/// Ollama answers an unknown model with 404 and an error body naming it. Any
/// other 404 (a wrong path behind a proxy, say) is a plain rejection.
fn classify_rejection(status: StatusCode, model: &str, message: String) -> LlmError {
    let lowered = message.to_ascii_lowercase();
    let names_model = lowered.contains("model") || lowered.contains(&model.to_ascii_lowercase());
    if status == StatusCode::NOT_FOUND && lowered.contains("not found") && names_model {
        return LlmError::ModelMissing(model.to_string());
    }
    LlmError::Rejected { status: status.as_u16(), message }
}
