// ABOUTME: Chat-completions LLM provider for OpenAI and compatible endpoints
// ABOUTME: Works with the OpenAI cloud API as well as Ollama, vLLM, and LocalAI servers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! Implementation for any endpoint that speaks the `OpenAI` chat completions API.
//!
//! ## Supported Backends
//!
//! - **`OpenAI`**: <https://api.openai.com/v1>
//! - **Ollama**: <http://localhost:11434/v1>
//! - **vLLM**: <http://localhost:8000/v1>
//! - **`LocalAI`**: <http://localhost:8080/v1>
//!
//! ## Example
//!
//! ```rust,no_run
//! use sales_assistant::config::OpenAiCompatibleConfig;
//! use sales_assistant::errors::AppError;
//! use sales_assistant::llm::{ChatMessage, LlmProvider, OpenAiCompatibleProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let provider = OpenAiCompatibleProvider::new(OpenAiCompatibleConfig::default())?;
//!     let messages = [ChatMessage::user("Do you stock M12 bolts?")];
//!     let reply = provider.generate_response(&messages, 0.7, 500).await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::template::{safe_format, Bindings};
use super::{
    clamp_generation_params, parse_classification_label, ChatMessage, GeneratedReply,
    LlmProvider, ProviderError, TokenUsage,
};
use crate::config::{LlmProviderType, OpenAiCompatibleConfig};
use crate::constants::llm::{CLASSIFICATION_MAX_TOKENS, CLASSIFICATION_TEMPERATURE};
use crate::errors::{AppError, AppResult};
use crate::models::QueryCategory;

/// Provider identifier
const PROVIDER_NAME: &str = LlmProviderType::OpenAi.as_str();

/// Connection timeout, capped by the request timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Classification instruction tuned for chat-completion models
const CLASSIFICATION_PROMPT: &str = "Classify the customer message into exactly one category.

Categories:
PRODUCT - asks about products, availability, prices, or specifications
SERVICE - asks about services the company provides (delivery, installation, repair)
COMPANY_INFO - asks about the company itself (history, address, working hours)
CONTACT - wants to reach a manager or leave contact details
GENERAL - anything else

Message: {query}

Reply with the category name only.";

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(rename = "prompt_tokens")]
    prompt: u32,
    #[serde(rename = "completion_tokens")]
    completion: u32,
    #[serde(rename = "total_tokens")]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Generic `OpenAI`-compatible LLM provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or model is invalid, or the HTTP
    /// client cannot be created.
    pub fn new(config: OpenAiCompatibleConfig) -> AppResult<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            AppError::config_invalid(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;
        if config.model.trim().is_empty() {
            return Err(AppError::config_invalid("Model name must not be empty"));
        }
        if config.timeout_secs == 0 {
            return Err(AppError::config_invalid("Timeout must be at least 1 second"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(
                CONNECT_TIMEOUT_SECS.min(config.timeout_secs),
            ))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Initializing {PROVIDER_NAME} provider: base_url={}, model={}",
            config.base_url, config.model
        );

        Ok(Self { client, config })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Add authorization header if API key is configured
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("Bearer {api_key}"))
        } else {
            request
        }
    }

    /// Parse error response from API
    fn parse_error_response(status: StatusCode, body: &str) -> ProviderError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| {
                let error_type = parsed.error.error_type.unwrap_or_else(|| "unknown".to_owned());
                format!("{error_type} - {}", parsed.error.message)
            },
        );

        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded {
                provider: PROVIDER_NAME.to_owned(),
                message: detail,
            },
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::failure(
                    PROVIDER_NAME,
                    format!("Backend unavailable ({status}): {detail}"),
                )
            }
            _ => ProviderError::failure(PROVIDER_NAME, format!("API error ({status}): {detail}")),
        }
    }

    fn build_reply(&self, response: OpenAiResponse) -> Result<GeneratedReply, ProviderError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::failure(PROVIDER_NAME, "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            "Received response from {PROVIDER_NAME}: {} chars, finish_reason: {:?}",
            content.len(),
            choice.finish_reason
        );

        let mut metadata = Map::new();
        if let Some(reason) = choice.finish_reason {
            metadata.insert("finish_reason".to_owned(), Value::String(reason));
        }

        Ok(GeneratedReply {
            content,
            provider_id: PROVIDER_NAME.to_owned(),
            model_id: response.model.unwrap_or_else(|| self.config.model.clone()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.completion,
                total_tokens: u.total,
            }),
            metadata: (!metadata.is_empty()).then_some(metadata),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, messages), fields(provider = PROVIDER_NAME, model = %self.config.model))]
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GeneratedReply, ProviderError> {
        let (temperature, max_tokens) = clamp_generation_params(temperature, max_tokens);
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OpenAiMessage::from).collect(),
            temperature,
            max_tokens,
            stream: false,
        };
        debug!(
            "Sending chat completion request to {PROVIDER_NAME} with {} messages",
            request.messages.len()
        );

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to {PROVIDER_NAME}: {e}");
                ProviderError::from_transport(PROVIDER_NAME, self.config.timeout_secs, e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read {PROVIDER_NAME} response: {e}");
            ProviderError::from_transport(PROVIDER_NAME, self.config.timeout_secs, e)
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse {PROVIDER_NAME} response: {e}");
            ProviderError::ProviderFailure {
                provider: PROVIDER_NAME.to_owned(),
                message: "malformed response body".to_owned(),
                source: Some(Box::new(e)),
            }
        })?;

        self.build_reply(parsed)
    }

    #[instrument(skip(self, query), fields(provider = PROVIDER_NAME))]
    async fn classify_query(&self, query: &str) -> Result<QueryCategory, ProviderError> {
        let prompt = safe_format(CLASSIFICATION_PROMPT, &Bindings::new().text("query", query))
            .map_err(|e| ProviderError::failure(PROVIDER_NAME, e.to_string()))?;

        let reply = self
            .generate_response(
                &[ChatMessage::user(prompt)],
                CLASSIFICATION_TEMPERATURE,
                CLASSIFICATION_MAX_TOKENS,
            )
            .await?;

        Ok(parse_classification_label(&reply.content))
    }
}
