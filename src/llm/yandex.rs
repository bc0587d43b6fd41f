// ABOUTME: Yandex Foundation Models provider (YandexGPT) behind the LlmProvider trait
// ABOUTME: Addresses models by folder URI and translates the completion envelope and usage fields
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `YandexGPT` Provider
//!
//! Talks to the synchronous completion endpoint of Yandex Foundation Models.
//! Models are addressed as `gpt://<folder_id>/<model>/<version>` and requests
//! are authenticated with an API key plus the billing folder header.
//!
//! Token counts come back as decimal strings (`"inputTextTokens": "42"`).

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
use crate::config::{LlmProviderType, YandexGptConfig};
use crate::constants::llm::{CLASSIFICATION_MAX_TOKENS, CLASSIFICATION_TEMPERATURE};
use crate::errors::{AppError, AppResult};
use crate::models::QueryCategory;

const PROVIDER_NAME: &str = LlmProviderType::YandexGpt.as_str();

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Folder header required by the completion API
const FOLDER_HEADER: &str = "x-folder-id";

/// Classification instruction; `YandexGPT` follows a short system-style brief better
const CLASSIFICATION_SYSTEM_PROMPT: &str = "You route customer messages for a sales team. \
Answer with one word from this list: PRODUCT, SERVICE, COMPANY_INFO, CONTACT, GENERAL.";

const CLASSIFICATION_USER_PROMPT: &str = "PRODUCT: products, stock, prices, specifications.
SERVICE: delivery, installation, repair and other services.
COMPANY_INFO: the company, its address, history, working hours.
CONTACT: wants a manager, a call back, or to leave contacts.
GENERAL: everything else.

Customer message: \"{query}\"
Category:";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<YandexMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    /// Sent as a decimal string, as the API documents
    max_tokens: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct YandexMessage {
    role: String,
    text: String,
}

impl From<&ChatMessage> for YandexMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            text: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionResult {
    alternatives: Vec<Alternative>,
    #[serde(default)]
    usage: Option<YandexUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: YandexMessage,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YandexUsage {
    input_text_tokens: TokenCount,
    completion_tokens: TokenCount,
    total_tokens: TokenCount,
}

/// Token counters arrive as strings but tolerate plain numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenCount {
    Number(u32),
    Text(String),
}

impl TokenCount {
    fn value(&self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl YandexUsage {
    fn to_token_usage(&self) -> Option<TokenUsage> {
        Some(TokenUsage {
            prompt_tokens: self.input_text_tokens.value()?,
            completion_tokens: self.completion_tokens.value()?,
            total_tokens: self.total_tokens.value()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct YandexErrorEnvelope {
    #[serde(default)]
    error: Option<YandexErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YandexErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// `YandexGPT` provider
pub struct YandexGptProvider {
    client: Client,
    config: YandexGptConfig,
    model_uri: String,
}

impl YandexGptProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if credentials, folder, endpoint, or model are missing
    /// or malformed, or the HTTP client cannot be created.
    pub fn new(config: YandexGptConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::config_invalid("YandexGPT API key must not be empty"));
        }
        if config.folder_id.trim().is_empty() {
            return Err(AppError::config_invalid("YandexGPT folder id must not be empty"));
        }
        if config.model.trim().is_empty() {
            return Err(AppError::config_invalid("Model name must not be empty"));
        }
        if config.timeout_secs == 0 {
            return Err(AppError::config_invalid("Timeout must be at least 1 second"));
        }
        Url::parse(&config.endpoint).map_err(|e| {
            AppError::config_invalid(format!("Invalid endpoint '{}': {e}", config.endpoint))
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(
                CONNECT_TIMEOUT_SECS.min(config.timeout_secs),
            ))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        let model_uri = config.model_uri();
        info!("Initializing {PROVIDER_NAME} provider: model_uri={model_uri}");

        Ok(Self {
            client,
            config,
            model_uri,
        })
    }

    /// Model URI requests are addressed to
    #[must_use]
    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    fn parse_error_response(status: StatusCode, body: &str) -> ProviderError {
        let detail = serde_json::from_str::<YandexErrorEnvelope>(body)
            .ok()
            .and_then(|env| env.error.and_then(|e| e.message).or(env.message))
            .unwrap_or_else(|| body.chars().take(200).collect());

        if status == StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimitExceeded {
                provider: PROVIDER_NAME.to_owned(),
                message: detail,
            }
        } else {
            ProviderError::failure(PROVIDER_NAME, format!("API error ({status}): {detail}"))
        }
    }

    fn build_reply(&self, response: CompletionResponse) -> Result<GeneratedReply, ProviderError> {
        let result = response.result;
        let alternative = result
            .alternatives
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::failure(PROVIDER_NAME, "API returned no alternatives"))?;

        debug!(
            "Received response from {PROVIDER_NAME}: {} chars, status: {:?}",
            alternative.message.text.len(),
            alternative.status
        );

        let mut metadata = Map::new();
        if let Some(status) = alternative.status {
            metadata.insert("finish_reason".to_owned(), Value::String(status));
        }
        if let Some(version) = result.model_version {
            metadata.insert("model_version".to_owned(), Value::String(version));
        }

        Ok(GeneratedReply {
            content: alternative.message.text,
            provider_id: PROVIDER_NAME.to_owned(),
            model_id: self.config.model.clone(),
            usage: result.usage.as_ref().and_then(YandexUsage::to_token_usage),
            metadata: (!metadata.is_empty()).then_some(metadata),
        })
    }
}

#[async_trait]
impl LlmProvider for YandexGptProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, messages), fields(provider = PROVIDER_NAME, model_uri = %self.model_uri))]
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GeneratedReply, ProviderError> {
        let (temperature, max_tokens) = clamp_generation_params(temperature, max_tokens);
        let request = CompletionRequest {
            model_uri: self.model_uri.clone(),
            completion_options: CompletionOptions {
                stream: false,
                temperature,
                max_tokens: max_tokens.to_string(),
            },
            messages: messages.iter().map(YandexMessage::from).collect(),
        };
        debug!(
            "Sending completion request to {PROVIDER_NAME} with {} messages",
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Api-Key {}", self.config.api_key))
            .header(FOLDER_HEADER, &self.config.folder_id)
            .json(&request)
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

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
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
        let prompt = safe_format(
            CLASSIFICATION_USER_PROMPT,
            &Bindings::new().text("query", query),
        )
        .map_err(|e| ProviderError::failure(PROVIDER_NAME, e.to_string()))?;

        let messages = [
            ChatMessage::system(CLASSIFICATION_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let reply = self
            .generate_response(&messages, CLASSIFICATION_TEMPERATURE, CLASSIFICATION_MAX_TOKENS)
            .await?;

        Ok(parse_classification_label(&reply.content))
    }
}
