// ABOUTME: LLM provider abstraction layer for pluggable text-generation backends
// ABOUTME: Defines the provider-agnostic message protocol and the LlmProvider capability trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Provider Service Provider Interface
//!
//! This module defines the contract every LLM backend implements so the
//! classification and response pipeline never depends on a vendor API.
//!
//! ## Key Concepts
//!
//! - **`ChatMessage`**: Role-based message structure for conversations
//! - **`GeneratedReply`**: Generated text plus provider/model identity and token usage
//! - **`LlmProvider`**: Async trait with `generate_response`, `classify_query`, `is_healthy`
//! - **`ProviderError`**: The only error kind allowed out of a provider
//!
//! ## Example: Using a Provider
//!
//! ```rust,no_run
//! use sales_assistant::llm::{ChatMessage, LlmProvider};
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let messages = vec![
//!         ChatMessage::system("You are a helpful sales assistant."),
//!         ChatMessage::user("Do you sell drill bits?"),
//!     ];
//!
//!     let reply = provider.generate_response(&messages, 0.7, 500).await;
//! }
//! ```

mod error;
pub mod factory;
mod openai_compatible;
pub mod prompts;
pub mod template;
mod yandex;

pub use error::ProviderError;
pub use factory::{ProviderFactory, ProviderResolver};
pub use openai_compatible::OpenAiCompatibleProvider;
pub use yandex::YandexGptProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::constants::llm::{HEALTH_CHECK_MAX_TOKENS, HEALTH_CHECK_TIMEOUT_SECS};
use crate::models::QueryCategory;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a stored role name; anything outside the three roles is rejected
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Token usage statistics as reported by the backend
///
/// `total_tokens` is taken from the provider, not recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Response from a generation call
///
/// `usage` is `None` when the backend did not report token accounting;
/// treat that as unknown, never as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReply {
    /// Generated message content
    pub content: String,
    /// Provider identifier (e.g. "openai", "yandexgpt")
    pub provider_id: String,
    /// Model used for generation
    pub model_id: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Backend-specific extras (finish reason, model version)
    pub metadata: Option<Map<String, Value>>,
}

impl GeneratedReply {
    /// Total tokens if the backend reported usage
    #[must_use]
    pub fn total_tokens(&self) -> Option<u32> {
        self.usage.map(|u| u.total_tokens)
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait
///
/// Implement this trait to add a new backend. Implementations perform exactly
/// one network call per `generate_response` and never retry internally.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g., "openai", "yandexgpt")
    fn name(&self) -> &'static str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Send the conversation to the backend
    ///
    /// `temperature` is clamped to `[0, 1]`, `max_tokens` to at least 1.
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<GeneratedReply, ProviderError>;

    /// Classify a free-text query into one of the five categories
    ///
    /// Unrecognized model output maps to [`QueryCategory::General`].
    async fn classify_query(&self, query: &str) -> Result<QueryCategory, ProviderError>;

    /// Lightweight synthetic round-trip; never propagates errors
    async fn is_healthy(&self) -> bool {
        let probe = [ChatMessage::user("ping")];
        let outcome = tokio::time::timeout(
            Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS),
            self.generate_response(&probe, 0.0, HEALTH_CHECK_MAX_TOKENS),
        )
        .await;

        match outcome {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(provider = self.name(), "Health check failed: {e}");
                false
            }
            Err(_) => {
                debug!(provider = self.name(), "Health check timed out");
                false
            }
        }
    }
}

/// Normalize a raw classification reply into a category
///
/// Trims whitespace, uppercases, and validates against the five labels.
#[must_use]
pub fn parse_classification_label(raw: &str) -> QueryCategory {
    let normalized = raw.trim().to_uppercase();
    QueryCategory::parse_label(&normalized).unwrap_or_else(|| {
        debug!("Unrecognized classification label '{normalized}', using GENERAL");
        QueryCategory::General
    })
}

/// Clamp generation parameters into the ranges every backend accepts
pub(crate) fn clamp_generation_params(temperature: f32, max_tokens: u32) -> (f32, u32) {
    let temperature = if temperature.is_nan() {
        0.0
    } else {
        temperature.clamp(0.0, 1.0)
    };
    (temperature, max_tokens.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_normalizes_case_and_whitespace() {
        assert_eq!(parse_classification_label("  product\n"), QueryCategory::Product);
        assert_eq!(parse_classification_label("Company_Info"), QueryCategory::CompanyInfo);
        assert_eq!(parse_classification_label("CONTACT"), QueryCategory::Contact);
    }

    #[test]
    fn test_parse_label_unknown_is_general() {
        assert_eq!(parse_classification_label("PRODUCTS please"), QueryCategory::General);
        assert_eq!(parse_classification_label(""), QueryCategory::General);
        assert_eq!(parse_classification_label("{SERVICE}"), QueryCategory::General);
    }

    #[test]
    fn test_clamp_generation_params() {
        assert_eq!(clamp_generation_params(1.7, 0), (1.0, 1));
        assert_eq!(clamp_generation_params(-0.2, 50), (0.0, 50));
        assert_eq!(clamp_generation_params(f32::NAN, 10), (0.0, 10));
    }

    #[test]
    fn test_message_role_round_trip_names() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::parse_str(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse_str("tool"), None);
    }
}
