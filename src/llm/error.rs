// ABOUTME: Closed error taxonomy for the LLM provider boundary
// ABOUTME: Backends map every transport or API failure into rate-limit, timeout, or provider failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use thiserror::Error;

/// Error surfaced by any [`super::LlmProvider`] implementation
///
/// No other error type crosses the provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend signaled throttling (HTTP 429 or equivalent)
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Provider identifier
        provider: String,
        /// Backend message, if any
        message: String,
    },

    /// No response within the configured deadline
    #[error("{provider} did not respond within {timeout_secs}s")]
    Timeout {
        /// Provider identifier
        provider: String,
        /// Configured deadline
        timeout_secs: u64,
    },

    /// Any other backend error
    #[error("{provider} request failed: {message}")]
    ProviderFailure {
        /// Provider identifier
        provider: String,
        /// Failure description
        message: String,
        /// Underlying cause
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProviderError {
    /// Build a `ProviderFailure` without an underlying cause
    pub fn failure(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Translate a transport-level `reqwest` error
    pub fn from_transport(provider: &str, timeout_secs: u64, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                provider: provider.to_owned(),
                timeout_secs,
            };
        }
        let message = if error.is_connect() {
            "cannot connect to backend".to_owned()
        } else if error.is_decode() {
            "malformed response body".to_owned()
        } else {
            "transport error".to_owned()
        };
        Self::ProviderFailure {
            provider: provider.to_owned(),
            message,
            source: Some(Box::new(error)),
        }
    }

    /// Identifier of the provider that produced this error
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimitExceeded { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::ProviderFailure { provider, .. } => provider,
        }
    }
}
