// ABOUTME: Common configuration enums shared across config modules
// ABOUTME: Contains the LlmProviderType selector read from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// LLM backend kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// Chat-completions REST API (`OpenAI` or any compatible server) (default)
    #[default]
    OpenAi,
    /// Yandex Foundation Models (`YandexGPT`)
    YandexGpt,
}

impl LlmProviderType {
    /// Environment variable name for LLM provider selection
    pub const ENV_VAR: &'static str = "LLM_PROVIDER";

    /// Environment variable for model selection
    pub const MODEL_ENV_VAR: &'static str = "LLM_MODEL";

    /// Environment variable for the per-request timeout
    pub const TIMEOUT_ENV_VAR: &'static str = "LLM_TIMEOUT_SECS";

    /// Parse provider name (case-insensitive); `None` for unknown names
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" | "local" | "ollama" | "vllm" => Some(Self::OpenAi),
            "yandex" | "yandexgpt" | "yandex_gpt" => Some(Self::YandexGpt),
            _ => None,
        }
    }

    /// Parse from string with fallback to default
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse_str(s).unwrap_or_default()
    }

    /// Load from environment variable
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }

    /// Provider identifier used in logs, metrics, and cache keys
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::YandexGpt => "yandexgpt",
        }
    }
}

impl Display for LlmProviderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_aliases() {
        assert_eq!(LlmProviderType::parse_str("OpenAI"), Some(LlmProviderType::OpenAi));
        assert_eq!(LlmProviderType::parse_str("ollama"), Some(LlmProviderType::OpenAi));
        assert_eq!(LlmProviderType::parse_str(" YandexGPT "), Some(LlmProviderType::YandexGpt));
        assert_eq!(LlmProviderType::parse_str("gemini"), None);
        assert_eq!(LlmProviderType::from_str_or_default("gemini"), LlmProviderType::OpenAi);
    }
}
