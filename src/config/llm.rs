// ABOUTME: Typed LLM provider configuration, one struct per backend kind
// ABOUTME: Loaded from persisted settings or environment; hashed into stable cache keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Configuration
//!
//! ## Environment
//!
//! - `LLM_PROVIDER`: `openai` (default) or `yandexgpt`
//! - `LLM_MODEL`: model override for the selected provider
//! - `LLM_TIMEOUT_SECS`: per-request timeout (default 30)
//! - `OPENAI_BASE_URL`, `OPENAI_API_KEY`: chat-completions endpoint and key
//! - `YANDEX_API_KEY`, `YANDEX_FOLDER_ID`, `YANDEX_ENDPOINT`: foundation-model access

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use tracing::warn;

use super::types::LlmProviderType;
use crate::constants::llm::DEFAULT_TIMEOUT_SECS;
use crate::errors::{AppError, AppResult};

const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
const YANDEX_API_KEY_ENV: &str = "YANDEX_API_KEY";
const YANDEX_FOLDER_ID_ENV: &str = "YANDEX_FOLDER_ID";
const YANDEX_ENDPOINT_ENV: &str = "YANDEX_ENDPOINT";

/// Default chat-completions base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default chat-completions model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Default foundation-model completion endpoint
pub const DEFAULT_YANDEX_ENDPOINT: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
/// Default foundation model
pub const DEFAULT_YANDEX_MODEL: &str = "yandexgpt-lite";

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_yandex_endpoint() -> String {
    DEFAULT_YANDEX_ENDPOINT.to_owned()
}

/// Configuration for a chat-completions REST backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the API (e.g., <https://api.openai.com/v1>)
    pub base_url: String,
    /// API key (optional for local servers)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model to request
    pub model: String,
    /// Request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for OpenAiCompatibleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for the Yandex foundation-model backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YandexGptConfig {
    /// API key
    pub api_key: String,
    /// Cloud folder the model is billed to
    pub folder_id: String,
    /// Model name (`yandexgpt`, `yandexgpt-lite`) or `name/version`
    pub model: String,
    /// Completion endpoint
    #[serde(default = "default_yandex_endpoint")]
    pub endpoint: String,
    /// Request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl YandexGptConfig {
    /// Model URI in `gpt://<folder>/<model>/<version>` form
    #[must_use]
    pub fn model_uri(&self) -> String {
        if self.model.contains('/') {
            format!("gpt://{}/{}", self.folder_id, self.model)
        } else {
            format!("gpt://{}/{}/latest", self.folder_id, self.model)
        }
    }
}

impl fmt::Debug for YandexGptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YandexGptConfig")
            .field("api_key", &"[REDACTED]")
            .field("folder_id", &self.folder_id)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Provider configuration, tagged by backend kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ProviderConfig {
    /// Chat-completions REST backend
    #[serde(rename = "openai")]
    OpenAi(OpenAiCompatibleConfig),
    /// Yandex foundation-model backend
    #[serde(rename = "yandexgpt")]
    YandexGpt(YandexGptConfig),
}

impl ProviderConfig {
    /// Backend kind
    #[must_use]
    pub const fn provider_type(&self) -> LlmProviderType {
        match self {
            Self::OpenAi(_) => LlmProviderType::OpenAi,
            Self::YandexGpt(_) => LlmProviderType::YandexGpt,
        }
    }

    /// Configured model
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(c) => &c.model,
            Self::YandexGpt(c) => &c.model,
        }
    }

    /// Flattened configuration as sorted key/value pairs
    #[must_use]
    pub fn key_value_pairs(&self) -> BTreeMap<&'static str, String> {
        let mut pairs = BTreeMap::new();
        pairs.insert("provider", self.provider_type().as_str().to_owned());
        match self {
            Self::OpenAi(c) => {
                pairs.insert("base_url", c.base_url.clone());
                pairs.insert("api_key", c.api_key.clone().unwrap_or_default());
                pairs.insert("model", c.model.clone());
                pairs.insert("timeout_secs", c.timeout_secs.to_string());
            }
            Self::YandexGpt(c) => {
                pairs.insert("api_key", c.api_key.clone());
                pairs.insert("folder_id", c.folder_id.clone());
                pairs.insert("model", c.model.clone());
                pairs.insert("endpoint", c.endpoint.clone());
                pairs.insert("timeout_secs", c.timeout_secs.to_string());
            }
        }
        pairs
    }

    /// Deterministic instance-cache key: SHA-256 over the sorted pairs
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in self.key_value_pairs() {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Build the default configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the selected backend requires credentials that are not set.
    pub fn from_env() -> AppResult<Self> {
        let provider_type = LlmProviderType::from_env();
        let model = env::var(LlmProviderType::MODEL_ENV_VAR)
            .ok()
            .filter(|m| !m.trim().is_empty());
        let timeout_secs = timeout_from_env();

        match provider_type {
            LlmProviderType::OpenAi => Ok(Self::OpenAi(OpenAiCompatibleConfig {
                base_url: env::var(OPENAI_BASE_URL_ENV)
                    .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_owned()),
                api_key: env::var(OPENAI_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
                model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned()),
                timeout_secs,
            })),
            LlmProviderType::YandexGpt => {
                let api_key = required_env(YANDEX_API_KEY_ENV)?;
                let folder_id = required_env(YANDEX_FOLDER_ID_ENV)?;
                Ok(Self::YandexGpt(YandexGptConfig {
                    api_key,
                    folder_id,
                    model: model.unwrap_or_else(|| DEFAULT_YANDEX_MODEL.to_owned()),
                    endpoint: env::var(YANDEX_ENDPOINT_ENV)
                        .unwrap_or_else(|_| DEFAULT_YANDEX_ENDPOINT.to_owned()),
                    timeout_secs,
                }))
            }
        }
    }
}

/// A named provider configuration as held by the settings store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigRecord {
    /// Unique configuration name
    pub name: String,
    /// Backend configuration
    pub config: ProviderConfig,
    /// At most one record is active
    pub is_active: bool,
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::config(format!("{name} environment variable not set")))
}

fn timeout_from_env() -> u64 {
    match env::var(LlmProviderType::TIMEOUT_ENV_VAR) {
        Ok(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(
                "Invalid {} value '{raw}', using {DEFAULT_TIMEOUT_SECS}s",
                LlmProviderType::TIMEOUT_ENV_VAR
            );
            DEFAULT_TIMEOUT_SECS
        }),
        Err(_) => DEFAULT_TIMEOUT_SECS,
    }
}
