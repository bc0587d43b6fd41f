// ABOUTME: Configuration management module for the assistant core
// ABOUTME: Environment-driven provider selection, cache lifetimes, and usage limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//! Configuration module
//!
//! All settings come from environment variables and are typed at load time:
//!
//! - **Provider**: default LLM backend used when the store has no active config
//! - **Classification**: settings cache lifetime
//! - **Usage**: monthly spend limit and alert threshold

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use tracing::{info, warn};

/// Provider configuration types
pub mod llm;
/// Shared configuration enums
pub mod types;

pub use llm::{OpenAiCompatibleConfig, ProviderConfig, ProviderConfigRecord, YandexGptConfig};
pub use types::LlmProviderType;

use crate::constants::cache::CLASSIFICATION_SETTINGS_TTL_SECS;
use crate::errors::{AppError, AppResult};

const CLASSIFICATION_CACHE_TTL_ENV: &str = "CLASSIFICATION_CACHE_TTL_SECS";
const USAGE_MONTHLY_LIMIT_ENV: &str = "USAGE_MONTHLY_LIMIT_USD";
const USAGE_ALERT_THRESHOLD_ENV: &str = "USAGE_ALERT_THRESHOLD";

/// Default fraction of the monthly limit that raises a threshold alert
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.8;

/// Spend limits and prices for usage accounting
#[derive(Debug, Clone, PartialEq)]
pub struct UsageLimits {
    /// Monthly spend limit per provider; `None` disables alerts
    pub monthly_limit_usd: Option<f64>,
    /// Fraction of the limit that raises the threshold alert
    pub alert_threshold: f64,
    /// Price per 1K tokens, keyed by provider id
    pub cost_per_1k_tokens_usd: BTreeMap<String, f64>,
}

impl Default for UsageLimits {
    fn default() -> Self {
        let mut prices = BTreeMap::new();
        prices.insert(LlmProviderType::OpenAi.as_str().to_owned(), 0.002);
        prices.insert(LlmProviderType::YandexGpt.as_str().to_owned(), 0.0012);
        Self {
            monthly_limit_usd: None,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            cost_per_1k_tokens_usd: prices,
        }
    }
}

impl UsageLimits {
    /// Load limits from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but not a valid number, or the
    /// threshold is outside `(0, 1]`.
    pub fn from_env() -> AppResult<Self> {
        let mut limits = Self::default();
        if let Some(limit) = parse_env::<f64>(USAGE_MONTHLY_LIMIT_ENV)? {
            if limit <= 0.0 {
                return Err(AppError::config_invalid(format!(
                    "{USAGE_MONTHLY_LIMIT_ENV} must be positive, got {limit}"
                )));
            }
            limits.monthly_limit_usd = Some(limit);
        }
        if let Some(threshold) = parse_env::<f64>(USAGE_ALERT_THRESHOLD_ENV)? {
            if threshold <= 0.0 || threshold > 1.0 {
                return Err(AppError::config_invalid(format!(
                    "{USAGE_ALERT_THRESHOLD_ENV} must be in (0, 1], got {threshold}"
                )));
            }
            limits.alert_threshold = threshold;
        }
        Ok(limits)
    }

    /// Price per 1K tokens for a provider (zero when unknown)
    #[must_use]
    pub fn price_for(&self, provider: &str) -> f64 {
        self.cost_per_1k_tokens_usd
            .get(provider)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Top-level configuration for the assistant core
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Provider used when no active configuration is stored
    pub default_provider: ProviderConfig,
    /// How long classification settings stay cached
    pub classification_cache_ttl: Duration,
    /// Usage accounting
    pub usage: UsageLimits,
}

impl AssistantConfig {
    /// Load the full configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the default provider cannot be configured or a
    /// numeric variable is malformed.
    pub fn from_env() -> AppResult<Self> {
        let default_provider = ProviderConfig::from_env()?;
        let ttl_secs = parse_env::<u64>(CLASSIFICATION_CACHE_TTL_ENV)?
            .unwrap_or(CLASSIFICATION_SETTINGS_TTL_SECS);
        let usage = UsageLimits::from_env()?;

        info!(
            provider = %default_provider.provider_type(),
            model = default_provider.model(),
            classification_cache_ttl_secs = ttl_secs,
            "Assistant configuration loaded"
        );
        if usage.monthly_limit_usd.is_none() {
            warn!("{USAGE_MONTHLY_LIMIT_ENV} not set, usage alerts disabled");
        }

        Ok(Self {
            default_provider,
            classification_cache_ttl: Duration::from_secs(ttl_secs),
            usage,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::config_invalid(format!("{name} has invalid value '{raw}'"))),
        _ => Ok(None),
    }
}
