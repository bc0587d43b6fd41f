// ABOUTME: Provider factory resolving the active LLM backend from stored or environment config
// ABOUTME: Caches provider instances by config hash and falls back to the default on any failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Factory
//!
//! Resolution order for [`ProviderFactory::get_active_provider`]:
//!
//! 1. The provider configuration flagged active in the settings store
//! 2. The environment-derived default configuration
//!
//! A stored configuration that cannot be read or cannot be turned into a
//! provider never reaches the caller as an error; the default is used instead.
//!
//! Instances are cached by [`ProviderConfig::cache_key`], so identical
//! configuration always yields the same `Arc`. There is no eviction.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{LlmProvider, OpenAiCompatibleProvider, YandexGptProvider};
use crate::config::ProviderConfig;
use crate::errors::AppResult;
use crate::store::SettingsStore;

/// Key reported for the default provider in health scans
pub const DEFAULT_PROVIDER_KEY: &str = "default";

/// Anything that can hand out the currently active provider
///
/// The classifier and orchestrator depend on this seam rather than on the
/// concrete factory.
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// Provider to use for the next call
    ///
    /// # Errors
    ///
    /// Returns an error only if no provider at all can be constructed.
    async fn active_provider(&self, settings: &dyn SettingsStore) -> AppResult<Arc<dyn LlmProvider>>;
}

/// Builds and caches LLM providers
pub struct ProviderFactory {
    default_config: ProviderConfig,
    cache: DashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderFactory {
    /// Create a factory with an explicit default configuration
    #[must_use]
    pub fn new(default_config: ProviderConfig) -> Self {
        Self {
            default_config,
            cache: DashMap::new(),
        }
    }

    /// Create a factory whose default comes from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the environment does not describe a usable provider.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(ProviderConfig::from_env()?))
    }

    /// Default configuration used as the fallback
    #[must_use]
    pub const fn default_config(&self) -> &ProviderConfig {
        &self.default_config
    }

    /// Construct a provider without touching the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for its backend.
    pub fn build_provider(config: &ProviderConfig) -> AppResult<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match config {
            ProviderConfig::OpenAi(c) => Arc::new(OpenAiCompatibleProvider::new(c.clone())?),
            ProviderConfig::YandexGpt(c) => Arc::new(YandexGptProvider::new(c.clone())?),
        };
        Ok(provider)
    }

    /// Cached provider for a configuration, building it on a miss
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be constructed.
    pub fn provider_for(&self, config: &ProviderConfig) -> AppResult<Arc<dyn LlmProvider>> {
        let key = config.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let provider = Self::build_provider(config)?;
        debug!(
            provider = %config.provider_type(),
            model = config.model(),
            "Cached new provider instance"
        );
        Ok(Arc::clone(self.cache.entry(key).or_insert(provider).value()))
    }

    /// Provider built from the default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the default configuration is unusable.
    pub fn default_provider(&self) -> AppResult<Arc<dyn LlmProvider>> {
        self.provider_for(&self.default_config)
    }

    /// Active provider from the store, or the default
    ///
    /// # Errors
    ///
    /// Returns an error only when the default provider itself cannot be built.
    pub async fn get_active_provider(
        &self,
        settings: &dyn SettingsStore,
    ) -> AppResult<Arc<dyn LlmProvider>> {
        match settings.active_provider_config().await {
            Ok(Some(record)) => match self.provider_for(&record.config) {
                Ok(provider) => return Ok(provider),
                Err(e) => warn!(
                    config = %record.name,
                    "Active provider could not be constructed, using default: {e}"
                ),
            },
            Ok(None) => debug!("No active provider configured, using default"),
            Err(e) => warn!("Failed to load active provider config, using default: {e:#}"),
        }
        self.default_provider()
    }

    /// Provider for a named configuration, ignoring the active flag
    ///
    /// Returns `Ok(None)` when no configuration has that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the configuration is unusable.
    pub async fn get_provider_by_name(
        &self,
        name: &str,
        settings: &dyn SettingsStore,
    ) -> AppResult<Option<Arc<dyn LlmProvider>>> {
        let Some(record) = settings.provider_config(name).await? else {
            return Ok(None);
        };
        self.provider_for(&record.config).map(Some)
    }

    /// Health of every configured provider plus the default
    ///
    /// A provider that cannot be constructed is reported unhealthy; the scan
    /// never aborts.
    pub async fn health_check_all(&self, settings: &dyn SettingsStore) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();

        let records = settings.list_provider_configs().await.unwrap_or_else(|e| {
            warn!("Failed to list provider configs for health scan: {e:#}");
            Vec::new()
        });

        for record in records {
            let healthy = match self.provider_for(&record.config) {
                Ok(provider) => provider.is_healthy().await,
                Err(e) => {
                    warn!(config = %record.name, "Provider construction failed: {e}");
                    false
                }
            };
            results.insert(record.name, healthy);
        }

        let default_healthy = match self.default_provider() {
            Ok(provider) => provider.is_healthy().await,
            Err(e) => {
                warn!("Default provider construction failed: {e}");
                false
            }
        };
        results.insert(DEFAULT_PROVIDER_KEY.to_owned(), default_healthy);

        info!(
            checked = results.len(),
            healthy = results.values().filter(|h| **h).count(),
            "Provider health scan complete"
        );
        results
    }

    /// Drop every cached provider instance
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Provider cache cleared");
    }

    /// Number of cached provider instances
    #[must_use]
    pub fn cached_provider_count(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl ProviderResolver for ProviderFactory {
    async fn active_provider(&self, settings: &dyn SettingsStore) -> AppResult<Arc<dyn LlmProvider>> {
        self.get_active_provider(settings).await
    }
}
