// ABOUTME: In-memory implementation of every store trait for embedding and tests
// ABOUTME: Supports versioned settings and prompts, term-scored product search, and failure injection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! In-memory store
//!
//! Keeps everything behind one `tokio::sync::RwLock`, so each trait method is
//! atomic with respect to the others. Failure points can be switched on to
//! exercise degradation paths without a real database.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CompanyDirectory, ConversationStore, DataSession, ProductSearch, PromptStore, SettingsStore,
};
use crate::classification::ClassificationSettings;
use crate::config::ProviderConfigRecord;
use crate::llm::MessageRole;
use crate::models::{
    CompanyInfo, CompanyService, MessageMetrics, ProductCandidate, PromptTemplate, StoredMessage,
};

/// Operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Classification settings and provider config reads
    SettingsReads,
    /// Active prompt lookups and listings
    PromptReads,
    /// Prompt version publishing
    PromptWrites,
    /// Appending conversation turns
    ConversationWrites,
    /// Reading conversation history
    ConversationReads,
    /// Services and company info
    CompanyReads,
    /// Product search
    ProductSearch,
}

#[derive(Default)]
struct FailureSwitches {
    settings_reads: AtomicBool,
    prompt_reads: AtomicBool,
    prompt_writes: AtomicBool,
    conversation_writes: AtomicBool,
    conversation_reads: AtomicBool,
    company_reads: AtomicBool,
    product_search: AtomicBool,
}

impl FailureSwitches {
    const fn switch(&self, point: FailurePoint) -> &AtomicBool {
        match point {
            FailurePoint::SettingsReads => &self.settings_reads,
            FailurePoint::PromptReads => &self.prompt_reads,
            FailurePoint::PromptWrites => &self.prompt_writes,
            FailurePoint::ConversationWrites => &self.conversation_writes,
            FailurePoint::ConversationReads => &self.conversation_reads,
            FailurePoint::CompanyReads => &self.company_reads,
            FailurePoint::ProductSearch => &self.product_search,
        }
    }

    fn check(&self, point: FailurePoint) -> Result<()> {
        if self.switch(point).load(Ordering::SeqCst) {
            Err(anyhow!("injected failure: {point:?}"))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct State {
    classification_versions: Vec<ClassificationSettings>,
    provider_configs: Vec<ProviderConfigRecord>,
    prompts: Vec<PromptTemplate>,
    messages: Vec<StoredMessage>,
    services: Vec<CompanyService>,
    company_info: Option<CompanyInfo>,
    products: Vec<ProductCandidate>,
}

/// Store backed by process memory
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    failures: FailureSwitches,
}

impl InMemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the product catalog
    #[must_use]
    pub fn with_products(mut self, products: Vec<ProductCandidate>) -> Self {
        self.state.get_mut().products = products;
        self
    }

    /// Seed the active services
    #[must_use]
    pub fn with_services(mut self, services: Vec<CompanyService>) -> Self {
        self.state.get_mut().services = services;
        self
    }

    /// Seed the company information document
    #[must_use]
    pub fn with_company_info(mut self, content: impl Into<String>) -> Self {
        self.state.get_mut().company_info = Some(CompanyInfo {
            content: content.into(),
        });
        self
    }

    /// Seed classification settings as version 1
    #[must_use]
    pub fn with_classification_settings(mut self, settings: ClassificationSettings) -> Self {
        self.state.get_mut().classification_versions = vec![settings];
        self
    }

    /// Add or replace a provider configuration; an active record deactivates the rest
    pub async fn upsert_provider_config(&self, record: ProviderConfigRecord) {
        let mut state = self.state.write().await;
        if record.is_active {
            for existing in &mut state.provider_configs {
                existing.is_active = false;
            }
        }
        state.provider_configs.retain(|r| r.name != record.name);
        state.provider_configs.push(record);
    }

    /// Turn a failure point on or off
    pub fn set_failure(&self, point: FailurePoint, failing: bool) {
        self.failures.switch(point).store(failing, Ordering::SeqCst);
    }

    /// Every stored turn of a conversation, oldest first
    pub async fn conversation(&self, conversation_id: Uuid) -> Vec<StoredMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Number of saved classification settings versions
    pub async fn classification_version_count(&self) -> usize {
        self.state.read().await.classification_versions.len()
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn active_classification_settings(&self) -> Result<Option<ClassificationSettings>> {
        self.failures.check(FailurePoint::SettingsReads)?;
        Ok(self.state.read().await.classification_versions.last().cloned())
    }

    async fn save_classification_settings(&self, settings: &ClassificationSettings) -> Result<u32> {
        let mut state = self.state.write().await;
        state.classification_versions.push(settings.clone());
        Ok(u32::try_from(state.classification_versions.len())?)
    }

    async fn active_provider_config(&self) -> Result<Option<ProviderConfigRecord>> {
        self.failures.check(FailurePoint::SettingsReads)?;
        Ok(self
            .state
            .read()
            .await
            .provider_configs
            .iter()
            .find(|r| r.is_active)
            .cloned())
    }

    async fn provider_config(&self, name: &str) -> Result<Option<ProviderConfigRecord>> {
        self.failures.check(FailurePoint::SettingsReads)?;
        Ok(self
            .state
            .read()
            .await
            .provider_configs
            .iter()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list_provider_configs(&self) -> Result<Vec<ProviderConfigRecord>> {
        self.failures.check(FailurePoint::SettingsReads)?;
        Ok(self.state.read().await.provider_configs.clone())
    }
}

#[async_trait]
impl PromptStore for InMemoryStore {
    async fn active_prompt(&self, name: &str) -> Result<Option<PromptTemplate>> {
        self.failures.check(FailurePoint::PromptReads)?;
        Ok(self
            .state
            .read()
            .await
            .prompts
            .iter()
            .find(|p| p.name == name && p.is_active)
            .cloned())
    }

    async fn publish_prompt_version(&self, name: &str, content: &str) -> Result<PromptTemplate> {
        let mut state = self.state.write().await;
        self.failures.check(FailurePoint::PromptWrites)?;

        let last_version = state
            .prompts
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.version)
            .max()
            .unwrap_or(0);
        for prompt in state.prompts.iter_mut().filter(|p| p.name == name) {
            prompt.is_active = false;
        }

        let template = PromptTemplate {
            name: name.to_owned(),
            content: content.to_owned(),
            version: last_version + 1,
            is_active: true,
            updated_at: Utc::now(),
        };
        state.prompts.push(template.clone());
        Ok(template)
    }

    async fn prompt_versions(&self, name: &str) -> Result<Vec<PromptTemplate>> {
        self.failures.check(FailurePoint::PromptReads)?;
        Ok(self
            .state
            .read()
            .await
            .prompts
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    async fn active_prompts(&self) -> Result<Vec<PromptTemplate>> {
        self.failures.check(FailurePoint::PromptReads)?;
        Ok(self
            .state
            .read()
            .await
            .prompts
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        metrics: Option<MessageMetrics>,
    ) -> Result<Uuid> {
        self.failures.check(FailurePoint::ConversationWrites)?;
        let id = Uuid::new_v4();
        self.state.write().await.messages.push(StoredMessage {
            id,
            conversation_id,
            role,
            content: content.to_owned(),
            metrics,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<StoredMessage>> {
        self.failures.check(FailurePoint::ConversationReads)?;
        Ok(self
            .state
            .read()
            .await
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryStore {
    async fn active_services(&self) -> Result<Vec<CompanyService>> {
        self.failures.check(FailurePoint::CompanyReads)?;
        Ok(self.state.read().await.services.clone())
    }

    async fn active_company_info(&self) -> Result<Option<CompanyInfo>> {
        self.failures.check(FailurePoint::CompanyReads)?;
        Ok(self.state.read().await.company_info.clone())
    }
}

fn search_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn score(product: &ProductCandidate, terms: &[String]) -> usize {
    let name = product.name.to_lowercase();
    let rest = [&product.article, &product.description, &product.category]
        .into_iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    terms
        .iter()
        .map(|term| {
            if name.contains(term.as_str()) {
                2
            } else {
                usize::from(rest.contains(term.as_str()))
            }
        })
        .sum()
}

#[async_trait]
impl ProductSearch for InMemoryStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductCandidate>> {
        self.failures.check(FailurePoint::ProductSearch)?;
        let terms = search_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut scored: Vec<(usize, &ProductCandidate)> = state
            .products
            .iter()
            .map(|p| (score(p, &terms), p))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, p)| p.clone())
            .collect())
    }
}

impl DataSession for InMemoryStore {
    fn conversations(&self) -> &dyn ConversationStore {
        self
    }

    fn settings(&self) -> &dyn SettingsStore {
        self
    }

    fn prompts(&self) -> &dyn PromptStore {
        self
    }

    fn company(&self) -> &dyn CompanyDirectory {
        self
    }
}
