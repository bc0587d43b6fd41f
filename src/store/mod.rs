// ABOUTME: Persistence collaborator traits consumed by the assistant core
// ABOUTME: Settings, prompts, conversations, company data, product search, and usage accounting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Store Abstraction
//!
//! The core never opens its own persistence connection. Callers hand in a
//! [`DataSession`] per request and keep ownership of its transaction
//! boundaries. Long-lived collaborators ([`ProductSearch`], [`UsageRecorder`])
//! are injected once at construction.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classification::ClassificationSettings;
use crate::config::ProviderConfigRecord;
use crate::llm::MessageRole;
use crate::models::{
    CompanyInfo, CompanyService, MessageMetrics, ProductCandidate, PromptTemplate, StoredMessage,
};

pub mod memory;

pub use memory::InMemoryStore;

/// Versioned classification settings and provider configurations
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Currently active classification settings, if any version was saved
    async fn active_classification_settings(&self) -> Result<Option<ClassificationSettings>>;

    /// Store a new active settings version, deactivating the previous one
    ///
    /// Returns the new version number.
    async fn save_classification_settings(&self, settings: &ClassificationSettings)
        -> Result<u32>;

    /// The provider configuration flagged active
    async fn active_provider_config(&self) -> Result<Option<ProviderConfigRecord>>;

    /// Provider configuration by name, regardless of the active flag
    async fn provider_config(&self, name: &str) -> Result<Option<ProviderConfigRecord>>;

    /// Every stored provider configuration
    async fn list_provider_configs(&self) -> Result<Vec<ProviderConfigRecord>>;
}

/// Versioned prompt templates
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Active version of the named template
    async fn active_prompt(&self, name: &str) -> Result<Option<PromptTemplate>>;

    /// Deactivate all versions of `name` and insert `last + 1` as active
    ///
    /// Must be a single atomic unit: on error the previous active version is
    /// left untouched.
    async fn publish_prompt_version(&self, name: &str, content: &str) -> Result<PromptTemplate>;

    /// Every stored version of `name`, oldest first
    async fn prompt_versions(&self, name: &str) -> Result<Vec<PromptTemplate>>;

    /// Active version of every template
    async fn active_prompts(&self) -> Result<Vec<PromptTemplate>>;
}

/// Conversation history
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist one turn and return its id
    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        metrics: Option<MessageMetrics>,
    ) -> Result<Uuid>;

    /// Up to `limit` most recent turns, newest first
    async fn recent_messages(&self, conversation_id: Uuid, limit: usize)
        -> Result<Vec<StoredMessage>>;
}

/// Company services and the company information document
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Services currently offered
    async fn active_services(&self) -> Result<Vec<CompanyService>>;

    /// Active company information document
    async fn active_company_info(&self) -> Result<Option<CompanyInfo>>;
}

/// Ranked product catalog search
#[async_trait]
pub trait ProductSearch: Send + Sync {
    /// Best-first candidates, at most `limit`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ProductCandidate>>;
}

/// Token accounting sink
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Record tokens spent by one generation call
    async fn record_tokens(
        &self,
        provider: &str,
        model: &str,
        tokens: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;
}

/// Caller-owned persistence session passed into each request
pub trait DataSession: Send + Sync {
    /// Conversation history
    fn conversations(&self) -> &dyn ConversationStore;

    /// Settings and provider configs
    fn settings(&self) -> &dyn SettingsStore;

    /// Prompt templates
    fn prompts(&self) -> &dyn PromptStore;

    /// Company data
    fn company(&self) -> &dyn CompanyDirectory;
}
