// ABOUTME: Versioned prompt templates with built-in defaults loaded at compile time
// ABOUTME: Cache-first lookup that seeds missing templates and never blocks the response path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Prompt Manager
//!
//! Templates are data: operators edit them in the prompt store and every edit
//! becomes a new active version. The built-in defaults below are markdown files
//! compiled into the binary and seeded into the store the first time a name is
//! requested.

use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::constants::cache::PROMPT_PREVIEW_CHARS;
use crate::errors::AppResult;
use crate::models::PromptSummary;
use crate::store::PromptStore;

/// Well-known template names
pub mod names {
    /// Base system instructions
    pub const SYSTEM: &str = "system";
    /// Product answer; placeholders `{query}`, `{products}`
    pub const PRODUCT_SEARCH: &str = "product_search";
    /// Service answer; placeholders `{query}`, `{services}`
    pub const SERVICE_INFO: &str = "service_info";
    /// Company answer; placeholders `{query}`, `{company_info}`
    pub const COMPANY_INFO: &str = "company_info";
    /// General conversation instructions
    pub const GENERAL_CHAT: &str = "general_chat";
    /// Contact / lead capture instructions
    pub const LEAD_QUALIFICATION: &str = "lead_qualification";
}

/// Built-in default templates
pub const DEFAULT_PROMPTS: [(&str, &str); 6] = [
    (names::SYSTEM, include_str!("system.md")),
    (names::PRODUCT_SEARCH, include_str!("product_search.md")),
    (names::SERVICE_INFO, include_str!("service_info.md")),
    (names::COMPANY_INFO, include_str!("company_info.md")),
    (names::GENERAL_CHAT, include_str!("general_chat.md")),
    (names::LEAD_QUALIFICATION, include_str!("lead_qualification.md")),
];

/// Built-in default for a template name
#[must_use]
pub fn default_prompt(name: &str) -> Option<&'static str> {
    DEFAULT_PROMPTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
}

/// Cache-first access to versioned prompt templates
#[derive(Debug, Default)]
pub struct PromptManager {
    cache: DashMap<String, String>,
}

impl PromptManager {
    /// Create a manager with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active template content for `name`
    ///
    /// Falls back to the built-in default when the store has no version
    /// (seeding it as version 1) or when the store fails. Unknown names with
    /// no default yield an empty template.
    pub async fn get_prompt(&self, name: &str, store: &dyn PromptStore) -> String {
        if let Some(cached) = self.cache.get(name) {
            return cached.value().clone();
        }

        match store.active_prompt(name).await {
            Ok(Some(template)) => {
                self.cache.insert(name.to_owned(), template.content.clone());
                template.content
            }
            Ok(None) => {
                let Some(default) = default_prompt(name) else {
                    warn!(prompt = name, "No stored or built-in template");
                    return String::new();
                };
                match store.publish_prompt_version(name, default).await {
                    Ok(seeded) => info!(prompt = name, version = seeded.version, "Seeded default prompt"),
                    Err(e) => warn!(prompt = name, "Failed to seed default prompt: {e:#}"),
                }
                self.cache.insert(name.to_owned(), default.to_owned());
                default.to_owned()
            }
            Err(e) => {
                warn!(prompt = name, "Prompt store unavailable, using built-in default: {e:#}");
                default_prompt(name).unwrap_or_default().to_owned()
            }
        }
    }

    /// Publish new content for `name` as the single active version
    ///
    /// Returns `false` (leaving the previous version active) on blank content
    /// or store failure.
    pub async fn update_prompt(&self, name: &str, content: &str, store: &dyn PromptStore) -> bool {
        if content.trim().is_empty() {
            warn!(prompt = name, "Refusing to publish an empty prompt");
            return false;
        }

        match store.publish_prompt_version(name, content).await {
            Ok(published) => {
                self.cache.remove(name);
                info!(prompt = name, version = published.version, "Prompt updated");
                true
            }
            Err(e) => {
                warn!(prompt = name, "Prompt update failed: {e:#}");
                false
            }
        }
    }

    /// Summary of the active version of every stored template
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn list_prompts(
        &self,
        store: &dyn PromptStore,
    ) -> AppResult<BTreeMap<String, PromptSummary>> {
        let prompts = store.active_prompts().await?;
        Ok(prompts
            .into_iter()
            .map(|template| {
                let summary = PromptSummary {
                    version: template.version,
                    is_active: template.is_active,
                    content_preview: template.content.chars().take(PROMPT_PREVIEW_CHARS).collect(),
                    updated_at: template.updated_at,
                };
                (template.name, summary)
            })
            .collect())
    }

    /// Drop all cached template bodies
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        debug!(dropped, "Prompt cache cleared");
    }
}
