// ABOUTME: Core domain types shared by the classifier, orchestrator, and store collaborators
// ABOUTME: Query categories, suggested actions, catalog records, stored turns, and prompt versions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::llm::MessageRole;

// ============================================================================
// Classification
// ============================================================================

/// Classification of user intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryCategory {
    /// Product catalog question
    Product,
    /// Company services question
    Service,
    /// Question about the company itself
    CompanyInfo,
    /// Anything else
    General,
    /// Wants to reach a person / leave contact details
    Contact,
}

impl QueryCategory {
    /// All categories, in label order
    pub const ALL: [Self; 5] = [
        Self::Product,
        Self::Service,
        Self::CompanyInfo,
        Self::General,
        Self::Contact,
    ];

    /// Persisted/string label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "PRODUCT",
            Self::Service => "SERVICE",
            Self::CompanyInfo => "COMPANY_INFO",
            Self::General => "GENERAL",
            Self::Contact => "CONTACT",
        }
    }

    /// Parse an exact label (already trimmed and uppercased)
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category reported back to the transport layer
///
/// Adds the `ERROR` marker used when the whole pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCategory {
    /// Routed through the product handler
    Product,
    /// Routed through the service handler
    Service,
    /// Routed through the company-info handler
    CompanyInfo,
    /// Routed through the general handler
    General,
    /// Routed through the contact handler
    Contact,
    /// Pipeline failure
    Error,
}

impl ResponseCategory {
    /// String label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "PRODUCT",
            Self::Service => "SERVICE",
            Self::CompanyInfo => "COMPANY_INFO",
            Self::General => "GENERAL",
            Self::Contact => "CONTACT",
            Self::Error => "ERROR",
        }
    }
}

impl From<QueryCategory> for ResponseCategory {
    fn from(category: QueryCategory) -> Self {
        match category {
            QueryCategory::Product => Self::Product,
            QueryCategory::Service => Self::Service,
            QueryCategory::CompanyInfo => Self::CompanyInfo,
            QueryCategory::General => Self::General,
            QueryCategory::Contact => Self::Contact,
        }
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI affordance hints returned with every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestedAction {
    /// Offer to connect with a manager
    ContactManager,
    /// Offer more results for the same search
    SearchMore,
    /// Ask the user to rephrase the search
    RefineSearch,
    /// Show company contact details
    ProvideContacts,
    /// Start lead capture
    CreateLead,
}

impl SuggestedAction {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContactManager => "contactManager",
            Self::SearchMore => "searchMore",
            Self::RefineSearch => "refineSearch",
            Self::ProvideContacts => "provideContacts",
            Self::CreateLead => "createLead",
        }
    }
}

// ============================================================================
// Catalog and company data
// ============================================================================

/// Ranked product search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCandidate {
    /// Product name
    pub name: String,
    /// Article / SKU code
    pub article: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Catalog category
    pub category: Option<String>,
}

impl ProductCandidate {
    /// Candidate with only a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            article: None,
            description: None,
            category: None,
        }
    }
}

/// Service the company offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyService {
    /// Service title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Grouping
    pub category: Option<String>,
    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Active company information document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    /// Document body
    pub content: String,
}

// ============================================================================
// Conversation persistence
// ============================================================================

/// Usage metrics attached to a persisted assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetrics {
    /// Provider identifier
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Total tokens, when the backend reported them
    pub total_tokens: Option<u32>,
    /// Wall-clock processing time for the request
    pub processing_time_ms: u64,
}

/// A persisted conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message ID
    pub id: Uuid,
    /// Conversation the message belongs to
    pub conversation_id: Uuid,
    /// Author role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Usage metrics (assistant turns only)
    pub metrics: Option<MessageMetrics>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Prompt templates
// ============================================================================

/// One stored version of a named prompt template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique template name
    pub name: String,
    /// Template text with `{placeholder}` markers
    pub content: String,
    /// Monotonically increasing per name, starting at 1
    pub version: u32,
    /// Exactly one version per name is active
    pub is_active: bool,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Read-only projection of the active version of a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSummary {
    /// Active version number
    pub version: u32,
    /// Active flag
    pub is_active: bool,
    /// First characters of the content
    pub content_preview: String,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Pipeline output
// ============================================================================

/// Result of processing one user query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Natural-language reply for the user
    pub response_text: String,
    /// Category the query was routed to
    pub category: ResponseCategory,
    /// Side-channel data (result counts, source, provider, tokens)
    pub metadata: Map<String, Value>,
    /// UI affordance hints
    pub suggested_actions: Vec<SuggestedAction>,
}
