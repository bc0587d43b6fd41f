// ABOUTME: Application constants for the classification and response pipeline
// ABOUTME: History windows, search limits, generation parameters, and cache lifetimes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Service identity used in structured logs
pub mod service_names {
    /// Service name
    pub const SALES_ASSISTANT: &str = "sales-assistant";
}

/// Provider call parameters
pub mod llm {
    /// Temperature for user-facing generation
    pub const GENERATION_TEMPERATURE: f32 = 0.7;
    /// Token budget for user-facing generation
    pub const GENERATION_MAX_TOKENS: u32 = 1000;
    /// Temperature for classification calls
    pub const CLASSIFICATION_TEMPERATURE: f32 = 0.1;
    /// Token budget for classification calls
    pub const CLASSIFICATION_MAX_TOKENS: u32 = 50;
    /// Token budget for the health probe
    pub const HEALTH_CHECK_MAX_TOKENS: u32 = 5;
    /// Deadline for the health probe
    pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;
    /// Per-request timeout when a config does not set one
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

/// Orchestrator limits
pub mod pipeline {
    /// Conversation turns handed to the provider as context
    pub const HISTORY_LIMIT: usize = 20;
    /// Candidates requested from product search
    pub const PRODUCT_SEARCH_LIMIT: usize = 10;
    /// Candidates rendered into the product prompt
    pub const PRODUCT_PROMPT_LIMIT: usize = 5;
}

/// Cache lifetimes and projections
pub mod cache {
    /// Classification settings TTL
    pub const CLASSIFICATION_SETTINGS_TTL_SECS: u64 = 300;
    /// Characters kept in prompt listing previews
    pub const PROMPT_PREVIEW_CHARS: usize = 100;
}
