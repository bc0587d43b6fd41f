// ABOUTME: Main library entry point for the sales assistant core
// ABOUTME: Query classification, response routing, prompt management, and pluggable LLM providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Sales Assistant Core
//!
//! Turns a customer's free-text message into a categorized, context-aware
//! reply. Transport layers (web chat, messengers, admin panels) sit outside
//! this crate and hand in a persistence session per request.
//!
//! ## Architecture
//!
//! - **LLM**: provider trait, two backends, a caching factory, and templates
//! - **Classification**: keyword fast path with an LLM fallback
//! - **Services**: the query orchestrator and usage accounting
//! - **Store**: persistence traits plus an in-memory implementation
//! - **Config**: environment-driven configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sales_assistant::classification::QueryClassifier;
//! use sales_assistant::config::AssistantConfig;
//! use sales_assistant::errors::AppResult;
//! use sales_assistant::llm::{prompts::PromptManager, ProviderFactory};
//! use sales_assistant::services::{SearchOrchestrator, UsageTracker};
//! use sales_assistant::store::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = AssistantConfig::from_env()?;
//!     let factory = Arc::new(ProviderFactory::new(config.default_provider));
//!     let classifier = Arc::new(QueryClassifier::with_ttl(
//!         factory.clone(),
//!         config.classification_cache_ttl,
//!     ));
//!     let store = Arc::new(InMemoryStore::new());
//!     let orchestrator = SearchOrchestrator::new(
//!         factory,
//!         classifier,
//!         Arc::new(PromptManager::new()),
//!         store.clone(),
//!         Arc::new(UsageTracker::new(config.usage)),
//!     );
//!
//!     let reply = orchestrator
//!         .process_query("Do you have M12 bolts?", uuid::Uuid::new_v4(), store.as_ref())
//!         .await;
//!     println!("[{}] {}", reply.category, reply.response_text);
//!     Ok(())
//! }
//! ```

/// Two-tier query classification
pub mod classification;

/// Environment-driven configuration
pub mod config;

/// Pipeline limits, generation parameters, and cache lifetimes
pub mod constants;

/// Unified error handling with stable error codes
pub mod errors;

/// LLM provider abstraction, backends, factory, and prompt templates
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Domain types shared across modules
pub mod models;

/// Query orchestration and usage accounting
pub mod services;

/// Persistence collaborator traits and the in-memory store
pub mod store;
