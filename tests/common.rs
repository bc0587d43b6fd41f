// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides scripted LLM providers, resolvers, and a wired orchestrator harness
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `sales_assistant`

use async_trait::async_trait;
use sales_assistant::classification::QueryClassifier;
use sales_assistant::config::{OpenAiCompatibleConfig, UsageLimits};
use sales_assistant::errors::AppResult;
use sales_assistant::llm::prompts::PromptManager;
use sales_assistant::llm::{
    ChatMessage, GeneratedReply, LlmProvider, ProviderError, ProviderResolver, TokenUsage,
};
use sales_assistant::models::QueryCategory;
use sales_assistant::services::{SearchOrchestrator, UsageTracker};
use sales_assistant::store::{InMemoryStore, SettingsStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Chat-completions config pointing at a mock server
pub fn openai_config(base_url: &str) -> OpenAiCompatibleConfig {
    OpenAiCompatibleConfig {
        base_url: base_url.to_owned(),
        api_key: Some("test-key".to_owned()),
        model: "gpt-test".to_owned(),
        timeout_secs: 5,
    }
}

/// Provider with canned replies that records every call
pub struct ScriptedProvider {
    pub reply: String,
    pub usage: Option<TokenUsage>,
    pub classification: QueryCategory,
    pub fail_generation: bool,
    pub fail_classification: bool,
    pub generate_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            usage: Some(TokenUsage {
                prompt_tokens: 80,
                completion_tokens: 20,
                total_tokens: 100,
            }),
            classification: QueryCategory::General,
            fail_generation: false,
            fail_classification: false,
            generate_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn classifying(mut self, category: QueryCategory) -> Self {
        self.classification = category;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_generation = true;
        self.fail_classification = true;
        self
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn classify_count(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<GeneratedReply, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        if self.fail_generation {
            return Err(ProviderError::Timeout {
                provider: "scripted".to_owned(),
                timeout_secs: 1,
            });
        }
        Ok(GeneratedReply {
            content: self.reply.clone(),
            provider_id: "scripted".to_owned(),
            model_id: "scripted-model".to_owned(),
            usage: self.usage,
            metadata: None,
        })
    }

    async fn classify_query(&self, _query: &str) -> Result<QueryCategory, ProviderError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_classification {
            return Err(ProviderError::failure("scripted", "classification unavailable"));
        }
        Ok(self.classification)
    }
}

/// Resolver that always hands out the same provider
pub struct StaticResolver {
    pub provider: Arc<ScriptedProvider>,
    pub resolutions: AtomicUsize,
}

impl StaticResolver {
    pub fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            resolutions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProviderResolver for StaticResolver {
    async fn active_provider(&self, _settings: &dyn SettingsStore) -> AppResult<Arc<dyn LlmProvider>> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.provider) as Arc<dyn LlmProvider>)
    }
}

/// Orchestrator wired to a scripted provider and an in-memory store
pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<InMemoryStore>,
    pub usage: Arc<UsageTracker>,
    pub orchestrator: SearchOrchestrator,
}

pub fn harness(provider: ScriptedProvider, store: InMemoryStore) -> Harness {
    init_test_logging();
    let provider = Arc::new(provider);
    let store = Arc::new(store);
    let usage = Arc::new(UsageTracker::new(UsageLimits::default()));
    let resolver: Arc<dyn ProviderResolver> = Arc::new(StaticResolver::new(Arc::clone(&provider)));
    let classifier = Arc::new(QueryClassifier::new(Arc::clone(&resolver)));
    let orchestrator = SearchOrchestrator::new(
        resolver,
        classifier,
        Arc::new(PromptManager::new()),
        Arc::clone(&store) as Arc<dyn sales_assistant::store::ProductSearch>,
        Arc::clone(&usage) as Arc<dyn sales_assistant::store::UsageRecorder>,
    );
    Harness {
        provider,
        store,
        usage,
        orchestrator,
    }
}
