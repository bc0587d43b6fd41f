// ABOUTME: Query pipeline turning one user message into a categorized assistant reply
// ABOUTME: Persists turns, classifies, dispatches to a category handler, and records usage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Search Orchestrator
//!
//! [`SearchOrchestrator::process_query`] runs strictly in sequence:
//!
//! 1. persist the user turn
//! 2. classify
//! 3. load the last 20 turns, oldest first
//! 4. run exactly one category handler
//! 5. persist the assistant turn with usage metrics when a provider was called
//! 6. return the reply
//!
//! Handlers degrade to a canned apology on their own failures. Anything else
//! (persistence) is caught once at the top and reported as `ERROR`. The caller
//! never sees an error.

use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::classification::QueryClassifier;
use crate::constants::llm::{GENERATION_MAX_TOKENS, GENERATION_TEMPERATURE};
use crate::constants::pipeline::{HISTORY_LIMIT, PRODUCT_PROMPT_LIMIT, PRODUCT_SEARCH_LIMIT};
use crate::errors::AppResult;
use crate::llm::prompts::{names, PromptManager};
use crate::llm::template::{safe_format, Bindings};
use crate::llm::{ChatMessage, GeneratedReply, MessageRole, ProviderResolver};
use crate::models::{
    CompanyService, MessageMetrics, ProductCandidate, QueryCategory, QueryResponse,
    ResponseCategory, SuggestedAction,
};
use crate::store::{DataSession, ProductSearch, UsageRecorder};

/// Persisted and returned when the pipeline itself fails
pub const GENERIC_APOLOGY: &str = "Sorry, something went wrong while processing your request. \
Please try again later or contact our manager.";

const COMPANY_INFO_FALLBACK: &str = "We are a supplier of industrial hardware and fasteners. \
Our managers will be glad to tell you more about the company, our terms of delivery, and \
how to visit us.";

const SOURCE_CATALOG: &str = "catalog_search";
const SOURCE_FALLBACK: &str = "llm_fallback";

/// Provider identity and token usage of the one metered call a handler made
#[derive(Debug, Clone)]
struct Meter {
    provider: String,
    model: String,
    total_tokens: Option<u32>,
}

impl From<&GeneratedReply> for Meter {
    fn from(reply: &GeneratedReply) -> Self {
        Self {
            provider: reply.provider_id.clone(),
            model: reply.model_id.clone(),
            total_tokens: reply.total_tokens(),
        }
    }
}

struct HandlerOutcome {
    response_text: String,
    metadata: Map<String, Value>,
    suggested_actions: Vec<SuggestedAction>,
    meter: Option<Meter>,
}

impl HandlerOutcome {
    fn generated(reply: &GeneratedReply, metadata: Map<String, Value>, actions: Vec<SuggestedAction>) -> Self {
        Self {
            response_text: reply.content.clone(),
            metadata,
            suggested_actions: actions,
            meter: Some(Meter::from(reply)),
        }
    }

    fn apology(category: QueryCategory) -> Self {
        let text = match category {
            QueryCategory::Product => {
                "Sorry, I could not search the catalog right now. A manager will help you find the right product."
            }
            QueryCategory::Service => {
                "Sorry, I could not load information about our services right now. A manager will tell you more."
            }
            QueryCategory::CompanyInfo => {
                "Sorry, I could not load information about the company right now. A manager will be glad to help."
            }
            QueryCategory::Contact => {
                "Sorry, something went wrong. Please leave your phone number or e-mail and a manager will contact you."
            }
            QueryCategory::General => {
                "Sorry, I could not process your request right now. Please try again or contact a manager."
            }
        };
        let mut metadata = Map::new();
        metadata.insert("degraded".to_owned(), Value::Bool(true));
        Self {
            response_text: text.to_owned(),
            metadata,
            suggested_actions: vec![SuggestedAction::ContactManager],
            meter: None,
        }
    }
}

/// Render product candidates as a numbered list for the product template
fn format_products(candidates: &[ProductCandidate]) -> String {
    let mut out = String::new();
    for (i, product) in candidates.iter().take(PRODUCT_PROMPT_LIMIT).enumerate() {
        let _ = write!(out, "{}. {}", i + 1, product.name);
        if let Some(article) = &product.article {
            let _ = write!(out, " (article {article})");
        }
        if let Some(description) = &product.description {
            let _ = write!(out, ": {description}");
        }
        if let Some(category) = &product.category {
            let _ = write!(out, " [{category}]");
        }
        out.push('\n');
    }
    out
}

fn format_services(services: &[CompanyService]) -> String {
    if services.is_empty() {
        return "No services are listed at the moment.".to_owned();
    }
    services
        .iter()
        .map(|s| match &s.description {
            Some(description) => format!("- {}: {description}", s.title),
            None => format!("- {}", s.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// History without the trailing copy of the current user turn
fn prior_turns<'a>(history: &'a [ChatMessage], query: &str) -> &'a [ChatMessage] {
    match history.split_last() {
        Some((last, rest)) if last.role == MessageRole::User && last.content == query => rest,
        _ => history,
    }
}

fn processing_time_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Turns user queries into categorized assistant replies
pub struct SearchOrchestrator {
    resolver: Arc<dyn ProviderResolver>,
    classifier: Arc<QueryClassifier>,
    prompts: Arc<PromptManager>,
    product_search: Arc<dyn ProductSearch>,
    usage: Arc<dyn UsageRecorder>,
}

impl SearchOrchestrator {
    /// Wire the orchestrator to its long-lived collaborators
    #[must_use]
    pub fn new(
        resolver: Arc<dyn ProviderResolver>,
        classifier: Arc<QueryClassifier>,
        prompts: Arc<PromptManager>,
        product_search: Arc<dyn ProductSearch>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        Self {
            resolver,
            classifier,
            prompts,
            product_search,
            usage,
        }
    }

    /// Process one user message; never fails
    #[instrument(skip_all, fields(%conversation_id, query_len = query.len()))]
    pub async fn process_query(
        &self,
        query: &str,
        conversation_id: Uuid,
        session: &dyn DataSession,
    ) -> QueryResponse {
        let started = Instant::now();
        match self.run_pipeline(query, conversation_id, session, started).await {
            Ok(response) => response,
            Err(e) => {
                error!("Query pipeline failed: {e}");
                if let Err(persist_err) = session
                    .conversations()
                    .append_message(conversation_id, MessageRole::Assistant, GENERIC_APOLOGY, None)
                    .await
                {
                    warn!("Failed to persist apology turn: {persist_err:#}");
                }
                QueryResponse {
                    response_text: GENERIC_APOLOGY.to_owned(),
                    category: ResponseCategory::Error,
                    metadata: Map::new(),
                    suggested_actions: vec![SuggestedAction::ContactManager],
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        query: &str,
        conversation_id: Uuid,
        session: &dyn DataSession,
        started: Instant,
    ) -> AppResult<QueryResponse> {
        session
            .conversations()
            .append_message(conversation_id, MessageRole::User, query, None)
            .await?;

        let category = self.classifier.classify(query, session.settings()).await;
        info!(%category, "Query classified");

        let history = self.load_history(conversation_id, session).await?;
        let outcome = self.dispatch(category, query, &history, session).await;

        let processing_ms = processing_time_ms(started);
        let metrics = outcome.meter.as_ref().map(|meter| MessageMetrics {
            provider: meter.provider.clone(),
            model: meter.model.clone(),
            total_tokens: meter.total_tokens,
            processing_time_ms: processing_ms,
        });
        session
            .conversations()
            .append_message(
                conversation_id,
                MessageRole::Assistant,
                &outcome.response_text,
                metrics,
            )
            .await?;

        let mut metadata = outcome.metadata;
        if let Some(meter) = &outcome.meter {
            self.record_usage(meter).await;
            metadata.insert("provider".to_owned(), json!(meter.provider));
            metadata.insert("model".to_owned(), json!(meter.model));
            if let Some(tokens) = meter.total_tokens {
                metadata.insert("totalTokens".to_owned(), json!(tokens));
            }
        }
        metadata.insert("processingTimeMs".to_owned(), json!(processing_ms));

        Ok(QueryResponse {
            response_text: outcome.response_text,
            category: category.into(),
            metadata,
            suggested_actions: outcome.suggested_actions,
        })
    }

    async fn load_history(
        &self,
        conversation_id: Uuid,
        session: &dyn DataSession,
    ) -> AppResult<Vec<ChatMessage>> {
        let mut recent = session
            .conversations()
            .recent_messages(conversation_id, HISTORY_LIMIT)
            .await?;
        recent.reverse();
        debug!(turns = recent.len(), "Conversation history loaded");
        Ok(recent
            .into_iter()
            .map(|m| ChatMessage::new(m.role, m.content))
            .collect())
    }

    async fn record_usage(&self, meter: &Meter) {
        let Some(tokens) = meter.total_tokens else {
            return;
        };
        if let Err(e) = self
            .usage
            .record_tokens(&meter.provider, &meter.model, tokens, chrono::Utc::now())
            .await
        {
            warn!(provider = %meter.provider, "Failed to record token usage: {e:#}");
        }
    }

    async fn dispatch(
        &self,
        category: QueryCategory,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> HandlerOutcome {
        let result = match category {
            QueryCategory::Product => self.handle_product(query, history, session).await,
            QueryCategory::Service => self.handle_service(query, history, session).await,
            QueryCategory::CompanyInfo => self.handle_company_info(query, history, session).await,
            QueryCategory::Contact => self.handle_contact(query, history, session).await,
            QueryCategory::General => self.handle_general(query, history, session).await,
        };
        result.unwrap_or_else(|e| {
            warn!(%category, "Handler failed, replying with apology: {e}");
            HandlerOutcome::apology(category)
        })
    }

    // ========================================================================
    // Category handlers
    // ========================================================================

    async fn handle_product(
        &self,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<HandlerOutcome> {
        let candidates = self.product_search.search(query, PRODUCT_SEARCH_LIMIT).await?;
        let mut metadata = Map::new();
        metadata.insert("searchResultsCount".to_owned(), json!(candidates.len()));

        if candidates.is_empty() {
            metadata.insert("source".to_owned(), json!(SOURCE_FALLBACK));
            let mut context = Map::new();
            context.insert("searchResultsCount".to_owned(), json!(0));
            context.insert("searchStatus".to_owned(), json!("no_results"));
            let reply = self
                .contextual_reply(query, history, names::GENERAL_CHAT, Some(&context), session)
                .await?;
            return Ok(HandlerOutcome::generated(
                &reply,
                metadata,
                vec![SuggestedAction::ContactManager, SuggestedAction::RefineSearch],
            ));
        }

        metadata.insert("source".to_owned(), json!(SOURCE_CATALOG));
        let bindings = Bindings::new()
            .text("query", query)
            .text("products", format_products(&candidates));
        let reply = self
            .templated_reply(query, history, names::PRODUCT_SEARCH, &bindings, session)
            .await?;
        Ok(HandlerOutcome::generated(
            &reply,
            metadata,
            vec![SuggestedAction::ContactManager, SuggestedAction::SearchMore],
        ))
    }

    async fn handle_service(
        &self,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<HandlerOutcome> {
        let services = session.company().active_services().await?;
        let mut metadata = Map::new();
        metadata.insert("servicesCount".to_owned(), json!(services.len()));

        let bindings = Bindings::new()
            .text("query", query)
            .text("services", format_services(&services));
        let reply = self
            .templated_reply(query, history, names::SERVICE_INFO, &bindings, session)
            .await?;
        Ok(HandlerOutcome::generated(
            &reply,
            metadata,
            vec![SuggestedAction::ContactManager],
        ))
    }

    async fn handle_company_info(
        &self,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<HandlerOutcome> {
        let info = session.company().active_company_info().await?;
        let mut metadata = Map::new();
        metadata.insert("hasCompanyInfo".to_owned(), json!(info.is_some()));

        let content = info.map_or_else(|| COMPANY_INFO_FALLBACK.to_owned(), |i| i.content);
        let bindings = Bindings::new()
            .text("query", query)
            .text("company_info", content);
        let reply = self
            .templated_reply(query, history, names::COMPANY_INFO, &bindings, session)
            .await?;
        Ok(HandlerOutcome::generated(
            &reply,
            metadata,
            vec![SuggestedAction::ContactManager],
        ))
    }

    async fn handle_contact(
        &self,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<HandlerOutcome> {
        let mut context = Map::new();
        context.insert("actionRequired".to_owned(), json!("createLead"));
        let reply = self
            .contextual_reply(query, history, names::LEAD_QUALIFICATION, Some(&context), session)
            .await?;
        Ok(HandlerOutcome::generated(
            &reply,
            context,
            vec![SuggestedAction::ProvideContacts, SuggestedAction::CreateLead],
        ))
    }

    async fn handle_general(
        &self,
        query: &str,
        history: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<HandlerOutcome> {
        let reply = self
            .contextual_reply(query, history, names::GENERAL_CHAT, None, session)
            .await?;
        Ok(HandlerOutcome::generated(&reply, Map::new(), Vec::new()))
    }

    // ========================================================================
    // Generation helpers
    // ========================================================================

    async fn system_prompt(
        &self,
        instructions: Option<&str>,
        context: Option<&Map<String, Value>>,
        session: &dyn DataSession,
    ) -> String {
        let mut system = self.prompts.get_prompt(names::SYSTEM, session.prompts()).await;
        if let Some(name) = instructions {
            let extra = self.prompts.get_prompt(name, session.prompts()).await;
            if !extra.trim().is_empty() {
                system.push_str("\n\n");
                system.push_str(&extra);
            }
        }
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            let _ = write!(system, "\n\nContext data: {}", Value::Object(context.clone()));
        }
        system
    }

    /// Full history, ending with the current user turn
    async fn contextual_reply(
        &self,
        query: &str,
        history: &[ChatMessage],
        instructions: &str,
        context: Option<&Map<String, Value>>,
        session: &dyn DataSession,
    ) -> AppResult<GeneratedReply> {
        let system = self.system_prompt(Some(instructions), context, session).await;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(prior_turns(history, query));
        messages.push(ChatMessage::user(query));
        self.generate(&messages, session).await
    }

    /// Prior history followed by the rendered template as the user turn
    async fn templated_reply(
        &self,
        query: &str,
        history: &[ChatMessage],
        template_name: &str,
        bindings: &Bindings,
        session: &dyn DataSession,
    ) -> AppResult<GeneratedReply> {
        let template = self.prompts.get_prompt(template_name, session.prompts()).await;
        let rendered = safe_format(&template, bindings)?;
        let system = self.system_prompt(None, None, session).await;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(prior_turns(history, query));
        messages.push(ChatMessage::user(rendered));
        self.generate(&messages, session).await
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        session: &dyn DataSession,
    ) -> AppResult<GeneratedReply> {
        let provider = self.resolver.active_provider(session.settings()).await?;
        let reply = provider
            .generate_response(messages, GENERATION_TEMPERATURE, GENERATION_MAX_TOKENS)
            .await?;
        debug!(
            provider = %reply.provider_id,
            tokens = ?reply.total_tokens(),
            "Reply generated"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_products_caps_and_renders_optional_fields() {
        let mut products: Vec<ProductCandidate> = (1..=7)
            .map(|i| ProductCandidate::named(format!("Bolt {i}")))
            .collect();
        products[0].article = Some("B-1".to_owned());
        products[0].description = Some("steel".to_owned());
        products[0].category = Some("fasteners".to_owned());

        let rendered = format_products(&products);
        assert_eq!(rendered.lines().count(), PRODUCT_PROMPT_LIMIT);
        assert_eq!(
            rendered.lines().next().unwrap(),
            "1. Bolt 1 (article B-1): steel [fasteners]"
        );
        assert!(!rendered.contains("Bolt 6"));
    }

    #[test]
    fn test_prior_turns_drops_trailing_query() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("bolts?"),
        ];
        assert_eq!(prior_turns(&history, "bolts?").len(), 2);
        assert_eq!(prior_turns(&history, "nuts?").len(), 3);
        assert!(prior_turns(&[], "x").is_empty());
    }

    #[test]
    fn test_format_services() {
        let services = vec![
            CompanyService {
                title: "Delivery".to_owned(),
                description: Some("Same day in the city".to_owned()),
                category: None,
                keywords: Vec::new(),
            },
            CompanyService {
                title: "Cutting".to_owned(),
                description: None,
                category: None,
                keywords: Vec::new(),
            },
        ];
        assert_eq!(
            format_services(&services),
            "- Delivery: Same day in the city\n- Cutting"
        );
    }
}
