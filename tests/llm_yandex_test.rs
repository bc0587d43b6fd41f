// ABOUTME: Integration tests for the YandexGPT provider against a mock completion endpoint
// ABOUTME: Verifies auth headers, model URI addressing, string token counters, and error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use sales_assistant::config::YandexGptConfig;
use sales_assistant::llm::{ChatMessage, LlmProvider, ProviderError, YandexGptProvider};
use sales_assistant::models::QueryCategory;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETION_PATH: &str = "/foundationModels/v1/completion";

fn config(server: &MockServer) -> YandexGptConfig {
    YandexGptConfig {
        api_key: "yc-key".to_owned(),
        folder_id: "b1gfolder".to_owned(),
        model: "yandexgpt-lite".to_owned(),
        endpoint: format!("{}{COMPLETION_PATH}", server.uri()),
        timeout_secs: 5,
    }
}

fn completion(text: &str, usage: serde_json::Value) -> serde_json::Value {
    json!({
        "result": {
            "alternatives": [{
                "message": { "role": "assistant", "text": text },
                "status": "ALTERNATIVE_STATUS_FINAL"
            }],
            "usage": usage,
            "modelVersion": "23.10.2024"
        }
    })
}

fn provider(server: &MockServer) -> YandexGptProvider {
    common::init_test_logging();
    YandexGptProvider::new(config(server)).unwrap()
}

#[tokio::test]
async fn test_request_shape_and_string_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .and(header("Authorization", "Api-Key yc-key"))
        .and(header("x-folder-id", "b1gfolder"))
        .and(body_partial_json(json!({
            "modelUri": "gpt://b1gfolder/yandexgpt-lite/latest",
            "completionOptions": { "stream": false, "maxTokens": "250" },
            "messages": [
                { "role": "system", "text": "be polite" },
                { "role": "user", "text": "hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Good afternoon!",
            json!({ "inputTextTokens": "19", "completionTokens": "4", "totalTokens": "23" }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reply = provider(&server)
        .generate_response(
            &[ChatMessage::system("be polite"), ChatMessage::user("hello")],
            0.6,
            250,
        )
        .await
        .unwrap();

    assert_eq!(reply.content, "Good afternoon!");
    assert_eq!(reply.provider_id, "yandexgpt");
    assert_eq!(reply.model_id, "yandexgpt-lite");
    let usage = reply.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 19);
    assert_eq!(usage.completion_tokens, 4);
    assert_eq!(usage.total_tokens, 23);
    let metadata = reply.metadata.unwrap();
    assert_eq!(metadata["model_version"], "23.10.2024");
}

#[tokio::test]
async fn test_unparseable_usage_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "ok",
            json!({ "inputTextTokens": "many", "completionTokens": 1, "totalTokens": "2" }),
        )))
        .mount(&server)
        .await;

    let reply = provider(&server)
        .generate_response(&[ChatMessage::user("hello")], 0.3, 10)
        .await
        .unwrap();
    assert!(reply.usage.is_none());
}

#[tokio::test]
async fn test_versioned_model_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .and(body_partial_json(json!({ "modelUri": "gpt://b1gfolder/yandexgpt/rc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok", json!(null))))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(&server);
    cfg.model = "yandexgpt/rc".to_owned();
    let provider = YandexGptProvider::new(cfg).unwrap();
    assert_eq!(provider.model_uri(), "gpt://b1gfolder/yandexgpt/rc");

    let reply = provider
        .generate_response(&[ChatMessage::user("hello")], 0.3, 10)
        .await
        .unwrap();
    assert!(reply.usage.is_none());
}

#[tokio::test]
async fn test_http_429_is_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "grpcCode": 8, "message": "ai.textGenerationCompletionSessionsCount.count gets threshold" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate_response(&[ChatMessage::user("hello")], 0.3, 10)
        .await
        .unwrap_err();
    match err {
        ProviderError::RateLimitExceeded { provider, message } => {
            assert_eq!(provider, "yandexgpt");
            assert!(message.contains("threshold"));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_auth_failure_is_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Unknown api key" })),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate_response(&[ChatMessage::user("hello")], 0.3, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ProviderFailure { .. }));
    assert!(err.to_string().contains("Unknown api key"));
    assert_eq!(err.provider(), "yandexgpt");
}

#[tokio::test]
async fn test_empty_alternatives_is_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "alternatives": [] } })),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate_response(&[ChatMessage::user("hello")], 0.3, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ProviderFailure { .. }));
}

#[tokio::test]
async fn test_classify_query_sends_system_brief() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .and(body_partial_json(json!({ "completionOptions": { "maxTokens": "50" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Contact", json!(null))))
        .expect(1)
        .mount(&server)
        .await;

    let category = provider(&server)
        .classify_query("please call me back, {name}")
        .await
        .unwrap();
    assert_eq!(category, QueryCategory::Contact);
}
