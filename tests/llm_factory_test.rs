// ABOUTME: Integration tests for provider resolution, caching, fallback, and health scans
// ABOUTME: Uses the in-memory settings store and mock backends; env-driven cases run serially
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::openai_config;
use sales_assistant::config::{
    LlmProviderType, OpenAiCompatibleConfig, ProviderConfig, ProviderConfigRecord, YandexGptConfig,
};
use sales_assistant::errors::ErrorCode;
use sales_assistant::llm::factory::DEFAULT_PROVIDER_KEY;
use sales_assistant::llm::ProviderFactory;
use sales_assistant::store::memory::FailurePoint;
use sales_assistant::store::InMemoryStore;
use serde_json::json;
use serial_test::serial;
use std::env;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn default_config() -> ProviderConfig {
    ProviderConfig::OpenAi(OpenAiCompatibleConfig {
        base_url: "http://127.0.0.1:9/v1".to_owned(),
        api_key: None,
        model: "default-model".to_owned(),
        timeout_secs: 2,
    })
}

fn yandex(api_key: &str) -> ProviderConfig {
    ProviderConfig::YandexGpt(YandexGptConfig {
        api_key: api_key.to_owned(),
        folder_id: "b1gfolder".to_owned(),
        model: "yandexgpt".to_owned(),
        endpoint: "http://127.0.0.1:9/completion".to_owned(),
        timeout_secs: 2,
    })
}

fn record(name: &str, config: ProviderConfig, is_active: bool) -> ProviderConfigRecord {
    ProviderConfigRecord {
        name: name.to_owned(),
        config,
        is_active,
    }
}

#[tokio::test]
async fn test_no_active_config_uses_default() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();

    let provider = factory.get_active_provider(&store).await.unwrap();
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model(), "default-model");
}

#[tokio::test]
async fn test_active_config_is_used_and_cached() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record("primary", yandex("yc-key"), true))
        .await;

    let first = factory.get_active_provider(&store).await.unwrap();
    let second = factory.get_active_provider(&store).await.unwrap();
    assert_eq!(first.name(), "yandexgpt");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.cached_provider_count(), 1);
}

#[tokio::test]
async fn test_unconstructible_active_config_falls_back() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record("broken", yandex(""), true))
        .await;

    let provider = factory.get_active_provider(&store).await.unwrap();
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model(), "default-model");
}

#[tokio::test]
async fn test_settings_failure_falls_back() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record("primary", yandex("yc-key"), true))
        .await;
    store.set_failure(FailurePoint::SettingsReads, true);

    let provider = factory.get_active_provider(&store).await.unwrap();
    assert_eq!(provider.name(), "openai");
}

#[tokio::test]
async fn test_unusable_default_is_an_error() {
    common::init_test_logging();
    let factory = ProviderFactory::new(yandex(""));
    let store = InMemoryStore::new();

    let err = factory.get_active_provider(&store).await.err().unwrap();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
}

#[tokio::test]
async fn test_provider_by_name() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record("backup", yandex("yc-key"), false))
        .await;

    let backup = factory
        .get_provider_by_name("backup", &store)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(backup.name(), "yandexgpt");

    assert!(factory
        .get_provider_by_name("missing", &store)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_activating_a_config_deactivates_the_rest() {
    common::init_test_logging();
    let factory = ProviderFactory::new(default_config());
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record("first", yandex("yc-key"), true))
        .await;
    store
        .upsert_provider_config(record(
            "second",
            ProviderConfig::OpenAi(openai_config("http://127.0.0.1:9/v1")),
            true,
        ))
        .await;

    let provider = factory.get_active_provider(&store).await.unwrap();
    assert_eq!(provider.name(), "openai");
    assert_eq!(provider.model(), "gpt-test");
}

#[tokio::test]
async fn test_health_check_all_reports_every_config() {
    common::init_test_logging();
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "pong" } }]
        })))
        .mount(&healthy)
        .await;

    let unhealthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&unhealthy)
        .await;

    let factory = ProviderFactory::new(ProviderConfig::OpenAi(openai_config(&format!(
        "{}/v1",
        unhealthy.uri()
    ))));
    let store = InMemoryStore::new();
    store
        .upsert_provider_config(record(
            "local",
            ProviderConfig::OpenAi(openai_config(&format!("{}/v1", healthy.uri()))),
            true,
        ))
        .await;
    store
        .upsert_provider_config(record("broken", yandex(""), false))
        .await;

    let report = factory.health_check_all(&store).await;
    assert_eq!(report.len(), 3);
    assert_eq!(report.get("local"), Some(&true));
    assert_eq!(report.get("broken"), Some(&false));
    assert_eq!(report.get(DEFAULT_PROVIDER_KEY), Some(&false));
}

fn clear_provider_env() {
    for key in [
        LlmProviderType::ENV_VAR,
        LlmProviderType::MODEL_ENV_VAR,
        LlmProviderType::TIMEOUT_ENV_VAR,
        "OPENAI_BASE_URL",
        "OPENAI_API_KEY",
        "YANDEX_API_KEY",
        "YANDEX_FOLDER_ID",
        "YANDEX_ENDPOINT",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults_to_openai() {
    clear_provider_env();
    env::set_var(LlmProviderType::MODEL_ENV_VAR, "qwen2.5");
    env::set_var("OPENAI_BASE_URL", "http://localhost:11434/v1");

    let factory = ProviderFactory::from_env().unwrap();
    match factory.default_config() {
        ProviderConfig::OpenAi(config) => {
            assert_eq!(config.base_url, "http://localhost:11434/v1");
            assert_eq!(config.model, "qwen2.5");
            assert!(config.api_key.is_none());
            assert_eq!(config.timeout_secs, 30);
        }
        other => panic!("unexpected default: {other:?}"),
    }
    clear_provider_env();
}

#[test]
#[serial]
fn test_from_env_yandex_requires_credentials() {
    clear_provider_env();
    env::set_var(LlmProviderType::ENV_VAR, "yandexgpt");
    env::set_var("YANDEX_API_KEY", "yc-key");

    let err = ProviderFactory::from_env().err().unwrap();
    assert_eq!(err.code, ErrorCode::ConfigError);
    assert!(err.message.contains("YANDEX_FOLDER_ID"));

    env::set_var("YANDEX_FOLDER_ID", "b1gfolder");
    env::set_var(LlmProviderType::TIMEOUT_ENV_VAR, "12");
    let factory = ProviderFactory::from_env().unwrap();
    match factory.default_config() {
        ProviderConfig::YandexGpt(config) => {
            assert_eq!(config.model, "yandexgpt-lite");
            assert_eq!(config.model_uri(), "gpt://b1gfolder/yandexgpt-lite/latest");
            assert_eq!(config.timeout_secs, 12);
        }
        other => panic!("unexpected default: {other:?}"),
    }
    clear_provider_env();
}
