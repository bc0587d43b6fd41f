// ABOUTME: Integration tests for monthly token accounting and spend alerts
// ABOUTME: Also covers environment-driven usage limits and top-level config loading
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{TimeZone, Utc};
use sales_assistant::config::{AssistantConfig, UsageLimits};
use sales_assistant::errors::ErrorCode;
use sales_assistant::services::{UsageAlert, UsageTracker};
use sales_assistant::store::UsageRecorder;
use serial_test::serial;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

fn limited(limit: f64) -> UsageLimits {
    let mut prices = BTreeMap::new();
    prices.insert("openai".to_owned(), 1.0);
    UsageLimits {
        monthly_limit_usd: Some(limit),
        alert_threshold: 0.8,
        cost_per_1k_tokens_usd: prices,
    }
}

#[tokio::test]
async fn test_usage_aggregates_per_provider_and_month() {
    common::init_test_logging();
    let tracker = UsageTracker::new(UsageLimits::default());
    let march = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
    let april = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();

    tracker.record_tokens("openai", "gpt-4o-mini", 1500, march).await.unwrap();
    tracker.record_tokens("openai", "gpt-4o-mini", 500, march).await.unwrap();
    tracker.record_tokens("openai", "gpt-4o-mini", 100, april).await.unwrap();
    tracker.record_tokens("yandexgpt", "yandexgpt-lite", 1000, march).await.unwrap();

    let openai_march = tracker.usage_for("openai", "2025-03").await.unwrap();
    assert_eq!(openai_march.tokens, 2000);
    assert_eq!(openai_march.requests, 2);
    assert!((openai_march.cost_usd - 0.004).abs() < 1e-9);

    assert_eq!(tracker.usage_for("openai", "2025-04").await.unwrap().tokens, 100);
    assert_eq!(tracker.usage_for("yandexgpt", "2025-03").await.unwrap().requests, 1);
    assert!(tracker.usage_for("yandexgpt", "2025-04").await.is_none());
}

#[tokio::test]
async fn test_alerts_fire_once_per_month() {
    common::init_test_logging();
    let tracker = UsageTracker::new(limited(1.0));
    let ts = Utc.with_ymd_and_hms(2025, 5, 10, 9, 30, 0).unwrap();

    tracker.record_tokens("openai", "m", 500, ts).await.unwrap();
    assert!(tracker.drain_alerts().await.is_empty());

    tracker.record_tokens("openai", "m", 400, ts).await.unwrap();
    let alerts = tracker.drain_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(matches!(
        &alerts[0],
        UsageAlert::Threshold { provider, month, .. } if provider == "openai" && month == "2025-05"
    ));

    tracker.record_tokens("openai", "m", 300, ts).await.unwrap();
    let alerts = tracker.drain_alerts().await;
    assert_eq!(alerts.len(), 1);
    match &alerts[0] {
        UsageAlert::LimitExceeded {
            spent_usd, limit_usd, ..
        } => {
            assert!(*spent_usd > *limit_usd);
        }
        other => panic!("expected limit alert, got {other:?}"),
    }

    tracker.record_tokens("openai", "m", 5000, ts).await.unwrap();
    assert!(tracker.drain_alerts().await.is_empty());

    // New month starts a fresh budget
    let next = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    tracker.record_tokens("openai", "m", 2000, next).await.unwrap();
    let alerts = tracker.drain_alerts().await;
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_unpriced_provider_never_alerts() {
    common::init_test_logging();
    let tracker = UsageTracker::new(limited(0.01));
    let ts = Utc.with_ymd_and_hms(2025, 5, 10, 9, 30, 0).unwrap();

    tracker.record_tokens("scripted", "m", 1_000_000, ts).await.unwrap();
    assert!(tracker.drain_alerts().await.is_empty());
    let usage = tracker.usage_for("scripted", "2025-05").await.unwrap();
    assert_eq!(usage.tokens, 1_000_000);
    assert!(usage.cost_usd.abs() < f64::EPSILON);
}

const USAGE_VARS: [&str; 6] = [
    "USAGE_MONTHLY_LIMIT_USD",
    "USAGE_ALERT_THRESHOLD",
    "CLASSIFICATION_CACHE_TTL_SECS",
    "LLM_PROVIDER",
    "LLM_MODEL",
    "LLM_TIMEOUT_SECS",
];

fn clear_env() {
    for key in USAGE_VARS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_usage_limits_from_env() {
    clear_env();
    env::set_var("USAGE_MONTHLY_LIMIT_USD", "25.5");
    env::set_var("USAGE_ALERT_THRESHOLD", "0.9");

    let limits = UsageLimits::from_env().unwrap();
    assert_eq!(limits.monthly_limit_usd, Some(25.5));
    assert!((limits.alert_threshold - 0.9).abs() < f64::EPSILON);

    env::set_var("USAGE_ALERT_THRESHOLD", "1.5");
    assert_eq!(
        UsageLimits::from_env().err().unwrap().code,
        ErrorCode::ConfigInvalid
    );

    env::set_var("USAGE_ALERT_THRESHOLD", "0.5");
    env::set_var("USAGE_MONTHLY_LIMIT_USD", "lots");
    assert_eq!(
        UsageLimits::from_env().err().unwrap().code,
        ErrorCode::ConfigInvalid
    );
    clear_env();
}

#[test]
#[serial]
fn test_assistant_config_from_env() {
    clear_env();
    env::set_var("CLASSIFICATION_CACHE_TTL_SECS", "60");

    let config = AssistantConfig::from_env().unwrap();
    assert_eq!(config.classification_cache_ttl, Duration::from_secs(60));
    assert_eq!(config.default_provider.provider_type().as_str(), "openai");
    assert!(config.usage.monthly_limit_usd.is_none());
    clear_env();
}
