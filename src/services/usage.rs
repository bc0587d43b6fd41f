// ABOUTME: Token usage and cost accounting per provider and calendar month
// ABOUTME: Raises one threshold alert and one limit alert per provider per month
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::UsageLimits;
use crate::store::UsageRecorder;

/// Aggregated usage for one provider in one month
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyUsage {
    /// Tokens spent
    pub tokens: u64,
    /// Metered calls
    pub requests: u64,
    /// Estimated spend
    pub cost_usd: f64,
}

/// Spend alert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageAlert {
    /// Spend crossed the configured fraction of the limit
    Threshold {
        /// Provider id
        provider: String,
        /// `YYYY-MM`
        month: String,
        /// Spend so far
        spent_usd: f64,
        /// Monthly limit
        limit_usd: f64,
    },
    /// Spend reached the limit
    LimitExceeded {
        /// Provider id
        provider: String,
        /// `YYYY-MM`
        month: String,
        /// Spend so far
        spent_usd: f64,
        /// Monthly limit
        limit_usd: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AlertKind {
    Threshold,
    LimitExceeded,
}

type UsageKey = (String, String);

#[derive(Default)]
struct TrackerState {
    usage: BTreeMap<UsageKey, MonthlyUsage>,
    raised: BTreeSet<(String, String, AlertKind)>,
    pending: Vec<UsageAlert>,
}

/// In-process usage recorder with cost alerts
pub struct UsageTracker {
    limits: UsageLimits,
    state: Mutex<TrackerState>,
}

/// Month bucket for a timestamp
#[must_use]
pub fn month_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

impl UsageTracker {
    /// Create a tracker with the given limits and prices
    #[must_use]
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Usage recorded for a provider in a `YYYY-MM` month
    pub async fn usage_for(&self, provider: &str, month: &str) -> Option<MonthlyUsage> {
        self.state
            .lock()
            .await
            .usage
            .get(&(provider.to_owned(), month.to_owned()))
            .cloned()
    }

    /// Take every alert raised since the last drain
    pub async fn drain_alerts(&self) -> Vec<UsageAlert> {
        std::mem::take(&mut self.state.lock().await.pending)
    }

    fn raise(state: &mut TrackerState, kind: AlertKind, alert: UsageAlert, provider: &str, month: &str) {
        if state
            .raised
            .insert((provider.to_owned(), month.to_owned(), kind))
        {
            warn!(?alert, "Usage alert raised");
            state.pending.push(alert);
        }
    }
}

#[async_trait]
impl UsageRecorder for UsageTracker {
    async fn record_tokens(
        &self,
        provider: &str,
        model: &str,
        tokens: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let month = month_key(timestamp);
        let cost = f64::from(tokens) / 1000.0 * self.limits.price_for(provider);

        let mut state = self.state.lock().await;
        let entry = state
            .usage
            .entry((provider.to_owned(), month.clone()))
            .or_default();
        entry.tokens += u64::from(tokens);
        entry.requests += 1;
        entry.cost_usd += cost;
        let spent = entry.cost_usd;
        debug!(provider, model, tokens, month = %month, spent_usd = spent, "Usage recorded");

        let Some(limit) = self.limits.monthly_limit_usd else {
            return Ok(());
        };

        if spent >= limit * self.limits.alert_threshold {
            let alert = UsageAlert::Threshold {
                provider: provider.to_owned(),
                month: month.clone(),
                spent_usd: spent,
                limit_usd: limit,
            };
            Self::raise(&mut state, AlertKind::Threshold, alert, provider, &month);
        }
        if spent >= limit {
            let alert = UsageAlert::LimitExceeded {
                provider: provider.to_owned(),
                month: month.clone(),
                spent_usd: spent,
                limit_usd: limit,
            };
            Self::raise(&mut state, AlertKind::LimitExceeded, alert, provider, &month);
        }
        Ok(())
    }
}
