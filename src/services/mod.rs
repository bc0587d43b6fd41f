// ABOUTME: Domain service layer for the query pipeline and usage accounting
// ABOUTME: Provides transport-agnostic services reusable from any chat front end
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Domain service layer
//!
//! Services own no persistence connections. Transport layers (HTTP, bots,
//! admin tooling) construct them once and pass a data session per request.

/// Query classification, handler dispatch, and reply persistence
pub mod search_orchestrator;

/// Token and cost accounting with monthly alerts
pub mod usage;

pub use search_orchestrator::SearchOrchestrator;
pub use usage::{MonthlyUsage, UsageAlert, UsageTracker};
