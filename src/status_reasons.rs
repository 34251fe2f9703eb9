// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reasons and messages used when reporting `Rebalance` progress.
//!
//! Reasons are programmatic identifiers in CamelCase. They label log lines and
//! metrics; users read the condition `message` instead.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Failed
//!   conditions:
//!     - type: Failed
//!       status: "True"
//!       message: "Failed to start rebalance: request api failed: 400 Bad Request"
//!       lastUpdateTime: "2025-01-01T00:00:00Z"
//!       lastTransitionTime: "2025-01-01T00:00:00Z"
//! ```

// ============================================================================
// Lifecycle Reasons
// ============================================================================

/// The broker accepted the start call.
pub const REASON_REBALANCE_STARTED: &str = "RebalanceStarted";

/// No node reports an active job any more.
pub const REASON_REBALANCE_COMPLETED: &str = "RebalanceCompleted";

/// The referenced `EMQX` / `EmqxEnterprise` object does not exist.
pub const REASON_INSTANCE_NOT_FOUND: &str = "InstanceNotFound";

/// The strategy failed local validation; nothing was sent to the broker.
pub const REASON_INVALID_STRATEGY: &str = "InvalidStrategy";

/// The deletion-time stop calls finished (or were moot).
pub const REASON_CLEANUP_COMPLETE: &str = "CleanupComplete";

// ============================================================================
// Broker Management API Reasons
// ============================================================================

/// Broker rejected the request as malformed or not applicable (HTTP 400).
///
/// Also returned when a cluster has nothing eligible to rebalance.
pub const REASON_BROKER_BAD_REQUEST: &str = "BrokerBadRequest";

/// Broker refused the API key (HTTP 401/403).
pub const REASON_BROKER_AUTH_FAILED: &str = "BrokerAuthFailed";

/// Broker does not know the node or the job (HTTP 404).
pub const REASON_BROKER_NOT_FOUND: &str = "BrokerNotFound";

/// Broker failed internally (HTTP 500).
pub const REASON_BROKER_INTERNAL_ERROR: &str = "BrokerInternalError";

/// Broker or a proxy in front of it is temporarily unavailable (HTTP 429/502/503/504).
pub const REASON_BROKER_UNAVAILABLE: &str = "BrokerUnavailable";

/// No HTTP answer at all: connection refused, timeout, DNS failure.
pub const REASON_BROKER_UNREACHABLE: &str = "BrokerUnreachable";

// ============================================================================
// Condition Messages
// ============================================================================

/// Message of the `Processing` condition while a job runs.
pub const MESSAGE_REBALANCE_IN_PROGRESS: &str = "Rebalance is in progress";

/// Message of the `Completed` condition.
pub const MESSAGE_REBALANCE_COMPLETED: &str = "Rebalance is completed";

/// Message for a reference that could not be resolved, e.g. `EMQX fake is not found`.
#[must_use]
pub fn instance_not_found_message(kind: &str, name: &str) -> String {
    format!("{kind} {name} is not found")
}

/// Message for a failed start call, embedding the error text verbatim.
#[must_use]
pub fn start_failed_message(error: &str) -> String {
    format!("Failed to start rebalance: {error}")
}

/// Message for a poll the broker answered with a rejection.
#[must_use]
pub fn poll_failed_message(error: &str) -> String {
    format!("Failed to get rebalance status: {error}")
}

/// Message for a strategy rejected before any broker call.
#[must_use]
pub fn invalid_strategy_message(detail: &str) -> String {
    start_failed_message(&format!("invalid strategy: {detail}"))
}
