// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the rebalance operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `Rebalance` CRD and the EMQX cluster CRDs it targets
pub const API_GROUP: &str = "apps.emqx.io";

/// API version of the `Rebalance` CRD
pub const API_VERSION: &str = "v2alpha2";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "apps.emqx.io/v2alpha2";

/// Kind name for `Rebalance` resource
pub const KIND_REBALANCE: &str = "Rebalance";

/// Kind name for `EMQX` resource
pub const KIND_EMQX: &str = "EMQX";

/// Kind name for `EmqxEnterprise` resource
pub const KIND_EMQX_ENTERPRISE: &str = "EmqxEnterprise";

/// Finalizer attached to a `Rebalance` once the broker accepted a start call
pub const REBALANCE_FINALIZER: &str = "apps.emqx.io/finalizer";

// ============================================================================
// Broker Management API Constants
// ============================================================================

/// Default EMQX dashboard / management API port
pub const DEFAULT_BROKER_API_PORT: u16 = 18083;

/// Default scheme used to reach the management API
pub const DEFAULT_BROKER_API_SCHEME: &str = "http";

/// Per-request timeout for management API calls
pub const DEFAULT_BROKER_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Management API path prefix
pub const BROKER_API_PREFIX: &str = "/api/v5/load_rebalance";

/// Node status reported by EMQX for a healthy node
pub const NODE_STATUS_RUNNING: &str = "running";

/// Condition type EMQX uses to flag a ready cluster
pub const CLUSTER_CONDITION_READY: &str = "Ready";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Upper bound for a single reconcile pass
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Requeue interval while a rebalance job is running
pub const DEFAULT_PROCESSING_REQUEUE_SECS: u64 = 5;

/// Requeue interval for terminal resources (drift detection only)
pub const DEFAULT_DRIFT_REQUEUE_SECS: u64 = 300;

/// First error requeue interval
pub const ERROR_REQUEUE_BASE_SECS: u64 = 1;

/// Error requeue ceiling (5 minutes)
pub const ERROR_REQUEUE_MAX_SECS: u64 = 300;

/// Number of status writes attempted when the API server reports a conflict
pub const STATUS_CONFLICT_RETRIES: u32 = 3;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics and health HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Liveness endpoint path
pub const HEALTHZ_PATH: &str = "/healthz";

/// Readiness endpoint path
pub const READYZ_PATH: &str = "/readyz";
