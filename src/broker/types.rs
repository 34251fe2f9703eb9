// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types for the EMQX load-rebalance management API.

use serde::{Deserialize, Serialize};

use crate::crd::{RebalanceState, RebalanceStats, RebalanceStrategy};

/// One reachable broker node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerNode {
    /// Erlang node name, e.g. `emqx@10.0.0.12`
    pub name: String,
    /// Management API base URL, e.g. `http://10.0.0.12:18083`
    pub endpoint: String,
}

impl BrokerNode {
    /// Derive the management endpoint from an Erlang node name.
    ///
    /// `emqx@10.0.0.12` with scheme `http` and port 18083 becomes
    /// `http://10.0.0.12:18083`. Names without `@` are used as the host verbatim.
    #[must_use]
    pub fn from_node_name(name: &str, scheme: &str, port: u16) -> Self {
        let host = name.split_once('@').map_or(name, |(_, host)| host);
        Self {
            name: name.to_string(),
            endpoint: format!("{scheme}://{host}:{port}"),
        }
    }
}

/// Basic-auth API key pair for the management API.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

/// Body of `POST /api/v5/load_rebalance/{node}/start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    pub nodes: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub conn_evict_rate: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub sess_evict_rate: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub wait_takeover: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub wait_health_check: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub abs_conn_threshold: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub abs_sess_threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_conn_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_sess_threshold: Option<f64>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl StartRequest {
    /// Build a start body for the given nodes.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid strategy field.
    pub fn new(nodes: &[BrokerNode], strategy: &RebalanceStrategy) -> Result<Self, String> {
        validate_strategy(strategy)?;
        Ok(Self {
            nodes: nodes.iter().map(|n| n.name.clone()).collect(),
            conn_evict_rate: strategy.conn_evict_rate,
            sess_evict_rate: strategy.sess_evict_rate,
            wait_takeover: strategy.wait_takeover,
            wait_health_check: strategy.wait_health_check,
            abs_conn_threshold: strategy.abs_conn_threshold,
            abs_sess_threshold: strategy.abs_sess_threshold,
            rel_conn_threshold: parse_relative_threshold(
                "relConnThreshold",
                &strategy.rel_conn_threshold,
            )?,
            rel_sess_threshold: parse_relative_threshold(
                "relSessThreshold",
                &strategy.rel_sess_threshold,
            )?,
        })
    }
}

/// Check a strategy before it is sent to the broker.
///
/// Rates and waits must be non-negative; relative thresholds, when set, must
/// parse as a float strictly greater than 1.0.
///
/// # Errors
///
/// Returns a description of the first invalid field.
pub fn validate_strategy(strategy: &RebalanceStrategy) -> Result<(), String> {
    for (field, value) in [
        ("connEvictRate", strategy.conn_evict_rate),
        ("sessEvictRate", strategy.sess_evict_rate),
        ("waitTakeover", strategy.wait_takeover),
        ("waitHealthCheck", strategy.wait_health_check),
    ] {
        if value < 0 {
            return Err(format!("{field} must be >= 0, got {value}"));
        }
    }
    parse_relative_threshold("relConnThreshold", &strategy.rel_conn_threshold)?;
    parse_relative_threshold("relSessThreshold", &strategy.rel_sess_threshold)?;
    Ok(())
}

/// Parse a relative threshold string; empty means "broker default".
///
/// # Errors
///
/// Returns an error if the value is not a float greater than 1.0.
pub fn parse_relative_threshold(field: &str, raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| format!("{field} {trimmed:?} is not a number"))?;
    if !value.is_finite() || value <= 1.0 {
        return Err(format!("{field} must be greater than 1.0, got {trimmed}"));
    }
    Ok(Some(value))
}

/// Body of `GET /api/v5/load_rebalance/global_status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalStatusResponse {
    #[serde(default)]
    pub rebalances: Vec<RebalanceInfo>,
    #[serde(default)]
    pub evacuations: Vec<serde_json::Value>,
}

/// One entry of `rebalances[]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebalanceInfo {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub coordinator_node: String,
    #[serde(default)]
    pub donors: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub connection_eviction_rate: i32,
    #[serde(default)]
    pub session_eviction_rate: i32,
    #[serde(default)]
    pub stats: Option<RebalanceInfoStats>,
}

/// Eviction counters as the broker reports them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebalanceInfoStats {
    #[serde(default)]
    pub initial_conn_count: i64,
    #[serde(default)]
    pub current_conn_count: i64,
    #[serde(default)]
    pub initial_sess_count: i64,
    #[serde(default)]
    pub current_sess_count: i64,
}

impl From<RebalanceInfo> for RebalanceState {
    fn from(info: RebalanceInfo) -> Self {
        let coordinator_node = if info.coordinator_node.is_empty() {
            info.node.clone()
        } else {
            info.coordinator_node
        };
        Self {
            state: info.state,
            node: info.node,
            coordinator_node,
            donors: info.donors,
            recipients: info.recipients,
            connection_eviction_rate: info.connection_eviction_rate,
            session_eviction_rate: info.session_eviction_rate,
            stats: info.stats.map(|s| RebalanceStats {
                initial_connected: s.initial_conn_count,
                current_connected: s.current_conn_count,
                initial_sessions: s.initial_sess_count,
                current_sessions: s.current_sess_count,
            }),
        }
    }
}

/// Handle of a job the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Node the start call was addressed to
    pub coordinator_node: String,
    /// Endpoint that answered
    pub endpoint: String,
}

/// Aggregated answer of a cluster-wide poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    /// Active jobs, de-duplicated by node
    pub jobs: Vec<RebalanceState>,
    /// Endpoints that failed at the transport level
    pub unreachable: Vec<String>,
}

impl PollOutcome {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.jobs.is_empty()
    }
}
