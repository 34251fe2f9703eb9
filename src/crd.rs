// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for broker rebalancing.
//!
//! This module defines the `Rebalance` resource owned by this operator, plus the
//! read-only views of the EMQX cluster resources a rebalance can target.
//!
//! # Resource Types
//!
//! ## Owned
//!
//! - [`Rebalance`] - Request to rebalance connections and sessions across a cluster
//!
//! ## Consumed
//!
//! - [`Emqx`] - EMQX 5 cluster (`apps.emqx.io/v2alpha2`)
//! - [`EmqxEnterprise`] - EMQX Enterprise 4 cluster (`apps.emqx.io/v1beta4`)
//!
//! # Example: Creating a Rebalance
//!
//! ```rust,no_run
//! use rebalancer::crd::{InstanceKind, RebalanceSpec, RebalanceStrategy};
//!
//! let spec = RebalanceSpec {
//!     instance_name: "emqx".to_string(),
//!     instance_kind: InstanceKind::Emqx,
//!     rebalance_strategy: RebalanceStrategy {
//!         conn_evict_rate: 10,
//!         sess_evict_rate: 10,
//!         wait_takeover: 10,
//!         wait_health_check: 10,
//!         abs_conn_threshold: 100,
//!         abs_sess_threshold: 100,
//!         rel_conn_threshold: "1.2".to_string(),
//!         rel_sess_threshold: "1.2".to_string(),
//!     },
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{CLUSTER_CONDITION_READY, KIND_EMQX, KIND_EMQX_ENTERPRISE};

/// Which controller-managed cluster type a `Rebalance` points at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum InstanceKind {
    /// EMQX 5 cluster managed as `EMQX` (`apps.emqx.io/v2alpha2`)
    #[default]
    #[serde(rename = "EMQX")]
    Emqx,

    /// EMQX Enterprise 4 cluster managed as `EmqxEnterprise` (`apps.emqx.io/v1beta4`)
    #[serde(rename = "EmqxEnterprise")]
    EmqxEnterprise,
}

impl InstanceKind {
    /// Kubernetes kind name of the referenced cluster resource.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emqx => KIND_EMQX,
            Self::EmqxEnterprise => KIND_EMQX_ENTERPRISE,
        }
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables handed to the broker when a rebalance job starts.
///
/// Integer fields left at zero are not sent, so the broker falls back to its
/// own defaults for them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceStrategy {
    /// Connections evicted per second on each donor node.
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub conn_evict_rate: i32,

    /// Sessions evicted per second on each donor node.
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub sess_evict_rate: i32,

    /// Seconds to wait for clients to take over sessions before evicting them.
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub wait_takeover: i32,

    /// Seconds to wait for the load balancer to notice a node stopped accepting connections.
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub wait_health_check: i32,

    /// Absolute connection-count difference that triggers balancing.
    #[serde(default)]
    pub abs_conn_threshold: i32,

    /// Absolute session-count difference that triggers balancing.
    #[serde(default)]
    pub abs_sess_threshold: i32,

    /// Relative connection ratio (donor average / recipient average), e.g. "1.2".
    #[serde(default)]
    pub rel_conn_threshold: String,

    /// Relative session ratio (donor average / recipient average), e.g. "1.2".
    #[serde(default)]
    pub rel_sess_threshold: String,
}

/// `Rebalance` asks the operator to rebalance client load across an EMQX cluster.
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.emqx.io/v2alpha2
/// kind: Rebalance
/// metadata:
///   name: rebalance-sample
///   namespace: emqx
/// spec:
///   instanceName: emqx
///   instanceKind: EMQX
///   rebalanceStrategy:
///     connEvictRate: 10
///     sessEvictRate: 10
///     waitTakeover: 10
///     waitHealthCheck: 10
///     absConnThreshold: 100
///     absSessThreshold: 100
///     relConnThreshold: "1.2"
///     relSessThreshold: "1.2"
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "apps.emqx.io",
    version = "v2alpha2",
    kind = "Rebalance",
    namespaced,
    shortname = "rb",
    doc = "Rebalance triggers and tracks an EMQX load-rebalance job that evicts connections and sessions from overloaded nodes.",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "RebalanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSpec {
    /// Name of the cluster resource in the same namespace.
    pub instance_name: String,

    /// Kind of the cluster resource.
    #[serde(default)]
    pub instance_kind: InstanceKind,

    /// Eviction rates and thresholds for the job.
    #[serde(default)]
    pub rebalance_strategy: RebalanceStrategy,
}

/// Coarse lifecycle stage of a `Rebalance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RebalancePhase {
    Processing,
    Completed,
    Failed,
}

impl RebalancePhase {
    /// `Completed` and `Failed` are final for a given spec generation.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RebalancePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Condition types reported on a `Rebalance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RebalanceConditionType {
    Failed,
    Completed,
    Processing,
}

/// Standard tri-state condition status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A typed, timestamped observation explaining why a phase holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceCondition {
    pub r#type: RebalanceConditionType,

    pub status: ConditionStatus,

    /// Human-readable message indicating details about the transition.
    #[serde(default)]
    pub message: String,

    /// Last time the condition was written (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,

    /// Last time the condition status flipped (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Eviction counters reported for one rebalance job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceStats {
    #[serde(default)]
    pub initial_connected: i64,
    #[serde(default)]
    pub current_connected: i64,
    #[serde(default)]
    pub initial_sessions: i64,
    #[serde(default)]
    pub current_sessions: i64,
}

/// Live progress of one broker-side rebalance job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceState {
    /// Broker-reported job state, e.g. `evicting_conns` or `wait_health_check`.
    #[serde(default)]
    pub state: String,

    /// Node the job runs on.
    #[serde(default)]
    pub node: String,

    /// Node coordinating the job (the one a stop call must go to).
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

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RebalanceStats>,
}

/// `Rebalance` status, written only by the controller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<RebalancePhase>,

    #[serde(default)]
    pub conditions: Vec<RebalanceCondition>,

    /// Per-job progress; only set while the broker reports active jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebalance_states: Option<Vec<RebalanceState>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl RebalanceStatus {
    /// Find a condition by type.
    #[must_use]
    pub fn condition(&self, condition_type: RebalanceConditionType) -> Option<&RebalanceCondition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// `true` when the condition of the given type exists with status `True`.
    #[must_use]
    pub fn is_condition_true(&self, condition_type: RebalanceConditionType) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}

impl Rebalance {
    /// Phase persisted in status, `None` while uninitialized.
    #[must_use]
    pub fn phase(&self) -> Option<RebalancePhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// `true` once the platform stamped a deletion timestamp.
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// `true` when the given finalizer is present on the object.
    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }
}

// ============================================================================
// Consumed cluster resources
// ============================================================================

/// Condition entry as written by the EMQX operator on its cluster resources.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    pub r#type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// One broker node as listed in a cluster status.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmqxNode {
    /// Erlang node name, e.g. `emqx@10.0.0.12`.
    pub node: String,
    #[serde(default)]
    pub node_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_release: Option<String>,
}

/// Replica bookkeeping for one node pool.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmqxNodesStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
    #[serde(default)]
    pub current_replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_revision: Option<String>,
    #[serde(default)]
    pub update_replicas: i32,
}

/// Spec of an EMQX 5 cluster; only the image is read.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "apps.emqx.io",
    version = "v2alpha2",
    kind = "EMQX",
    root = "Emqx",
    namespaced
)]
#[kube(status = "EmqxStatus")]
#[serde(rename_all = "camelCase")]
pub struct EmqxSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Status of an EMQX 5 cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmqxStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
    #[serde(default)]
    pub core_nodes: Vec<EmqxNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_nodes_status: Option<EmqxNodesStatus>,
    #[serde(default)]
    pub replicant_nodes: Vec<EmqxNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicant_nodes_status: Option<EmqxNodesStatus>,
}

/// Spec of an EMQX Enterprise 4 cluster; only the image is read.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "apps.emqx.io",
    version = "v1beta4",
    kind = "EmqxEnterprise",
    namespaced
)]
#[kube(status = "EmqxEnterpriseStatus")]
#[serde(rename_all = "camelCase")]
pub struct EmqxEnterpriseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Status of an EMQX Enterprise 4 cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmqxEnterpriseStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
    #[serde(default)]
    pub emqx_nodes: Vec<EmqxNode>,
}

/// `true` when `conditions` carries `Ready=True`.
#[must_use]
pub fn is_cluster_ready(conditions: &[ClusterCondition]) -> bool {
    conditions
        .iter()
        .any(|c| c.r#type == CLUSTER_CONDITION_READY && c.status == "True")
}
