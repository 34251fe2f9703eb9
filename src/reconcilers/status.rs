// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the `Rebalance` status writer.
//!
//! # Condition Format
//!
//! - `type`: `Failed`, `Completed` or `Processing`
//! - `status`: `True`, `False` or `Unknown`
//! - `message`: A human-readable explanation
//! - `lastUpdateTime`: RFC3339 timestamp of the last write of this condition
//! - `lastTransitionTime`: RFC3339 timestamp of the last status flip
//!
//! Conditions are replaced by type and keep the order they first appeared in.

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::retry::retry_api_call;
use crate::constants::STATUS_CONFLICT_RETRIES;
use crate::crd::{
    ConditionStatus, Rebalance, RebalanceCondition, RebalanceConditionType, RebalanceStatus,
};
use crate::metrics::record_phase_transition;
use crate::rebalance_errors::ReconcileError;

/// Current time in the format used for status timestamps.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Create a new condition stamped with `now`.
#[must_use]
pub fn create_condition(
    condition_type: RebalanceConditionType,
    status: ConditionStatus,
    message: &str,
    now: &str,
) -> RebalanceCondition {
    RebalanceCondition {
        r#type: condition_type,
        status,
        message: message.to_string(),
        last_update_time: Some(now.to_string()),
        last_transition_time: Some(now.to_string()),
    }
}

/// Update or add a condition in place (in-memory, no API call).
///
/// An existing condition of the same type is updated where it stands. Its
/// `lastTransitionTime` only moves when `status` flips. A condition whose
/// status and message are already as requested is left untouched.
pub fn set_condition(
    conditions: &mut Vec<RebalanceCondition>,
    condition_type: RebalanceConditionType,
    status: ConditionStatus,
    message: &str,
    now: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status == status && existing.message == message {
            return;
        }
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(now.to_string());
        }
        existing.status = status;
        existing.message = message.to_string();
        existing.last_update_time = Some(now.to_string());
    } else {
        conditions.push(create_condition(condition_type, status, message, now));
    }
}

/// Flip an existing condition to `False`, keeping its message. Absent conditions stay absent.
pub fn clear_condition(
    conditions: &mut [RebalanceCondition],
    condition_type: RebalanceConditionType,
    now: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != ConditionStatus::False {
            existing.status = ConditionStatus::False;
            existing.last_transition_time = Some(now.to_string());
            existing.last_update_time = Some(now.to_string());
        }
    }
}

/// Compare two condition lists ignoring timestamps.
#[must_use]
pub fn conditions_equal(current: &[RebalanceCondition], new: &[RebalanceCondition]) -> bool {
    current.len() == new.len()
        && current.iter().zip(new).all(|(a, b)| {
            a.r#type == b.r#type && a.status == b.status && a.message == b.message
        })
}

/// `true` when two statuses carry the same observable state.
///
/// Condition timestamps are ignored; everything else is compared.
#[must_use]
pub fn statuses_equivalent(current: &RebalanceStatus, new: &RebalanceStatus) -> bool {
    current.phase == new.phase
        && conditions_equal(&current.conditions, &new.conditions)
        && current.rebalance_states == new.rebalance_states
        && current.started_time == new.started_time
        && current.completed_time == new.completed_time
        && current.observed_generation == new.observed_generation
}

/// Serialize a status for a JSON merge patch.
///
/// Optional fields that are unset become explicit `null`, otherwise the merge
/// would keep whatever the stored object still had (a stale
/// `rebalanceStates`, for example).
#[must_use]
pub fn status_patch_value(status: &RebalanceStatus) -> Value {
    let mut value = serde_json::to_value(status).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut value {
        for key in [
            "phase",
            "rebalanceStates",
            "startedTime",
            "completedTime",
            "observedGeneration",
        ] {
            map.entry(key).or_insert(Value::Null);
        }
    }
    value
}

/// Status writer for `Rebalance` resources.
///
/// Holds the status the decision was based on and the status to write. The
/// write is a merge patch pinned to the observed `resourceVersion`; on a
/// conflict the object is re-read and the write is retried only when the
/// stored status is still the one the decision was based on.
///
/// # Example
///
/// ```rust,ignore
/// use rebalancer::reconcilers::status::RebalanceStatusUpdater;
///
/// let updater = RebalanceStatusUpdater::new(&rebalance, desired_status);
/// updater.apply(&api).await?;
/// ```
pub struct RebalanceStatusUpdater {
    namespace: String,
    name: String,
    resource_version: Option<String>,
    base_status: RebalanceStatus,
    new_status: RebalanceStatus,
}

impl RebalanceStatusUpdater {
    #[must_use]
    pub fn new(rebalance: &Rebalance, new_status: RebalanceStatus) -> Self {
        Self {
            namespace: rebalance.namespace().unwrap_or_default(),
            name: rebalance.name_any(),
            resource_version: rebalance.resource_version(),
            base_status: rebalance.status.clone().unwrap_or_default(),
            new_status,
        }
    }

    /// Check if the status has actually changed compared to the current status.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !statuses_equivalent(&self.base_status, &self.new_status)
    }

    /// Merge patch body for the given `resourceVersion`.
    #[must_use]
    pub fn patch_body(&self, resource_version: Option<&str>) -> Value {
        let mut body = json!({ "status": status_patch_value(&self.new_status) });
        if let Some(rv) = resource_version {
            body["metadata"] = json!({ "resourceVersion": rv });
        }
        body
    }

    /// Write the status (single API call, retried on conflict).
    ///
    /// Returns `false` when nothing needed writing.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Conflict`] when the stored status moved on or the
    /// conflict persisted, [`ReconcileError::Kube`] for other API failures.
    pub async fn apply(&self, api: &Api<Rebalance>) -> Result<bool, ReconcileError> {
        if !self.has_changes() {
            debug!(
                namespace = %self.namespace,
                name = %self.name,
                "Rebalance status unchanged, skipping update"
            );
            return Ok(false);
        }

        let mut resource_version = self.resource_version.clone();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let patch = self.patch_body(resource_version.as_deref());

            match api
                .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
            {
                Ok(_) => {
                    if self.base_status.phase != self.new_status.phase {
                        if let Some(phase) = self.new_status.phase {
                            record_phase_transition(&phase.to_string());
                        }
                    }
                    debug!(
                        namespace = %self.namespace,
                        name = %self.name,
                        phase = ?self.new_status.phase,
                        conditions = self.new_status.conditions.len(),
                        "Updated Rebalance status"
                    );
                    return Ok(true);
                }
                Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                    warn!(
                        namespace = %self.namespace,
                        name = %self.name,
                        attempt = attempt,
                        "Conflict writing Rebalance status"
                    );
                    if attempt >= STATUS_CONFLICT_RETRIES {
                        return Err(self.conflict());
                    }

                    let fresh = retry_api_call(
                        || api.get_status(&self.name),
                        &format!("get Rebalance {}/{}", self.namespace, self.name),
                    )
                    .await?;
                    let fresh_status = fresh.status.clone().unwrap_or_default();

                    if statuses_equivalent(&fresh_status, &self.new_status) {
                        return Ok(false);
                    }
                    if !statuses_equivalent(&fresh_status, &self.base_status) {
                        return Err(self.conflict());
                    }
                    resource_version = fresh.resource_version();
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn conflict(&self) -> ReconcileError {
        ReconcileError::Conflict {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn new_status(&self) -> &RebalanceStatus {
        &self.new_status
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
