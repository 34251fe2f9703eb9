// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pure phase logic for `Rebalance` resources.
//!
//! Nothing in here talks to Kubernetes or the broker. [`plan`] picks what a
//! reconcile has to do from the persisted object alone, and the transition
//! builders compute the complete next status from the current one plus the
//! outcome of whatever effect the plan required.
//!
//! ```text
//! Uninitialized --start ok--> Processing --no active jobs--> Completed
//!       |                         |
//!       +--start rejected--> Failed <--poll rejected / instance gone
//! ```
//!
//! Deletion is orthogonal and checked first.
//!
//! The finalizer goes on before any start call and comes off again in the
//! same pass when the start is rejected, so an object carrying it without a
//! status may have a job running and is resumed instead of started again.

use crate::broker::PollOutcome;
use crate::crd::{
    ConditionStatus, Rebalance, RebalanceConditionType, RebalancePhase, RebalanceStatus,
};
use crate::reconcilers::generation_changed;
use crate::reconcilers::status::{clear_condition, set_condition};
use crate::status_reasons::{MESSAGE_REBALANCE_COMPLETED, MESSAGE_REBALANCE_IN_PROGRESS};

/// What a reconcile has to do, decided from persisted state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Deleting and our finalizer is already gone.
    DeleteNoop,
    /// Deleting in a terminal phase; no broker job can be running.
    ReleaseFinalizer,
    /// Deleting while a job may still run: stop it, then release.
    Cleanup,
    /// Attach the finalizer, then issue a start call.
    Start,
    /// Finalizer attached but no status: adopt a running job or start one.
    Resume,
    /// Ask the broker whether the job is still running.
    Poll,
    /// Terminal for the current generation.
    Idle,
}

/// Pick the plan for `rebalance`.
///
/// An uninitialized object that already carries the finalizer may have had a
/// start accepted before the status write got lost, so it is resumed rather
/// than started blindly. A terminal object whose `metadata.generation` moved
/// past the recorded `observedGeneration` starts over.
#[must_use]
pub fn plan(rebalance: &Rebalance, finalizer: &str) -> Plan {
    let has_finalizer = rebalance.has_finalizer(finalizer);
    let phase = rebalance.phase();

    if rebalance.is_being_deleted() {
        return match (has_finalizer, phase) {
            (false, _) => Plan::DeleteNoop,
            (true, Some(p)) if p.is_terminal() => Plan::ReleaseFinalizer,
            (true, _) => Plan::Cleanup,
        };
    }

    match phase {
        None if has_finalizer => Plan::Resume,
        None => Plan::Start,
        Some(RebalancePhase::Processing) => Plan::Poll,
        Some(_) if spec_changed(rebalance) => Plan::Start,
        Some(_) => Plan::Idle,
    }
}

impl Plan {
    /// `true` when the finalizer has to be persisted before the plan's effect runs.
    #[must_use]
    pub fn attaches_finalizer_first(self) -> bool {
        matches!(self, Plan::Start)
    }
}

fn spec_changed(rebalance: &Rebalance) -> bool {
    let observed = rebalance.status.as_ref().and_then(|s| s.observed_generation);
    generation_changed(rebalance.metadata.generation, observed)
}

/// When the next reconcile should happen after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// A job is running: poll again soon.
    Processing,
    /// Terminal: only look for drift.
    Drift,
}

/// Complete outcome of one pass of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Status to persist
    pub status: RebalanceStatus,
    /// Drop the finalizer before the status is written; no job was started
    pub release_finalizer: bool,
    pub requeue: Requeue,
}

impl Transition {
    fn new(status: RebalanceStatus, requeue: Requeue) -> Self {
        Self {
            status,
            release_finalizer: false,
            requeue,
        }
    }
}

/// Start accepted by the broker.
///
/// Conditions from any earlier run are dropped.
#[must_use]
pub fn started(generation: Option<i64>, now: &str) -> Transition {
    let mut status = RebalanceStatus {
        phase: Some(RebalancePhase::Processing),
        started_time: Some(now.to_string()),
        observed_generation: generation,
        ..Default::default()
    };
    set_condition(
        &mut status.conditions,
        RebalanceConditionType::Processing,
        ConditionStatus::True,
        MESSAGE_REBALANCE_IN_PROGRESS,
        now,
    );
    Transition::new(status, Requeue::Processing)
}

/// A running job was found for an object whose start status never landed.
#[must_use]
pub fn adopted(generation: Option<i64>, outcome: PollOutcome, now: &str) -> Transition {
    let mut transition = started(generation, now);
    transition.status.rebalance_states = Some(outcome.jobs);
    transition
}

/// Start could not be issued or was rejected. The finalizer is released.
#[must_use]
pub fn start_failed(generation: Option<i64>, message: &str, now: &str) -> Transition {
    let status = RebalanceStatus {
        observed_generation: generation,
        ..Default::default()
    };
    Transition {
        release_finalizer: true,
        ..failed(status, message, now)
    }
}

/// Poll outcome while a job is expected to be running.
///
/// Active jobs keep the phase and conditions as they are and refresh
/// `rebalanceStates`; no active job means the rebalance is over.
#[must_use]
pub fn polled(current: &RebalanceStatus, outcome: PollOutcome, now: &str) -> Transition {
    if !outcome.is_active() {
        return completed(current, now);
    }

    let mut status = current.clone();
    status.phase = Some(RebalancePhase::Processing);
    status.rebalance_states = Some(outcome.jobs);
    if status.started_time.is_none() {
        status.started_time = Some(now.to_string());
    }
    Transition::new(status, Requeue::Processing)
}

/// The broker reports no active job any more.
#[must_use]
pub fn completed(current: &RebalanceStatus, now: &str) -> Transition {
    let mut status = current.clone();
    status.phase = Some(RebalancePhase::Completed);
    status.rebalance_states = None;
    status.completed_time = Some(now.to_string());
    clear_condition(&mut status.conditions, RebalanceConditionType::Processing, now);
    clear_condition(&mut status.conditions, RebalanceConditionType::Failed, now);
    set_condition(
        &mut status.conditions,
        RebalanceConditionType::Completed,
        ConditionStatus::True,
        MESSAGE_REBALANCE_COMPLETED,
        now,
    );
    Transition::new(status, Requeue::Drift)
}

/// Poll was rejected or the instance disappeared while processing.
#[must_use]
pub fn poll_failed(current: &RebalanceStatus, message: &str, now: &str) -> Transition {
    failed(current.clone(), message, now)
}

/// Terminal and unchanged: persist nothing new.
#[must_use]
pub fn idle(current: &RebalanceStatus) -> Transition {
    Transition::new(current.clone(), Requeue::Drift)
}

fn failed(mut status: RebalanceStatus, message: &str, now: &str) -> Transition {
    status.phase = Some(RebalancePhase::Failed);
    status.rebalance_states = None;
    status.completed_time = Some(now.to_string());
    clear_condition(&mut status.conditions, RebalanceConditionType::Processing, now);
    clear_condition(&mut status.conditions, RebalanceConditionType::Completed, now);
    set_condition(
        &mut status.conditions,
        RebalanceConditionType::Failed,
        ConditionStatus::True,
        message,
        now,
    );
    Transition::new(status, Requeue::Drift)
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod state_machine_tests;
