// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Rebalance` reconciliation.
//!
//! One pass runs in this order:
//!
//! 1. [`plan`] decides from persisted state alone what has to happen
//! 2. Deletion plans stop broker-side work and release the finalizer
//! 3. A start plan persists the finalizer before the broker sees anything
//! 4. [`evaluate`] performs the one effect the plan needs (resolve, start
//!    or poll) and turns its outcome into a [`Transition`]
//! 5. A rejected start releases the finalizer, then the status is written
//!
//! Effects go through [`Resolvers`] and [`BrokerApi`] trait objects so the
//! whole decision can be tested with in-memory fakes.

pub mod state_machine;

pub use state_machine::{plan, Plan, Requeue, Transition};

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::finalizers::{ensure_finalizer, handle_deletion, remove_finalizer, FinalizerCleanup};
use super::resolver::{ClusterHandle, ResolveError, Resolvers};
use super::status::{now_rfc3339, RebalanceStatusUpdater};
use crate::broker::{BrokerApi, BrokerError, StartRequest};
use crate::config::ReconcileSettings;
use crate::constants::{KIND_REBALANCE, REBALANCE_FINALIZER};
use crate::context::Context;
use crate::crd::{Rebalance, RebalanceStatus};
use crate::metrics::{
    record_error, record_reconciliation_error, record_reconciliation_requeue,
    record_reconciliation_success,
};
use crate::rebalance_errors::ReconcileError;
use crate::status_reasons::{
    instance_not_found_message, invalid_strategy_message, poll_failed_message,
    start_failed_message, REASON_CLEANUP_COMPLETE, REASON_INSTANCE_NOT_FOUND,
    REASON_INVALID_STRATEGY, REASON_REBALANCE_COMPLETED, REASON_REBALANCE_STARTED,
};

/// Controller entry point for `Rebalance`.
///
/// Runs one pass under the configured deadline and records metrics. Error
/// requeue timing is left to [`error_policy`].
///
/// # Errors
///
/// Returns a [`ReconcileError`] for anything that should be retried; terminal
/// failures are written to status instead.
pub async fn reconcile_rebalance(
    rebalance: Arc<Rebalance>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let deadline = ctx.settings.reconcile_timeout;
    let key = object_key(&rebalance);

    debug!(rebalance = %key, "Reconciling Rebalance");

    let result = match tokio::time::timeout(deadline, reconcile_once(&rebalance, &ctx)).await {
        Ok(result) => result,
        Err(_) => Err(ReconcileError::Timeout(deadline)),
    };

    match &result {
        Ok(_) => {
            ctx.error_backoff.reset(&key);
            record_reconciliation_success(KIND_REBALANCE, started.elapsed());
        }
        Err(e) => {
            record_reconciliation_error(KIND_REBALANCE, started.elapsed());
            record_error(KIND_REBALANCE, e.requeue_reason());
        }
    }
    result
}

/// Requeue policy for failed passes.
///
/// Conflicts are retried right away against a fresh read; everything else
/// backs off exponentially per object.
pub fn error_policy(rebalance: Arc<Rebalance>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = object_key(&rebalance);
    record_reconciliation_requeue(KIND_REBALANCE, err.requeue_reason());

    if err.is_conflict() {
        debug!(rebalance = %key, error = %err, "Requeueing after status conflict");
        return Action::requeue(Duration::ZERO);
    }

    let delay = ctx.error_backoff.next_delay(&key);
    if err.is_retryable() {
        warn!(rebalance = %key, error = %err, delay = ?delay, "Reconcile failed, retrying");
    } else {
        error!(rebalance = %key, error = %err, delay = ?delay, "Reconcile failed");
    }
    Action::requeue(delay)
}

async fn reconcile_once(rebalance: &Rebalance, ctx: &Context) -> Result<Action, ReconcileError> {
    let name = rebalance.name_any();
    let namespace = rebalance
        .namespace()
        .ok_or_else(|| ReconcileError::MissingNamespace(name.clone()))?;

    let plan = plan(rebalance, REBALANCE_FINALIZER);
    debug!(namespace = %namespace, name = %name, plan = ?plan, "Selected plan");

    match plan {
        Plan::DeleteNoop => Ok(Action::await_change()),
        Plan::ReleaseFinalizer => {
            remove_finalizer(&ctx.client, rebalance, REBALANCE_FINALIZER).await?;
            Ok(Action::await_change())
        }
        Plan::Cleanup => {
            handle_deletion(ctx, rebalance, REBALANCE_FINALIZER).await?;
            Ok(Action::await_change())
        }
        Plan::Start | Plan::Resume | Plan::Poll | Plan::Idle => {
            let mut current = if plan.attaches_finalizer_first() {
                ensure_finalizer(&ctx.client, rebalance, REBALANCE_FINALIZER).await?
            } else {
                rebalance.clone()
            };

            let now = now_rfc3339();
            let transition = evaluate(
                &current,
                plan,
                &ctx.resolvers,
                ctx.broker.as_ref(),
                &now,
            )
            .await?;

            if transition.release_finalizer {
                current = remove_finalizer(&ctx.client, &current, REBALANCE_FINALIZER).await?;
            }

            let api: Api<Rebalance> = Api::namespaced(ctx.client.clone(), &namespace);
            let written = RebalanceStatusUpdater::new(&current, transition.status.clone())
                .apply(&api)
                .await?;
            if written {
                info!(
                    namespace = %namespace,
                    name = %name,
                    phase = ?transition.status.phase,
                    "Rebalance status updated"
                );
            }

            Ok(requeue_action(&ctx.settings, transition.requeue))
        }
    }
}

/// Map a successful transition to the next scheduled reconcile.
#[must_use]
pub fn requeue_action(settings: &ReconcileSettings, requeue: Requeue) -> Action {
    match requeue {
        Requeue::Processing => Action::requeue(settings.processing_requeue),
        Requeue::Drift => Action::requeue(settings.drift_requeue),
    }
}

/// Run the effect `plan` needs and compute the next status.
///
/// Start plans expect the finalizer to be persisted already. Deletion plans
/// are handled by the caller and evaluate to an idle transition here.
///
/// # Errors
///
/// Retryable failures only: Kubernetes lookups other than "not found",
/// broker transport errors and transient gateway answers, and polls against a
/// cluster with no running node. Everything else becomes a `Failed` status.
pub async fn evaluate(
    rebalance: &Rebalance,
    plan: Plan,
    resolvers: &Resolvers,
    broker: &dyn BrokerApi,
    now: &str,
) -> Result<Transition, ReconcileError> {
    let current = rebalance.status.clone().unwrap_or_default();
    match plan {
        Plan::Start => start(rebalance, resolvers, broker, now).await,
        Plan::Resume => resume(rebalance, resolvers, broker, now).await,
        Plan::Poll => poll(rebalance, &current, resolvers, broker, now).await,
        Plan::Idle | Plan::DeleteNoop | Plan::ReleaseFinalizer | Plan::Cleanup => {
            Ok(state_machine::idle(&current))
        }
    }
}

async fn start(
    rebalance: &Rebalance,
    resolvers: &Resolvers,
    broker: &dyn BrokerApi,
    now: &str,
) -> Result<Transition, ReconcileError> {
    match resolve_for_start(rebalance, resolvers, now).await? {
        Ok(cluster) => start_on(rebalance, &cluster, broker, now).await,
        Err(failed) => Ok(failed),
    }
}

/// Finalizer but no status: a previous pass may have started a job and lost
/// its status write. Adopt a running job, otherwise start one.
async fn resume(
    rebalance: &Rebalance,
    resolvers: &Resolvers,
    broker: &dyn BrokerApi,
    now: &str,
) -> Result<Transition, ReconcileError> {
    let generation = rebalance.metadata.generation;
    let cluster = match resolve_for_start(rebalance, resolvers, now).await? {
        Ok(cluster) => cluster,
        Err(failed) => return Ok(failed),
    };

    match broker.poll_active(&cluster.nodes).await {
        Ok(outcome) if outcome.is_active() => {
            info!(
                rebalance = %object_key(rebalance),
                active_jobs = outcome.jobs.len(),
                reason = REASON_REBALANCE_STARTED,
                "Adopted running rebalance job"
            );
            Ok(state_machine::adopted(generation, outcome, now))
        }
        Ok(_) | Err(BrokerError::NoEligibleNodes) => {
            start_on(rebalance, &cluster, broker, now).await
        }
        Err(e) if e.is_retryable() => Err(ReconcileError::Broker(e)),
        Err(e) => {
            let message = poll_failed_message(&e.to_string());
            warn!(rebalance = %object_key(rebalance), error = ?e, "{message}");
            Ok(state_machine::start_failed(generation, &message, now))
        }
    }
}

/// Resolve the target of a start. A missing instance is a finished
/// `start_failed` transition in the inner `Err`.
async fn resolve_for_start(
    rebalance: &Rebalance,
    resolvers: &Resolvers,
    now: &str,
) -> Result<Result<ClusterHandle, Transition>, ReconcileError> {
    match resolve_instance(rebalance, resolvers).await {
        Ok(cluster) => Ok(Ok(cluster)),
        Err(ResolveError::NotFound { kind, name }) => {
            let message = instance_not_found_message(kind.as_str(), &name);
            info!(rebalance = %object_key(rebalance), reason = REASON_INSTANCE_NOT_FOUND, "{message}");
            Ok(Err(state_machine::start_failed(
                rebalance.metadata.generation,
                &message,
                now,
            )))
        }
        Err(e) => Err(e.into()),
    }
}

async fn start_on(
    rebalance: &Rebalance,
    cluster: &ClusterHandle,
    broker: &dyn BrokerApi,
    now: &str,
) -> Result<Transition, ReconcileError> {
    let generation = rebalance.metadata.generation;
    let request = match StartRequest::new(&cluster.nodes, &rebalance.spec.rebalance_strategy) {
        Ok(request) => request,
        Err(detail) => {
            let message = invalid_strategy_message(&detail);
            info!(rebalance = %object_key(rebalance), reason = REASON_INVALID_STRATEGY, "{message}");
            return Ok(state_machine::start_failed(generation, &message, now));
        }
    };

    match broker.start(&cluster.nodes, &request).await {
        Ok(job) => {
            info!(
                rebalance = %object_key(rebalance),
                coordinator = %job.coordinator_node,
                nodes = cluster.nodes.len(),
                reason = REASON_REBALANCE_STARTED,
                "Rebalance started"
            );
            Ok(state_machine::started(generation, now))
        }
        Err(e) if e.is_retryable() => Err(ReconcileError::Broker(e)),
        Err(e) => {
            let message = start_failed_message(&e.to_string());
            warn!(rebalance = %object_key(rebalance), error = ?e, "{message}");
            Ok(state_machine::start_failed(generation, &message, now))
        }
    }
}

async fn poll(
    rebalance: &Rebalance,
    current: &RebalanceStatus,
    resolvers: &Resolvers,
    broker: &dyn BrokerApi,
    now: &str,
) -> Result<Transition, ReconcileError> {
    let cluster = match resolve_instance(rebalance, resolvers).await {
        Ok(cluster) => cluster,
        Err(ResolveError::NotFound { kind, name }) => {
            let message = instance_not_found_message(kind.as_str(), &name);
            info!(rebalance = %object_key(rebalance), reason = REASON_INSTANCE_NOT_FOUND, "{message}");
            return Ok(state_machine::poll_failed(current, &message, now));
        }
        Err(e) => return Err(e.into()),
    };

    match broker.poll_active(&cluster.nodes).await {
        Ok(outcome) => {
            if !outcome.unreachable.is_empty() {
                warn!(
                    rebalance = %object_key(rebalance),
                    unreachable = ?outcome.unreachable,
                    "Polled a partial cluster"
                );
            }
            debug!(
                rebalance = %object_key(rebalance),
                active_jobs = outcome.jobs.len(),
                "Polled rebalance status"
            );
            if !outcome.is_active() {
                info!(
                    rebalance = %object_key(rebalance),
                    reason = REASON_REBALANCE_COMPLETED,
                    "No active rebalance job left"
                );
            }
            Ok(state_machine::polled(current, outcome, now))
        }
        Err(e @ BrokerError::NoEligibleNodes) => Err(ReconcileError::Broker(e)),
        Err(e) if e.is_retryable() => Err(ReconcileError::Broker(e)),
        Err(e) => {
            let message = poll_failed_message(&e.to_string());
            warn!(rebalance = %object_key(rebalance), error = ?e, "{message}");
            Ok(state_machine::poll_failed(current, &message, now))
        }
    }
}

/// Stop whatever the broker is still running for `rebalance`.
///
/// A missing instance or a cluster without running nodes leaves nothing to
/// stop and counts as success.
///
/// # Errors
///
/// Lookup failures other than "not found" and broker failures, so the
/// finalizer stays until a later pass succeeds.
pub async fn stop_active_jobs(
    rebalance: &Rebalance,
    resolvers: &Resolvers,
    broker: &dyn BrokerApi,
) -> Result<(), ReconcileError> {
    let key = object_key(rebalance);
    let cluster = match resolve_instance(rebalance, resolvers).await {
        Ok(cluster) => cluster,
        Err(ResolveError::NotFound { kind, name }) => {
            info!(rebalance = %key, instance = %name, kind = %kind, "Instance gone, nothing to stop");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match broker.stop(&cluster.nodes).await {
        Ok(stopped) => {
            info!(
                rebalance = %key,
                stopped = stopped,
                reason = REASON_CLEANUP_COMPLETE,
                "Stopped active rebalance jobs"
            );
            Ok(())
        }
        Err(BrokerError::NoEligibleNodes) => {
            info!(rebalance = %key, "No running broker nodes, nothing to stop");
            Ok(())
        }
        Err(e) => Err(ReconcileError::Broker(e)),
    }
}

#[async_trait]
impl FinalizerCleanup for Rebalance {
    async fn cleanup(&self, ctx: &Context) -> Result<(), ReconcileError> {
        stop_active_jobs(self, &ctx.resolvers, ctx.broker.as_ref()).await
    }
}

async fn resolve_instance(
    rebalance: &Rebalance,
    resolvers: &Resolvers,
) -> Result<ClusterHandle, ResolveError> {
    let namespace = rebalance.namespace().unwrap_or_default();
    resolvers
        .resolve(
            rebalance.spec.instance_kind,
            &rebalance.spec.instance_name,
            &namespace,
        )
        .await
}

fn object_key(rebalance: &Rebalance) -> String {
    backoff_key(rebalance.namespace().as_deref(), &rebalance.name_any())
}

/// Key under which per-object requeue state is tracked.
#[must_use]
pub fn backoff_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name)
}

/// Drop requeue state for an object the controller no longer has in its store.
///
/// Failing objects that are deleted without a finalizer never get another
/// successful pass, so their backoff entry is released here instead.
pub fn forget_object(ctx: &Context, namespace: Option<&str>, name: &str) {
    let key = backoff_key(namespace, name);
    if ctx.error_backoff.failures(&key) > 0 {
        debug!(rebalance = %key, "Forgetting requeue state of removed Rebalance");
    }
    ctx.error_backoff.reset(&key);
}
