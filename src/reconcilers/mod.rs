// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation for `Rebalance` resources.
//!
//! # Reconciliation Architecture
//!
//! The controller follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `Rebalance` changes via the Kubernetes API
//! 2. **Decide** - Compute the next phase from persisted status alone
//! 3. **Act** - Start, poll or stop the broker-side rebalance job
//! 4. **Status** - Report the outcome back to Kubernetes
//!
//! # Modules
//!
//! - [`rebalance`] - Controller entry point and the phase state machine
//! - [`resolver`] - Resolves `EMQX` / `EmqxEnterprise` references into broker nodes
//! - [`finalizers`] - Finalizer attach, cleanup and release
//! - [`status`] - Condition helpers and the conflict-aware status writer
//! - [`retry`] - Backoff for Kubernetes API reads and error requeues
//!
//! # Example: Running the Controller
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use kube::runtime::{watcher::Config, Controller};
//! use kube::Api;
//! use rebalancer::context::Context;
//! use rebalancer::crd::Rebalance;
//! use rebalancer::reconcilers::{error_policy, reconcile_rebalance};
//! use std::sync::Arc;
//!
//! async fn run(ctx: Arc<Context>) {
//!     let api = Api::<Rebalance>::all(ctx.client.clone());
//!     Controller::new(api, Config::default())
//!         .run(reconcile_rebalance, error_policy, ctx)
//!         .for_each(|_| futures::future::ready(()))
//!         .await;
//! }
//! ```

pub mod finalizers;
pub mod rebalance;
pub mod resolver;
pub mod retry;
pub mod status;

pub use rebalance::{error_policy, forget_object, reconcile_rebalance};

/// Check if a resource's spec has changed since the controller last acted on it.
///
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observedGeneration` is recorded by the controller when it acts on a spec.
///
/// # Returns
///
/// * `true` - Both generations are known and differ
/// * `false` - They match, or either one is unknown
#[must_use]
pub fn generation_changed(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        _ => false,
    }
}

#[cfg(test)]
mod mod_tests;
