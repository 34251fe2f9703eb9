// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Errors surfaced at the controller boundary.
//!
//! Anything that ends a reconcile with `Err` lands here. User-visible failures
//! (missing instance, broker rejections, invalid strategy) never do: they are
//! written to status as a `Failed` phase instead. What remains only affects
//! requeue timing.

use std::time::Duration;
use thiserror::Error;

use crate::broker::BrokerError;
use crate::http_errors::broker_error_reason;
use crate::reconcilers::resolver::ResolveError;
use crate::reconcilers::retry::is_retryable_error;

/// Reconcile failure that leads to a requeue.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Broker call failed without a definitive answer (transport, 429/502/503/504),
    /// or a deletion-time stop call could not be completed.
    #[error("broker call failed: {0}")]
    Broker(#[source] BrokerError),

    /// Instance lookup failed for a reason other than "not found".
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Status changed under us and the computed status no longer applies.
    #[error("status of Rebalance {namespace}/{name} was modified concurrently")]
    Conflict { namespace: String, name: String },

    /// Kubernetes API call failed.
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The reconcile ran past its deadline.
    #[error("reconcile exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// The object has no namespace, which a namespaced kind never should.
    #[error("Rebalance {0} has no namespace")]
    MissingNamespace(String),
}

impl ReconcileError {
    /// Requeue immediately rather than with backoff.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Kube(kube::Error::Api(api_err)) => api_err.code == 409,
            _ => false,
        }
    }

    /// Whether repeating the reconcile can succeed without user action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Broker(_) | Self::Conflict { .. } | Self::Timeout(_) => true,
            Self::Resolve(ResolveError::Kube { source, .. }) => is_retryable_error(source),
            Self::Kube(e) => self.is_conflict() || is_retryable_error(e),
            Self::Resolve(ResolveError::NotFound { .. }) | Self::MissingNamespace(_) => false,
        }
    }

    /// Short label for the requeue metric.
    #[must_use]
    pub fn requeue_reason(&self) -> &'static str {
        match self {
            Self::Broker(e) => broker_error_reason(e),
            Self::Resolve(_) => "resolve",
            Self::Conflict { .. } => "conflict",
            Self::Kube(_) if self.is_conflict() => "conflict",
            Self::Kube(_) => "kube_api",
            Self::Timeout(_) => "timeout",
            Self::MissingNamespace(_) => "invalid_object",
        }
    }
}

#[cfg(test)]
#[path = "rebalance_errors_tests.rs"]
mod rebalance_errors_tests;
