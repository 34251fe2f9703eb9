// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting can be given as a command-line flag or through the
//! environment variable named next to it. Defaults live in
//! [`crate::constants`].

use clap::Parser;
use std::time::Duration;

use crate::broker::ApiCredentials;
use crate::constants::{
    DEFAULT_BROKER_API_PORT, DEFAULT_BROKER_API_SCHEME, DEFAULT_BROKER_REQUEST_TIMEOUT_SECS,
    DEFAULT_DRIFT_REQUEUE_SECS, DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_PROCESSING_REQUEUE_SECS,
    DEFAULT_RECONCILE_TIMEOUT_SECS,
};
use crate::reconcilers::resolver::EndpointSettings;

/// Rebalance operator for EMQX clusters
#[derive(Parser, Debug, Clone)]
#[command(name = "rebalancer", version, about, long_about = None)]
pub struct OperatorConfig {
    /// Port of the broker management API on every node
    #[arg(long, env = "BROKER_API_PORT", default_value_t = DEFAULT_BROKER_API_PORT)]
    pub broker_api_port: u16,

    /// Scheme used to reach the broker management API
    #[arg(long, env = "BROKER_API_SCHEME", default_value = DEFAULT_BROKER_API_SCHEME)]
    pub broker_api_scheme: String,

    /// API key for basic auth against the management API
    #[arg(long, env = "BROKER_API_KEY")]
    pub broker_api_key: Option<String>,

    /// API secret for basic auth against the management API
    #[arg(long, env = "BROKER_API_SECRET", hide_env_values = true)]
    pub broker_api_secret: Option<String>,

    /// Timeout of a single management API request, in seconds
    #[arg(long, env = "BROKER_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_BROKER_REQUEST_TIMEOUT_SECS)]
    pub broker_request_timeout_secs: u64,

    /// Deadline for one reconcile pass, in seconds
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout_secs: u64,

    /// Requeue interval while a rebalance is processing, in seconds
    #[arg(long, env = "PROCESSING_REQUEUE_SECS", default_value_t = DEFAULT_PROCESSING_REQUEUE_SECS)]
    pub processing_requeue_secs: u64,

    /// Requeue interval for completed or failed rebalances, in seconds
    #[arg(long, env = "DRIFT_REQUEUE_SECS", default_value_t = DEFAULT_DRIFT_REQUEUE_SECS)]
    pub drift_requeue_secs: u64,

    /// Bind address of the metrics and health server
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,
}

impl OperatorConfig {
    /// Basic-auth credentials, present only when both key and secret are set.
    #[must_use]
    pub fn credentials(&self) -> Option<ApiCredentials> {
        match (&self.broker_api_key, &self.broker_api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() => Some(ApiCredentials {
                key: key.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn broker_request_timeout(&self) -> Duration {
        Duration::from_secs(self.broker_request_timeout_secs)
    }

    #[must_use]
    pub fn endpoint_settings(&self) -> EndpointSettings {
        EndpointSettings {
            scheme: self.broker_api_scheme.clone(),
            port: self.broker_api_port,
        }
    }

    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_secs),
            processing_requeue: Duration::from_secs(self.processing_requeue_secs),
            drift_requeue: Duration::from_secs(self.drift_requeue_secs),
        }
    }

    /// Namespace to watch, with an empty value meaning all namespaces.
    #[must_use]
    pub fn watch_namespace(&self) -> Option<&str> {
        self.watch_namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

/// Timing knobs used by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Deadline for a single pass
    pub reconcile_timeout: Duration,
    /// Requeue while a job runs
    pub processing_requeue: Duration,
    /// Requeue for terminal resources
    pub drift_requeue: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            processing_requeue: Duration::from_secs(DEFAULT_PROCESSING_REQUEUE_SECS),
            drift_requeue: Duration::from_secs(DEFAULT_DRIFT_REQUEUE_SECS),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
