// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `Rebalance` controller.
//!
//! The controller receives an `Arc<Context>` that contains:
//! - Kubernetes client for finalizer and status writes
//! - Broker management client (as a trait object)
//! - Instance resolvers for each supported cluster kind
//! - Timing settings and per-object error backoff

use kube::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::broker::{BrokerApi, BrokerClient};
use crate::config::{OperatorConfig, ReconcileSettings};
use crate::constants::{ERROR_REQUEUE_BASE_SECS, ERROR_REQUEUE_MAX_SECS};
use crate::reconcilers::resolver::Resolvers;
use crate::reconcilers::retry::RequeueBackoff;

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Broker management API
    pub broker: Arc<dyn BrokerApi>,

    /// Target cluster lookup, one resolver per kind
    pub resolvers: Resolvers,

    /// Deadline and requeue intervals
    pub settings: ReconcileSettings,

    /// Error requeue delays, tracked per object key
    pub error_backoff: Arc<RequeueBackoff>,
}

impl Context {
    #[must_use]
    pub fn new(
        client: Client,
        broker: Arc<dyn BrokerApi>,
        resolvers: Resolvers,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            client,
            broker,
            resolvers,
            settings,
            error_backoff: Arc::new(RequeueBackoff::new(
                Duration::from_secs(ERROR_REQUEUE_BASE_SECS),
                Duration::from_secs(ERROR_REQUEUE_MAX_SECS),
            )),
        }
    }

    /// Production context: `reqwest` broker client and API-backed resolvers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(client: Client, config: &OperatorConfig) -> Result<Self, reqwest::Error> {
        let broker = broker_client(config)?;
        let resolvers = Resolvers::from_client(&client, &config.endpoint_settings());
        Ok(Self::new(
            client,
            Arc::new(broker),
            resolvers,
            config.reconcile_settings(),
        ))
    }
}

/// Build the broker client described by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn broker_client(config: &OperatorConfig) -> Result<BrokerClient, reqwest::Error> {
    BrokerClient::new(
        config.broker_request_timeout(),
        config.credentials(),
        &config.broker_api_scheme,
        config.broker_api_port,
    )
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
