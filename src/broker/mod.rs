// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! EMQX load-rebalance management via the broker HTTP API.
//!
//! This module talks to the `/api/v5/load_rebalance` endpoints exposed by every
//! EMQX node. It handles:
//!
//! - Starting a rebalance job on the first reachable node
//! - Polling `global_status` across the cluster and merging the answers
//! - Stopping every active job, tolerating jobs that already finished
//!
//! # Architecture
//!
//! The reconciler only sees the [`BrokerApi`] trait, so orchestration logic can
//! be exercised with an in-memory fake. [`BrokerClient`] is the production
//! implementation backed by `reqwest`; it fans single-node calls from
//! [`api_ops`] out over the node set of a cluster.
//!
//! # Example
//!
//! ```rust,no_run
//! use rebalancer::broker::{BrokerApi, BrokerClient, BrokerNode};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BrokerClient::new(Duration::from_secs(10), None, "http", 18083)?;
//! let nodes = vec![BrokerNode::from_node_name("emqx@10.0.0.12", "http", 18083)];
//! let outcome = client.poll_active(&nodes).await?;
//! println!("{} active jobs", outcome.jobs.len());
//! # Ok(())
//! # }
//! ```

pub mod api_ops;
pub mod error;
pub mod types;

pub use error::BrokerError;
pub use types::{
    parse_relative_threshold, validate_strategy, ApiCredentials, BrokerNode, GlobalStatusResponse,
    JobHandle, PollOutcome, RebalanceInfo, RebalanceInfoStats, StartRequest,
};

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client as HttpClient;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::http_errors::broker_error_reason;
use crate::metrics::{record_broker_request, record_unreachable_nodes};

/// The three logical management calls the reconciler needs.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Start a job. Nodes are tried in order until one gives an HTTP answer.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NoEligibleNodes`] for an empty node set, the first HTTP
    /// rejection, or the last transport error when no node answered.
    async fn start(
        &self,
        nodes: &[BrokerNode],
        request: &StartRequest,
    ) -> Result<JobHandle, BrokerError>;

    /// Collect active jobs from every node.
    ///
    /// # Errors
    ///
    /// An HTTP rejection from any node, or a transport error when no node answered.
    async fn poll_active(&self, nodes: &[BrokerNode]) -> Result<PollOutcome, BrokerError>;

    /// Stop every active job. Returns how many stop calls the broker accepted.
    ///
    /// # Errors
    ///
    /// Same as [`BrokerApi::poll_active`], plus rejections of stop calls other
    /// than "not running".
    async fn stop(&self, nodes: &[BrokerNode]) -> Result<usize, BrokerError>;
}

/// Production [`BrokerApi`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    /// HTTP client with the per-request timeout baked in
    http: HttpClient,
    /// Basic-auth key pair, if configured
    credentials: Option<ApiCredentials>,
    /// Scheme used to derive coordinator endpoints
    scheme: String,
    /// Management port used to derive coordinator endpoints
    port: u16,
}

impl BrokerClient {
    /// Create a client with a fixed per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(
        timeout: Duration,
        credentials: Option<ApiCredentials>,
        scheme: &str,
        port: u16,
    ) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            credentials,
            scheme: scheme.to_string(),
            port,
        })
    }

    fn record(operation: &str, result: &Result<(), &BrokerError>) {
        match result {
            Ok(()) => record_broker_request(operation, "success"),
            Err(e) => record_broker_request(operation, broker_error_reason(e)),
        }
    }

    /// Stop one job, trying the coordinator first and then the other nodes.
    ///
    /// Returns `true` when the broker accepted the stop, `false` when the job
    /// had already ended.
    async fn stop_job(&self, coordinator: &str, nodes: &[BrokerNode]) -> Result<bool, BrokerError> {
        let mut candidates = vec![nodes
            .iter()
            .find(|n| n.name == coordinator)
            .cloned()
            .unwrap_or_else(|| BrokerNode::from_node_name(coordinator, &self.scheme, self.port))];
        candidates.extend(nodes.iter().filter(|n| n.name != coordinator).cloned());

        let mut last_transport = None;
        for node in &candidates {
            let result = api_ops::stop_rebalance(
                &self.http,
                self.credentials.as_ref(),
                &node.endpoint,
                coordinator,
            )
            .await;
            Self::record("stop", &result.as_ref().map(|_| ()));

            match result {
                Ok(()) => {
                    info!(coordinator = %coordinator, endpoint = %node.endpoint, "Stopped rebalance job");
                    return Ok(true);
                }
                Err(e) if e.is_not_running() => {
                    debug!(coordinator = %coordinator, "Rebalance job already stopped");
                    return Ok(false);
                }
                Err(e @ BrokerError::Transport { .. }) => {
                    warn!(
                        coordinator = %coordinator,
                        endpoint = %node.endpoint,
                        error = %e,
                        "Node unreachable for stop call, trying next node"
                    );
                    last_transport = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_transport.unwrap_or(BrokerError::NoEligibleNodes))
    }
}

#[async_trait]
impl BrokerApi for BrokerClient {
    async fn start(
        &self,
        nodes: &[BrokerNode],
        request: &StartRequest,
    ) -> Result<JobHandle, BrokerError> {
        let mut last_transport = None;

        for node in nodes {
            let result = api_ops::start_rebalance(
                &self.http,
                self.credentials.as_ref(),
                &node.endpoint,
                &node.name,
                request,
            )
            .await;
            Self::record("start", &result.as_ref().map(|_| ()));

            match result {
                Ok(()) => {
                    info!(
                        coordinator = %node.name,
                        endpoint = %node.endpoint,
                        nodes = ?request.nodes,
                        "Broker accepted rebalance start"
                    );
                    return Ok(JobHandle {
                        coordinator_node: node.name.clone(),
                        endpoint: node.endpoint.clone(),
                    });
                }
                Err(e @ BrokerError::Transport { .. }) => {
                    warn!(
                        node = %node.name,
                        error = %e,
                        "Node unreachable for start call, trying next node"
                    );
                    last_transport = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_transport.unwrap_or(BrokerError::NoEligibleNodes))
    }

    async fn poll_active(&self, nodes: &[BrokerNode]) -> Result<PollOutcome, BrokerError> {
        if nodes.is_empty() {
            return Err(BrokerError::NoEligibleNodes);
        }

        let results = join_all(nodes.iter().map(|node| {
            api_ops::global_status(&self.http, self.credentials.as_ref(), &node.endpoint)
        }))
        .await;

        let mut outcome = PollOutcome::default();
        let mut seen = HashSet::new();
        let mut last_transport = None;

        for (node, result) in nodes.iter().zip(results) {
            Self::record("global_status", &result.as_ref().map(|_| ()));
            match result {
                Ok(response) => {
                    for info in response.rebalances {
                        if seen.insert(info.node.clone()) {
                            outcome.jobs.push(info.into());
                        }
                    }
                }
                Err(e @ BrokerError::Transport { .. }) => {
                    warn!(node = %node.name, error = %e, "Node unreachable during poll");
                    outcome.unreachable.push(node.endpoint.clone());
                    last_transport = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        record_unreachable_nodes("global_status", outcome.unreachable.len());
        if outcome.unreachable.len() == nodes.len() {
            return Err(last_transport.unwrap_or(BrokerError::NoEligibleNodes));
        }

        outcome.jobs.sort_by(|a, b| a.node.cmp(&b.node));
        debug!(
            active_jobs = outcome.jobs.len(),
            unreachable = outcome.unreachable.len(),
            "Polled rebalance status"
        );
        Ok(outcome)
    }

    async fn stop(&self, nodes: &[BrokerNode]) -> Result<usize, BrokerError> {
        let outcome = self.poll_active(nodes).await?;

        let mut coordinators: Vec<String> = Vec::new();
        for job in &outcome.jobs {
            if !coordinators.contains(&job.coordinator_node) {
                coordinators.push(job.coordinator_node.clone());
            }
        }

        let mut stopped = 0;
        for coordinator in &coordinators {
            if self.stop_job(coordinator, nodes).await? {
                stopped += 1;
            }
        }

        Ok(stopped)
    }
}
