// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance resolution: turn a `Rebalance` reference into live broker nodes.
//!
//! Each supported cluster kind has its own [`InstanceResolver`] implementation.
//! [`Resolvers`] dispatches on [`InstanceKind`] so callers never match on kind
//! strings themselves.

use async_trait::async_trait;
use kube::{Api, Client};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::retry::retry_api_call;
use crate::broker::BrokerNode;
use crate::constants::NODE_STATUS_RUNNING;
use crate::crd::{is_cluster_ready, Emqx, EmqxEnterprise, EmqxNode, InstanceKind};

/// Resolved target cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub kind: InstanceKind,
    pub name: String,
    pub namespace: String,
    /// Running nodes a rebalance can address; empty when none are running
    pub nodes: Vec<BrokerNode>,
    /// Whether the cluster carries `Ready=True`
    pub ready: bool,
}

/// Failure to resolve an instance reference.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The referenced object does not exist.
    #[error("{kind} {name} is not found")]
    NotFound { kind: InstanceKind, name: String },

    /// The API server could not be asked.
    #[error("failed to get {kind} {namespace}/{name}: {source}")]
    Kube {
        kind: InstanceKind,
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },
}

/// Looks up one kind of cluster.
#[async_trait]
pub trait InstanceResolver: Send + Sync {
    /// # Errors
    ///
    /// [`ResolveError::NotFound`] when the object is absent, [`ResolveError::Kube`]
    /// for any other API failure.
    async fn resolve(&self, name: &str, namespace: &str) -> Result<ClusterHandle, ResolveError>;
}

/// How node names are turned into management endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub scheme: String,
    pub port: u16,
}

fn running_nodes(nodes: &[EmqxNode], endpoint: &EndpointSettings) -> Vec<BrokerNode> {
    nodes
        .iter()
        .filter(|n| n.node_status == NODE_STATUS_RUNNING && !n.node.is_empty())
        .map(|n| BrokerNode::from_node_name(&n.node, &endpoint.scheme, endpoint.port))
        .collect()
}

/// Build a handle from an `EMQX` object.
///
/// Connections land on replicant nodes when the cluster has any, so running
/// replicants are preferred over cores.
#[must_use]
pub fn handle_from_emqx(emqx: &Emqx, endpoint: &EndpointSettings) -> ClusterHandle {
    let status = emqx.status.clone().unwrap_or_default();
    let replicants = running_nodes(&status.replicant_nodes, endpoint);
    let nodes = if replicants.is_empty() {
        running_nodes(&status.core_nodes, endpoint)
    } else {
        replicants
    };

    ClusterHandle {
        kind: InstanceKind::Emqx,
        name: emqx.metadata.name.clone().unwrap_or_default(),
        namespace: emqx.metadata.namespace.clone().unwrap_or_default(),
        nodes,
        ready: is_cluster_ready(&status.conditions),
    }
}

/// Build a handle from an `EmqxEnterprise` object.
#[must_use]
pub fn handle_from_enterprise(ee: &EmqxEnterprise, endpoint: &EndpointSettings) -> ClusterHandle {
    let status = ee.status.clone().unwrap_or_default();
    ClusterHandle {
        kind: InstanceKind::EmqxEnterprise,
        name: ee.metadata.name.clone().unwrap_or_default(),
        namespace: ee.metadata.namespace.clone().unwrap_or_default(),
        nodes: running_nodes(&status.emqx_nodes, endpoint),
        ready: is_cluster_ready(&status.conditions),
    }
}

fn map_get_error(kind: InstanceKind, name: &str, namespace: &str, e: kube::Error) -> ResolveError {
    match e {
        kube::Error::Api(ref api_err) if api_err.code == 404 => ResolveError::NotFound {
            kind,
            name: name.to_string(),
        },
        source => ResolveError::Kube {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
            source,
        },
    }
}

/// Resolver for `EMQX` (`apps.emqx.io/v2alpha2`).
pub struct EmqxResolver {
    client: Client,
    endpoint: EndpointSettings,
}

impl EmqxResolver {
    #[must_use]
    pub fn new(client: Client, endpoint: EndpointSettings) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl InstanceResolver for EmqxResolver {
    async fn resolve(&self, name: &str, namespace: &str) -> Result<ClusterHandle, ResolveError> {
        let api: Api<Emqx> = Api::namespaced(self.client.clone(), namespace);
        let emqx = retry_api_call(|| api.get(name), &format!("get EMQX {namespace}/{name}"))
            .await
            .map_err(|e| map_get_error(InstanceKind::Emqx, name, namespace, e))?;

        let handle = handle_from_emqx(&emqx, &self.endpoint);
        debug!(
            kind = %handle.kind,
            name = %handle.name,
            namespace = %handle.namespace,
            nodes = handle.nodes.len(),
            ready = handle.ready,
            "Resolved rebalance target"
        );
        Ok(handle)
    }
}

/// Resolver for `EmqxEnterprise` (`apps.emqx.io/v1beta4`).
pub struct EmqxEnterpriseResolver {
    client: Client,
    endpoint: EndpointSettings,
}

impl EmqxEnterpriseResolver {
    #[must_use]
    pub fn new(client: Client, endpoint: EndpointSettings) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl InstanceResolver for EmqxEnterpriseResolver {
    async fn resolve(&self, name: &str, namespace: &str) -> Result<ClusterHandle, ResolveError> {
        let api: Api<EmqxEnterprise> = Api::namespaced(self.client.clone(), namespace);
        let ee = retry_api_call(
            || api.get(name),
            &format!("get EmqxEnterprise {namespace}/{name}"),
        )
        .await
        .map_err(|e| map_get_error(InstanceKind::EmqxEnterprise, name, namespace, e))?;

        let handle = handle_from_enterprise(&ee, &self.endpoint);
        debug!(
            kind = %handle.kind,
            name = %handle.name,
            namespace = %handle.namespace,
            nodes = handle.nodes.len(),
            ready = handle.ready,
            "Resolved rebalance target"
        );
        Ok(handle)
    }
}

/// One resolver per [`InstanceKind`].
#[derive(Clone)]
pub struct Resolvers {
    emqx: Arc<dyn InstanceResolver>,
    enterprise: Arc<dyn InstanceResolver>,
}

impl Resolvers {
    #[must_use]
    pub fn new(emqx: Arc<dyn InstanceResolver>, enterprise: Arc<dyn InstanceResolver>) -> Self {
        Self { emqx, enterprise }
    }

    /// Kubernetes-backed resolvers for both kinds.
    #[must_use]
    pub fn from_client(client: &Client, endpoint: &EndpointSettings) -> Self {
        Self::new(
            Arc::new(EmqxResolver::new(client.clone(), endpoint.clone())),
            Arc::new(EmqxEnterpriseResolver::new(client.clone(), endpoint.clone())),
        )
    }

    #[must_use]
    pub fn for_kind(&self, kind: InstanceKind) -> &dyn InstanceResolver {
        match kind {
            InstanceKind::Emqx => self.emqx.as_ref(),
            InstanceKind::EmqxEnterprise => self.enterprise.as_ref(),
        }
    }

    /// Resolve `name` in `namespace` with the resolver for `kind`.
    ///
    /// # Errors
    ///
    /// See [`InstanceResolver::resolve`].
    pub async fn resolve(
        &self,
        kind: InstanceKind,
        name: &str,
        namespace: &str,
    ) -> Result<ClusterHandle, ResolveError> {
        self.for_kind(kind).resolve(name, namespace).await
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
