// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use kube::{
    api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, PostParams},
    client::Client,
};
use rebalancer::crd::{Emqx, InstanceKind, Rebalance, RebalanceSpec, RebalanceStrategy};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {}", e);
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "rebalancer-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Create an EMQX 5 cluster with `core_replicas` core nodes and no replicants.
///
/// Goes through a dynamic object so the full operator spec can be sent even
/// though [`Emqx`] only models the fields the rebalancer reads.
pub async fn create_emqx_cluster(
    client: &Client,
    namespace: &str,
    name: &str,
    core_replicas: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let gvk = GroupVersionKind::gvk("apps.emqx.io", "v2alpha2", "EMQX");
    let resource = ApiResource::from_gvk_with_plural(&gvk, "emqxes");
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &resource);

    let cluster: DynamicObject = serde_json::from_value(json!({
        "apiVersion": "apps.emqx.io/v2alpha2",
        "kind": "EMQX",
        "metadata": {
            "name": name,
            "namespace": namespace
        },
        "spec": {
            "image": "emqx:5",
            "coreTemplate": {
                "spec": {
                    "replicas": core_replicas
                }
            },
            "replicantTemplate": {
                "spec": {
                    "replicas": 0
                }
            }
        }
    }))?;

    api.create(&PostParams::default(), &cluster).await?;
    println!("Created EMQX cluster: {}/{}", namespace, name);
    Ok(())
}

/// Build a `Rebalance` with the strategy used across the scenarios.
pub fn rebalance(namespace: &str, name: &str, instance_name: &str) -> Rebalance {
    let mut rebalance = Rebalance::new(
        name,
        RebalanceSpec {
            instance_name: instance_name.to_string(),
            instance_kind: InstanceKind::Emqx,
            rebalance_strategy: RebalanceStrategy {
                conn_evict_rate: 10,
                sess_evict_rate: 10,
                wait_takeover: 10,
                wait_health_check: 10,
                abs_conn_threshold: 100,
                abs_sess_threshold: 100,
                rel_conn_threshold: "1.2".to_string(),
                rel_sess_threshold: "1.2".to_string(),
            },
        },
    );
    rebalance.metadata.namespace = Some(namespace.to_string());
    rebalance
}

/// Poll `check` every two seconds until it returns `Some` or `timeout` elapses.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(Duration::from_secs(2)).await;
    }
}

/// Wait until the EMQX cluster reports `ready_replicas` ready core nodes.
pub async fn wait_for_emqx_ready(
    client: &Client,
    namespace: &str,
    name: &str,
    ready_replicas: i32,
    timeout: Duration,
) -> bool {
    let api: Api<Emqx> = Api::namespaced(client.clone(), namespace);
    wait_for(timeout, || {
        let api = api.clone();
        async move {
            let emqx = api.get_status(name).await.ok()?;
            let ready = emqx
                .status?
                .core_nodes_status?
                .ready_replicas;
            (ready == ready_replicas).then_some(())
        }
    })
    .await
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_kube_client() {
        // This test will pass in cluster and skip outside
        match get_kube_client_or_skip().await {
            Some(_client) => {
                println!("Successfully connected to Kubernetes cluster");
            }
            None => {
                println!("Not in Kubernetes cluster - test skipped");
            }
        }
    }

    #[test]
    fn test_rebalance_fixture() {
        let rb = rebalance("ns", "rb", "emqx");
        assert_eq!(rb.metadata.namespace.as_deref(), Some("ns"));
        assert_eq!(rb.spec.instance_name, "emqx");
        assert!(rb.status.is_none());
    }
}
