// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end scenarios for the Rebalance controller
//!
//! These tests need a Kubernetes cluster with the EMQX operator, the
//! `Rebalance` CRD and a running rebalancer.
//!
//! Run with: cargo test --test rebalance_integration -- --ignored

mod common;

use common::{
    cleanup_test_namespace, create_emqx_cluster, create_test_namespace, get_kube_client_or_skip,
    rebalance, wait_for, wait_for_emqx_ready,
};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::client::Client;
use rebalancer::crd::{ConditionStatus, Rebalance, RebalanceConditionType, RebalancePhase};
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(120);
const CLUSTER_TIMEOUT: Duration = Duration::from_secs(600);

/// Wait until the rebalance reaches `phase` and return it.
async fn wait_for_phase(
    api: &Api<Rebalance>,
    name: &str,
    phase: RebalancePhase,
) -> Option<Rebalance> {
    wait_for(TIMEOUT, || async move {
        let rb = api.get(name).await.ok()?;
        (rb.phase() == Some(phase)).then_some(rb)
    })
    .await
}

fn condition_message(rb: &Rebalance, condition_type: RebalanceConditionType) -> Option<String> {
    let condition = rb.status.as_ref()?.condition(condition_type)?;
    (condition.status == ConditionStatus::True).then(|| condition.message.clone())
}

async fn setup(namespace: &str) -> Option<Client> {
    let client = get_kube_client_or_skip().await?;
    create_test_namespace(&client, namespace)
        .await
        .expect("Failed to create test namespace");
    Some(client)
}

#[tokio::test]
#[ignore] // Run with: cargo test --test rebalance_integration -- --ignored
async fn test_missing_instance_fails() {
    println!("\n=== Test: Rebalance against a missing instance ===\n");

    let namespace = "e2e-rebalance-missing";
    let Some(client) = setup(namespace).await else {
        return;
    };

    let api: Api<Rebalance> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), &rebalance(namespace, "rebalance", "fake"))
        .await
        .expect("Failed to create Rebalance");

    let rb = wait_for_phase(&api, "rebalance", RebalancePhase::Failed)
        .await
        .expect("Rebalance never reached Failed");

    assert!(rb.status.as_ref().unwrap().rebalance_states.is_none());
    assert_eq!(
        condition_message(&rb, RebalanceConditionType::Failed).as_deref(),
        Some("EMQX fake is not found")
    );

    cleanup_test_namespace(&client, namespace).await.ok();
    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_nothing_to_rebalance_then_forced_completion() {
    println!("\n=== Test: Rebalance with nothing eligible, then forced completion ===\n");

    let namespace = "e2e-rebalance-cores";
    let Some(client) = setup(namespace).await else {
        return;
    };

    create_emqx_cluster(&client, namespace, "emqx", 2)
        .await
        .expect("Failed to create EMQX cluster");
    assert!(
        wait_for_emqx_ready(&client, namespace, "emqx", 2, CLUSTER_TIMEOUT).await,
        "EMQX cluster never became ready"
    );

    let api: Api<Rebalance> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), &rebalance(namespace, "rebalance", "emqx"))
        .await
        .expect("Failed to create Rebalance");

    let rb = wait_for_phase(&api, "rebalance", RebalancePhase::Failed)
        .await
        .expect("Rebalance never reached Failed");
    assert_eq!(
        condition_message(&rb, RebalanceConditionType::Failed).as_deref(),
        Some("Failed to start rebalance: request api failed: 400 Bad Request")
    );
    assert!(rb.metadata.finalizers.unwrap_or_default().is_empty());

    // Force the phase back to Processing, then touch an annotation so the
    // controller sees a new event and polls the broker.
    api.patch_status(
        "rebalance",
        &PatchParams::default(),
        &Patch::Merge(&json!({ "status": { "phase": "Processing", "conditions": [] } })),
    )
    .await
    .expect("Failed to force Processing");
    api.patch(
        "rebalance",
        &PatchParams::default(),
        &Patch::Merge(&json!({ "metadata": { "annotations": { "test": "e2e" } } })),
    )
    .await
    .expect("Failed to annotate Rebalance");

    let rb = wait_for_phase(&api, "rebalance", RebalancePhase::Completed)
        .await
        .expect("Rebalance never reached Completed");
    assert!(rb.status.as_ref().unwrap().rebalance_states.is_none());
    assert!(condition_message(&rb, RebalanceConditionType::Completed).is_some());

    cleanup_test_namespace(&client, namespace).await.ok();
    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_deleting_failed_rebalance_is_not_blocked() {
    println!("\n=== Test: Delete a terminal Rebalance ===\n");

    let namespace = "e2e-rebalance-delete";
    let Some(client) = setup(namespace).await else {
        return;
    };

    let api: Api<Rebalance> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), &rebalance(namespace, "rebalance", "fake"))
        .await
        .expect("Failed to create Rebalance");
    wait_for_phase(&api, "rebalance", RebalancePhase::Failed)
        .await
        .expect("Rebalance never reached Failed");

    api.delete("rebalance", &Default::default())
        .await
        .expect("Failed to delete Rebalance");

    let gone = wait_for(TIMEOUT, || {
        let api = api.clone();
        async move {
            match api.get_opt("rebalance").await {
                Ok(None) => Some(()),
                _ => None,
            }
        }
    })
    .await;
    assert!(gone.is_some(), "Rebalance was never removed");

    cleanup_test_namespace(&client, namespace).await.ok();
    println!("\n✓ Test passed\n");
}
