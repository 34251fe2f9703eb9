// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for namespaced custom resources.
//!
//! # Example
//!
//! ```rust,ignore
//! use rebalancer::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
//!
//! #[async_trait::async_trait]
//! impl FinalizerCleanup for Rebalance {
//!     async fn cleanup(&self, ctx: &Context) -> Result<(), ReconcileError> {
//!         // Stop broker-side work
//!         Ok(())
//!     }
//! }
//!
//! if rebalance.metadata.deletion_timestamp.is_some() {
//!     return handle_deletion(&ctx, &rebalance, FINALIZER).await;
//! }
//! let rebalance = ensure_finalizer(&ctx.client, &rebalance, FINALIZER).await?;
//! ```

use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::info;

use crate::context::Context;
use crate::rebalance_errors::ReconcileError;

/// Resources that must run cleanup before their finalizer is removed.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Perform cleanup operations before the finalizer is removed.
    ///
    /// # Errors
    ///
    /// If this returns an error the finalizer stays and deletion is blocked
    /// until a later reconcile succeeds.
    async fn cleanup(&self, ctx: &Context) -> Result<(), ReconcileError>;
}

/// Finalizer list with `finalizer` added, or `None` when already present.
#[must_use]
pub fn finalizers_with(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let mut finalizers = current.cloned().unwrap_or_default();
    if finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list with `finalizer` removed, or `None` when already absent.
#[must_use]
pub fn finalizers_without(current: Option<&Vec<String>>, finalizer: &str) -> Option<Vec<String>> {
    let finalizers = current?;
    if !finalizers.iter().any(|f| f == finalizer) {
        return None;
    }
    Some(
        finalizers
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect(),
    )
}

/// Add a finalizer to a resource if not already present.
///
/// Returns the resource as stored after the patch, so later writes carry the
/// new `resourceVersion`. Idempotent; an already present finalizer returns a
/// copy of `resource` without an API call.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<T, kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let Some(finalizers) = finalizers_with(resource.meta().finalizers.as_ref(), finalizer) else {
        return Ok(resource.clone());
    };

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    let patched = api
        .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    info!(
        finalizer = finalizer,
        namespace = %namespace,
        name = %name,
        kind = %T::kind(&()),
        "Added finalizer"
    );
    Ok(patched)
}

/// Remove a finalizer from a resource.
///
/// Returns the resource as stored after the patch. Idempotent; when the
/// finalizer is absent or the resource is already gone a copy of `resource`
/// comes back.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<T, kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let Some(finalizers) = finalizers_without(resource.meta().finalizers.as_ref(), finalizer)
    else {
        return Ok(resource.clone());
    };

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    let patched = match api
        .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(patched) => patched,
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => resource.clone(),
        Err(e) => return Err(e),
    };

    info!(
        finalizer = finalizer,
        namespace = %namespace,
        name = %name,
        kind = %T::kind(&()),
        "Removed finalizer"
    );
    Ok(patched)
}

/// Run cleanup and then remove the finalizer.
///
/// Does nothing when the finalizer is already gone.
///
/// # Errors
///
/// Returns the cleanup error (finalizer kept) or the patch error.
pub async fn handle_deletion<T>(
    ctx: &Context,
    resource: &T,
    finalizer: &str,
) -> Result<(), ReconcileError>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if !resource.finalizers().iter().any(|f| f == finalizer) {
        return Ok(());
    }

    info!(
        kind = %T::kind(&()),
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        "Running cleanup before finalizer removal"
    );

    resource.cleanup(ctx).await?;
    remove_finalizer(&ctx.client, resource, finalizer).await?;
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
