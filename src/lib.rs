// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Rebalancer - EMQX Load Rebalance Operator for Kubernetes
//!
//! Rebalancer is a Kubernetes operator written in Rust that drives EMQX's load-rebalance
//! management API through a `Rebalance` Custom Resource Definition.
//!
//! ## Overview
//!
//! This library provides the core functionality for the operator, including:
//!
//! - The `Rebalance` CRD and read-only views of the `EMQX` / `EmqxEnterprise` clusters
//! - Reconciliation logic that starts, tracks and stops broker rebalance jobs
//! - A typed client for the broker management API
//! - Status, finalizer and metrics plumbing
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic and the phase state machine
//! - [`broker`] - EMQX load-rebalance management API client
//! - [`context`] - Shared context handed to the controller
//! - [`config`] - Command-line and environment configuration
//! - [`health`] - Probe and metrics HTTP server
//!
//! ## Example
//!
//! ```rust,no_run
//! use rebalancer::crd::{InstanceKind, RebalanceSpec, RebalanceStrategy};
//!
//! let spec = RebalanceSpec {
//!     instance_name: "emqx".to_string(),
//!     instance_kind: InstanceKind::Emqx,
//!     rebalance_strategy: RebalanceStrategy {
//!         conn_evict_rate: 10,
//!         sess_evict_rate: 10,
//!         wait_takeover: 10,
//!         wait_health_check: 10,
//!         abs_conn_threshold: 100,
//!         abs_sess_threshold: 100,
//!         rel_conn_threshold: "1.2".to_string(),
//!         rel_sess_threshold: "1.2".to_string(),
//!     },
//! };
//! ```
//!
//! ## Features
//!
//! - **Finalizer-guarded cleanup** - Deleting a running `Rebalance` stops the broker job
//! - **Partial-cluster polling** - Unreachable nodes degrade a poll instead of failing it
//! - **Status Tracking** - Phase, conditions and per-node progress on the status subresource

pub mod broker;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod health;
pub mod http_errors;
pub mod metrics;
pub mod rebalance_errors;
pub mod reconcilers;
pub mod status_reasons;

#[cfg(test)]
mod http_errors_tests;
#[cfg(test)]
mod status_reasons_tests;
