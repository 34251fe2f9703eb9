// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{controller, watcher::Config, Controller},
    Api, Client,
};
use rebalancer::{
    config::OperatorConfig,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    crd::Rebalance,
    health::{run_health_server, HealthState},
    reconcilers::{error_policy, forget_object, reconcile_rebalance},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("rebalancer-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting EMQX Rebalance Controller");
    debug!(config = ?redacted(&config), "Configuration loaded");

    if config.broker_api_key.is_some() != config.broker_api_secret.is_some() {
        warn!("Only one of BROKER_API_KEY / BROKER_API_SECRET is set; management API calls are unauthenticated");
    }

    // Initialize Kubernetes client
    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::from_config(client.clone(), &config)?);
    let health = Arc::new(HealthState::new());

    info!("Starting controller and metrics server");

    // Neither task should ever return - if one does, exit the process
    tokio::select! {
        result = run_rebalance_controller(client, ctx, config.watch_namespace().map(str::to_string), health.clone()) => {
            error!("CRITICAL: Rebalance controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Rebalance controller exited unexpectedly without error")
        }
        result = run_health_server(&config.metrics_bind_address, health) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
    }
}

/// Run the `Rebalance` controller
async fn run_rebalance_controller(
    client: Client,
    ctx: Arc<Context>,
    watch_namespace: Option<String>,
    health: Arc<HealthState>,
) -> Result<()> {
    let api = match watch_namespace.as_deref() {
        Some(namespace) => {
            info!(namespace = %namespace, "Starting Rebalance controller for a single namespace");
            Api::<Rebalance>::namespaced(client, namespace)
        }
        None => {
            info!("Starting Rebalance controller with cluster-wide watch");
            Api::<Rebalance>::all(client)
        }
    };

    health.set_ready(true);

    Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_rebalance, error_policy, ctx.clone())
        .for_each(|result| {
            match result {
                Ok((obj, _action)) => debug!(rebalance = %obj.name, "Reconciled"),
                Err(controller::Error::ObjectNotFound(obj)) => {
                    forget_object(&ctx, obj.namespace.as_deref(), &obj.name);
                }
                Err(e) => debug!(error = %e, "Reconcile loop reported an error"),
            }
            futures::future::ready(())
        })
        .await;

    health.set_ready(false);
    Ok(())
}

/// Copy of the configuration that is safe to log.
fn redacted(config: &OperatorConfig) -> OperatorConfig {
    let mut config = config.clone();
    if config.broker_api_secret.is_some() {
        config.broker_api_secret = Some("***".to_string());
    }
    config
}
