// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Load-rebalance HTTP operations against a single EMQX node.
//!
//! Every function here talks to exactly one endpoint; fan-out over the
//! cluster lives in [`super::BrokerClient`].

use reqwest::{Client as HttpClient, Method};
use serde::Serialize;
use tracing::{debug, error, info};
use url::Url;

use super::error::BrokerError;
use super::types::{ApiCredentials, GlobalStatusResponse, StartRequest};
use crate::constants::BROKER_API_PREFIX;

/// Build a request URL from an endpoint and path segments.
///
/// Segments are percent-encoded individually, so node names such as
/// `emqx@10.0.0.1` can be placed in the path safely.
pub(crate) fn build_api_url(endpoint: &str, segments: &[&str]) -> Result<Url, BrokerError> {
    let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", endpoint.trim_end_matches('/'))
    };

    let mut url = Url::parse(&base).map_err(|e| BrokerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| BrokerError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "endpoint cannot carry a path".to_string(),
            })?;
        path.pop_if_empty();
        for prefix in BROKER_API_PREFIX.split('/').filter(|s| !s.is_empty()) {
            path.push(prefix);
        }
        for segment in segments {
            path.push(segment);
        }
    }

    Ok(url)
}

/// Send one request and return the response body.
///
/// Non-2xx answers become [`BrokerError::Rejected`] with the raw body preserved;
/// failures before an answer become [`BrokerError::Transport`].
async fn broker_request<T: Serialize + std::fmt::Debug>(
    client: &HttpClient,
    credentials: Option<&ApiCredentials>,
    method: Method,
    endpoint: &str,
    url: Url,
    body: Option<&T>,
) -> Result<String, BrokerError> {
    debug!(
        method = %method,
        url = %url,
        body = ?body,
        auth_enabled = credentials.is_some(),
        "HTTP API request to broker"
    );

    let mut request = client.request(method.clone(), url.clone());
    if let Some(body_data) = body {
        request = request.json(body_data);
    }
    if let Some(creds) = credentials {
        request = request.basic_auth(&creds.key, Some(&creds.secret));
    }

    let response = request
        .send()
        .await
        .map_err(|source| BrokerError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(
            method = %method,
            url = %url,
            status = %status,
            error = %error_text,
            "Broker API request failed"
        );
        return Err(BrokerError::Rejected {
            status,
            body: error_text,
            endpoint: endpoint.to_string(),
        });
    }

    let text = response
        .text()
        .await
        .map_err(|source| BrokerError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

    info!(
        method = %method,
        url = %url,
        status = %status,
        response_len = text.len(),
        "Broker API request successful"
    );

    Ok(text)
}

/// `POST /api/v5/load_rebalance/{node}/start`
pub(crate) async fn start_rebalance(
    client: &HttpClient,
    credentials: Option<&ApiCredentials>,
    endpoint: &str,
    coordinator_node: &str,
    body: &StartRequest,
) -> Result<(), BrokerError> {
    let url = build_api_url(endpoint, &[coordinator_node, "start"])?;
    broker_request(client, credentials, Method::POST, endpoint, url, Some(body)).await?;
    Ok(())
}

/// `POST /api/v5/load_rebalance/{node}/stop`
pub(crate) async fn stop_rebalance(
    client: &HttpClient,
    credentials: Option<&ApiCredentials>,
    endpoint: &str,
    coordinator_node: &str,
) -> Result<(), BrokerError> {
    let url = build_api_url(endpoint, &[coordinator_node, "stop"])?;
    broker_request(
        client,
        credentials,
        Method::POST,
        endpoint,
        url,
        None::<&()>,
    )
    .await?;
    Ok(())
}

/// `GET /api/v5/load_rebalance/global_status`
pub(crate) async fn global_status(
    client: &HttpClient,
    credentials: Option<&ApiCredentials>,
    endpoint: &str,
) -> Result<GlobalStatusResponse, BrokerError> {
    let url = build_api_url(endpoint, &["global_status"])?;
    let text = broker_request(client, credentials, Method::GET, endpoint, url, None::<&()>).await?;

    serde_json::from_str(&text).map_err(|e| BrokerError::Protocol {
        endpoint: endpoint.to_string(),
        message: format!("invalid global_status body: {e}"),
    })
}
