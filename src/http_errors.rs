// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error code mapping to broker failure reasons.
//!
//! Broker management API answers are classified into the reasons from
//! [`crate::status_reasons`] so log lines and metrics stay consistent.
//!
//! # Usage
//!
//! ```rust
//! use rebalancer::http_errors::map_http_error_to_reason;
//!
//! let (reason, _message) = map_http_error_to_reason(400);
//! assert_eq!(reason, "BrokerBadRequest");
//!
//! let (reason, _message) = map_http_error_to_reason(503);
//! assert_eq!(reason, "BrokerUnavailable");
//! ```

use crate::broker::BrokerError;
use crate::status_reasons::{
    REASON_BROKER_AUTH_FAILED, REASON_BROKER_BAD_REQUEST, REASON_BROKER_INTERNAL_ERROR,
    REASON_BROKER_NOT_FOUND, REASON_BROKER_UNAVAILABLE, REASON_BROKER_UNREACHABLE,
};

/// Map HTTP status code to a reason and an operator-facing explanation.
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Reason | Meaning |
/// |-----------|--------|---------|
/// | 400 | `BrokerBadRequest` | Invalid request or nothing to rebalance |
/// | 401 | `BrokerAuthFailed` | API key missing or wrong |
/// | 403 | `BrokerAuthFailed` | API key lacks permission |
/// | 404 | `BrokerNotFound` | Unknown node or job |
/// | 500 | `BrokerInternalError` | Broker crashed handling the call |
/// | 429, 502, 503, 504 | `BrokerUnavailable` | Transient, retried |
/// | Other | `BrokerUnreachable` | Unexpected error |
#[must_use]
pub fn map_http_error_to_reason(status_code: u16) -> (&'static str, String) {
    match status_code {
        400 => (
            REASON_BROKER_BAD_REQUEST,
            "Invalid request to broker management API (400)".into(),
        ),
        401 => (
            REASON_BROKER_AUTH_FAILED,
            "Broker authentication required (401)".into(),
        ),
        403 => (
            REASON_BROKER_AUTH_FAILED,
            "Broker authorization failed (403)".into(),
        ),
        404 => (
            REASON_BROKER_NOT_FOUND,
            "Node or rebalance job not found on broker (404)".into(),
        ),
        500 => (
            REASON_BROKER_INTERNAL_ERROR,
            "Broker management API internal error (500)".into(),
        ),
        429 => (
            REASON_BROKER_UNAVAILABLE,
            "Broker is rate limiting requests (429)".into(),
        ),
        502 => (
            REASON_BROKER_UNAVAILABLE,
            "Bad gateway reaching broker (502)".into(),
        ),
        503 => (
            REASON_BROKER_UNAVAILABLE,
            "Broker service unavailable (503)".into(),
        ),
        504 => (
            REASON_BROKER_UNAVAILABLE,
            "Gateway timeout reaching broker (504)".into(),
        ),
        _ => (
            REASON_BROKER_UNREACHABLE,
            format!("Unexpected HTTP error from broker ({status_code})"),
        ),
    }
}

/// Map a connection failure (no HTTP status at all) to a reason and message.
///
/// # Common Causes
///
/// - Broker pod not running or not yet listening on the management port
/// - Network policy blocking traffic
/// - Wrong management port configured
#[must_use]
pub fn map_connection_error() -> (&'static str, String) {
    (
        REASON_BROKER_UNREACHABLE,
        "Cannot connect to broker management API".into(),
    )
}

/// Reason for any [`BrokerError`].
#[must_use]
pub fn broker_error_reason(err: &BrokerError) -> &'static str {
    match err {
        BrokerError::Rejected { status, .. } => map_http_error_to_reason(status.as_u16()).0,
        BrokerError::NoEligibleNodes => REASON_BROKER_BAD_REQUEST,
        BrokerError::Transport { .. } => map_connection_error().0,
        BrokerError::Protocol { .. } => REASON_BROKER_INTERNAL_ERROR,
        BrokerError::InvalidEndpoint { .. } => REASON_BROKER_UNREACHABLE,
    }
}
