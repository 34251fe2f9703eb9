// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Errors returned by the broker management API client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::reconcilers::retry::is_retryable_http_status;

/// Failure of a management API call.
///
/// The `Display` form of [`BrokerError::Rejected`] is what ends up in user-facing
/// condition messages, so it is kept short and stable:
/// `request api failed: 400 Bad Request`.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The broker answered with a non-2xx status.
    #[error("request api failed: {status}")]
    Rejected {
        /// HTTP status returned by the broker
        status: StatusCode,
        /// Raw response body, kept for logs
        body: String,
        /// Endpoint that answered
        endpoint: String,
    },

    /// The cluster has no running node to address.
    #[error("request api failed: no running broker nodes")]
    NoEligibleNodes,

    /// The request never got an HTTP answer (connect, timeout, reset).
    #[error("failed to reach broker at {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The broker answered 2xx with a body we could not understand.
    #[error("unexpected response from broker at {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    /// The endpoint could not be turned into a request URL.
    #[error("invalid broker endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

impl BrokerError {
    /// Whether the call is worth repeating later without user action.
    ///
    /// Transport failures and transient gateway answers (429, 5xx gateway codes)
    /// are retryable; everything else is a definitive answer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rejected { status, .. } => {
                is_retryable_http_status(*status) && *status != StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NoEligibleNodes | Self::Protocol { .. } | Self::InvalidEndpoint { .. } => false,
        }
    }

    /// HTTP status code, if the broker answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// `true` when a stop call hit a job that is no longer running.
    #[must_use]
    pub fn is_not_running(&self) -> bool {
        match self {
            Self::Rejected { status, body, .. } => {
                *status == StatusCode::NOT_FOUND
                    || (*status == StatusCode::BAD_REQUEST && {
                        let body = body.to_ascii_lowercase();
                        body.contains("not_started") || body.contains("not started")
                    })
            }
            _ => false,
        }
    }
}
