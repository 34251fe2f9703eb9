// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for http_errors module
//!
//! These tests verify HTTP error code mapping to broker failure reasons.

#[cfg(test)]
mod tests {
    use crate::broker::BrokerError;
    use crate::http_errors::*;
    use crate::status_reasons::*;
    use reqwest::StatusCode;

    // ============================================================================
    // Test HTTP 4xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_http_400_bad_request() {
        let (reason, message) = map_http_error_to_reason(400);
        assert_eq!(reason, REASON_BROKER_BAD_REQUEST);
        assert!(message.contains("400"));
        assert!(message.contains("Invalid request"));
    }

    #[test]
    fn test_map_http_401_and_403_auth() {
        let (reason, message) = map_http_error_to_reason(401);
        assert_eq!(reason, REASON_BROKER_AUTH_FAILED);
        assert!(message.contains("401"));

        let (reason, message) = map_http_error_to_reason(403);
        assert_eq!(reason, REASON_BROKER_AUTH_FAILED);
        assert!(message.contains("authorization"));
    }

    #[test]
    fn test_map_http_404_not_found() {
        let (reason, message) = map_http_error_to_reason(404);
        assert_eq!(reason, REASON_BROKER_NOT_FOUND);
        assert!(message.contains("not found"));
    }

    // ============================================================================
    // Test HTTP 5xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_http_500_internal_error() {
        let (reason, message) = map_http_error_to_reason(500);
        assert_eq!(reason, REASON_BROKER_INTERNAL_ERROR);
        assert!(message.contains("internal error"));
    }

    #[test]
    fn test_transient_codes_map_to_unavailable() {
        for code in [429, 502, 503, 504] {
            let (reason, message) = map_http_error_to_reason(code);
            assert_eq!(reason, REASON_BROKER_UNAVAILABLE, "code {code}");
            assert!(message.contains(&code.to_string()));
        }
    }

    #[test]
    fn test_map_http_unknown() {
        let (reason, message) = map_http_error_to_reason(418);
        assert_eq!(reason, REASON_BROKER_UNREACHABLE);
        assert!(message.contains("418"));
    }

    #[test]
    fn test_map_connection_error() {
        let (reason, message) = map_connection_error();
        assert_eq!(reason, REASON_BROKER_UNREACHABLE);
        assert!(message.contains("connect"));
    }

    // ============================================================================
    // Test BrokerError classification
    // ============================================================================

    #[test]
    fn test_broker_error_reason_rejected() {
        let err = BrokerError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
            endpoint: "http://10.0.0.1:18083".into(),
        };
        assert_eq!(broker_error_reason(&err), REASON_BROKER_AUTH_FAILED);
    }

    #[test]
    fn test_broker_error_reason_no_nodes() {
        assert_eq!(
            broker_error_reason(&BrokerError::NoEligibleNodes),
            REASON_BROKER_BAD_REQUEST
        );
    }

    #[test]
    fn test_broker_error_reason_protocol() {
        let err = BrokerError::Protocol {
            endpoint: "http://10.0.0.1:18083".into(),
            message: "garbage".into(),
        };
        assert_eq!(broker_error_reason(&err), REASON_BROKER_INTERNAL_ERROR);
    }
}
