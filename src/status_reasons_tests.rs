// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_reasons` module

#[cfg(test)]
mod tests {
    use crate::status_reasons::*;

    #[test]
    fn test_broker_reason_constants() {
        assert_eq!(REASON_BROKER_BAD_REQUEST, "BrokerBadRequest");
        assert_eq!(REASON_BROKER_AUTH_FAILED, "BrokerAuthFailed");
        assert_eq!(REASON_BROKER_NOT_FOUND, "BrokerNotFound");
        assert_eq!(REASON_BROKER_INTERNAL_ERROR, "BrokerInternalError");
        assert_eq!(REASON_BROKER_UNAVAILABLE, "BrokerUnavailable");
        assert_eq!(REASON_BROKER_UNREACHABLE, "BrokerUnreachable");
    }

    #[test]
    fn test_instance_not_found_message() {
        assert_eq!(
            instance_not_found_message("EMQX", "fake"),
            "EMQX fake is not found"
        );
        assert_eq!(
            instance_not_found_message("EmqxEnterprise", "ee"),
            "EmqxEnterprise ee is not found"
        );
    }

    #[test]
    fn test_start_failed_message_embeds_error_verbatim() {
        assert_eq!(
            start_failed_message("request api failed: 400 Bad Request"),
            "Failed to start rebalance: request api failed: 400 Bad Request"
        );
    }

    #[test]
    fn test_poll_failed_message() {
        assert_eq!(
            poll_failed_message("request api failed: 401 Unauthorized"),
            "Failed to get rebalance status: request api failed: 401 Unauthorized"
        );
    }

    #[test]
    fn test_invalid_strategy_message() {
        assert_eq!(
            invalid_strategy_message("connEvictRate must be >= 0, got -1"),
            "Failed to start rebalance: invalid strategy: connEvictRate must be >= 0, got -1"
        );
    }

    #[test]
    fn test_progress_messages() {
        assert_eq!(MESSAGE_REBALANCE_IN_PROGRESS, "Rebalance is in progress");
        assert_eq!(MESSAGE_REBALANCE_COMPLETED, "Rebalance is completed");
    }
}
