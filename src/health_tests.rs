// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `health.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_health_state_starts_not_ready() {
        let state = HealthState::new();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_probe_endpoints() {
        let state = Arc::new(HealthState::new());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = reqwest::Client::new();
        let base = format!("http://{addr}");

        let res = http.get(format!("{base}/healthz")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);

        let res = http.get(format!("{base}/readyz")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 503);

        state.set_ready(true);
        let res = http.get(format!("{base}/readyz")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);

        crate::metrics::record_phase_transition("Completed");
        let res = http.get(format!("{base}/metrics")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), 200);
        let body = res.text().await.unwrap();
        assert!(body.contains("rebalancer_emqx_io_phase_transitions_total"));
    }
}
