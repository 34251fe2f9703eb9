// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `state_machine.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::REBALANCE_FINALIZER;
    use crate::crd::{InstanceKind, RebalanceSpec, RebalanceState};
    use crate::reconcilers::status::create_condition;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::jiff::Timestamp;
    use kube::api::ObjectMeta;

    const T0: &str = "2025-01-01T00:00:00+00:00";
    const T1: &str = "2025-01-01T00:05:00+00:00";

    fn rebalance(status: Option<RebalanceStatus>, finalizer: bool, deleting: bool) -> Rebalance {
        Rebalance {
            metadata: ObjectMeta {
                name: Some("rb".to_string()),
                namespace: Some("ns".to_string()),
                generation: Some(1),
                finalizers: finalizer.then(|| vec![REBALANCE_FINALIZER.to_string()]),
                deletion_timestamp: deleting.then(|| Time(Timestamp::now())),
                ..Default::default()
            },
            spec: RebalanceSpec {
                instance_name: "emqx".to_string(),
                instance_kind: InstanceKind::Emqx,
                rebalance_strategy: Default::default(),
            },
            status,
        }
    }

    fn with_phase(phase: RebalancePhase) -> Option<RebalanceStatus> {
        Some(RebalanceStatus {
            phase: Some(phase),
            observed_generation: Some(1),
            ..Default::default()
        })
    }

    fn job(node: &str) -> RebalanceState {
        RebalanceState {
            state: "evicting_conns".to_string(),
            node: node.to_string(),
            coordinator_node: node.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_for_new_objects() {
        assert_eq!(plan(&rebalance(None, false, false), REBALANCE_FINALIZER), Plan::Start);
        // Finalizer persisted, then the pass died before its status write
        assert_eq!(plan(&rebalance(None, true, false), REBALANCE_FINALIZER), Plan::Resume);
    }

    #[test]
    fn test_only_start_attaches_finalizer_first() {
        assert!(Plan::Start.attaches_finalizer_first());
        for plan in [
            Plan::Resume,
            Plan::Poll,
            Plan::Idle,
            Plan::DeleteNoop,
            Plan::ReleaseFinalizer,
            Plan::Cleanup,
        ] {
            assert!(!plan.attaches_finalizer_first(), "{plan:?}");
        }
    }

    #[test]
    fn test_adopted_records_running_job() {
        let outcome = PollOutcome {
            jobs: vec![job("emqx@10.0.0.1")],
            ..Default::default()
        };
        let transition = adopted(Some(2), outcome, T0);

        assert!(!transition.release_finalizer);
        assert_eq!(transition.requeue, Requeue::Processing);
        assert_eq!(transition.status.phase, Some(RebalancePhase::Processing));
        assert_eq!(transition.status.observed_generation, Some(2));
        assert_eq!(transition.status.rebalance_states.as_ref().map(Vec::len), Some(1));
        let processing = transition
            .status
            .condition(RebalanceConditionType::Processing)
            .unwrap();
        assert_eq!(processing.status, ConditionStatus::True);
    }

    #[test]
    fn test_plan_for_persisted_phases() {
        let processing = rebalance(with_phase(RebalancePhase::Processing), true, false);
        assert_eq!(plan(&processing, REBALANCE_FINALIZER), Plan::Poll);

        // Processing without a finalizer still polls (phase forced externally)
        let forced = rebalance(with_phase(RebalancePhase::Processing), false, false);
        assert_eq!(plan(&forced, REBALANCE_FINALIZER), Plan::Poll);

        let completed = rebalance(with_phase(RebalancePhase::Completed), true, false);
        assert_eq!(plan(&completed, REBALANCE_FINALIZER), Plan::Idle);

        let failed = rebalance(with_phase(RebalancePhase::Failed), false, false);
        assert_eq!(plan(&failed, REBALANCE_FINALIZER), Plan::Idle);
    }

    #[test]
    fn test_plan_restarts_on_generation_change() {
        let mut rb = rebalance(with_phase(RebalancePhase::Failed), false, false);
        rb.metadata.generation = Some(2);
        assert_eq!(plan(&rb, REBALANCE_FINALIZER), Plan::Start);

        // Unknown observed generation is not treated as a change
        rb.status.as_mut().unwrap().observed_generation = None;
        assert_eq!(plan(&rb, REBALANCE_FINALIZER), Plan::Idle);
    }

    #[test]
    fn test_plan_deletion_is_checked_first() {
        let gone = rebalance(with_phase(RebalancePhase::Processing), false, true);
        assert_eq!(plan(&gone, REBALANCE_FINALIZER), Plan::DeleteNoop);

        let processing = rebalance(with_phase(RebalancePhase::Processing), true, true);
        assert_eq!(plan(&processing, REBALANCE_FINALIZER), Plan::Cleanup);

        let uninitialized = rebalance(None, true, true);
        assert_eq!(plan(&uninitialized, REBALANCE_FINALIZER), Plan::Cleanup);

        let completed = rebalance(with_phase(RebalancePhase::Completed), true, true);
        assert_eq!(plan(&completed, REBALANCE_FINALIZER), Plan::ReleaseFinalizer);
    }

    #[test]
    fn test_started_keeps_finalizer_and_resets_conditions() {
        let transition = started(Some(3), T0);

        assert!(!transition.release_finalizer);
        assert_eq!(transition.requeue, Requeue::Processing);
        assert_eq!(transition.status.phase, Some(RebalancePhase::Processing));
        assert_eq!(transition.status.started_time.as_deref(), Some(T0));
        assert_eq!(transition.status.observed_generation, Some(3));
        assert!(transition.status.rebalance_states.is_none());
        assert_eq!(transition.status.conditions.len(), 1);
        assert!(transition
            .status
            .is_condition_true(RebalanceConditionType::Processing));
    }

    #[test]
    fn test_start_failed_is_terminal_without_finalizer() {
        let message = "Failed to start rebalance: request api failed: 400 Bad Request";
        let transition = start_failed(Some(1), message, T0);

        assert!(transition.release_finalizer);
        assert_eq!(transition.requeue, Requeue::Drift);
        assert_eq!(transition.status.phase, Some(RebalancePhase::Failed));
        assert!(transition.status.rebalance_states.is_none());

        let condition = transition
            .status
            .condition(RebalanceConditionType::Failed)
            .unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.message, message);
        assert_eq!(transition.status.conditions.len(), 1);
    }

    #[test]
    fn test_polled_active_keeps_conditions() {
        let current = started(Some(1), T0).status;
        let outcome = PollOutcome {
            jobs: vec![job("emqx@10.0.0.1")],
            unreachable: vec![],
        };

        let transition = polled(&current, outcome, T1);

        assert_eq!(transition.requeue, Requeue::Processing);
        assert_eq!(transition.status.phase, Some(RebalancePhase::Processing));
        assert_eq!(transition.status.conditions, current.conditions);
        assert_eq!(
            transition.status.rebalance_states,
            Some(vec![job("emqx@10.0.0.1")])
        );
        assert_eq!(transition.status.started_time.as_deref(), Some(T0));
    }

    #[test]
    fn test_polled_inactive_completes() {
        let mut current = started(Some(1), T0).status;
        current.rebalance_states = Some(vec![job("emqx@10.0.0.1")]);

        let transition = polled(&current, PollOutcome::default(), T1);

        assert_eq!(transition.requeue, Requeue::Drift);
        assert_eq!(transition.status.phase, Some(RebalancePhase::Completed));
        assert!(transition.status.rebalance_states.is_none());
        assert_eq!(transition.status.completed_time.as_deref(), Some(T1));
        assert!(transition
            .status
            .is_condition_true(RebalanceConditionType::Completed));
        assert!(!transition
            .status
            .is_condition_true(RebalanceConditionType::Processing));
        // Processing keeps its place ahead of Completed
        assert_eq!(
            transition.status.conditions[0].r#type,
            RebalanceConditionType::Processing
        );
        assert_eq!(
            transition.status.conditions[1].message,
            MESSAGE_REBALANCE_COMPLETED
        );
    }

    #[test]
    fn test_completed_from_forced_processing_with_stale_failed() {
        let current = RebalanceStatus {
            phase: Some(RebalancePhase::Processing),
            conditions: vec![create_condition(
                RebalanceConditionType::Failed,
                ConditionStatus::True,
                "old failure",
                T0,
            )],
            ..Default::default()
        };

        let status = completed(&current, T1).status;

        assert!(status.is_condition_true(RebalanceConditionType::Completed));
        assert!(!status.is_condition_true(RebalanceConditionType::Failed));
    }

    #[test]
    fn test_poll_failed_flips_processing() {
        let current = started(Some(1), T0).status;
        let transition = poll_failed(&current, "EMQX emqx is not found", T1);

        assert_eq!(transition.status.phase, Some(RebalancePhase::Failed));
        assert!(transition
            .status
            .is_condition_true(RebalanceConditionType::Failed));
        assert!(!transition
            .status
            .is_condition_true(RebalanceConditionType::Processing));
        assert!(!transition
            .status
            .is_condition_true(RebalanceConditionType::Completed));
    }

    #[test]
    fn test_idle_is_unchanged() {
        let current = completed(&started(Some(1), T0).status, T1).status;
        let transition = idle(&current);

        assert_eq!(transition.status, current);
        assert!(!transition.release_finalizer);
        assert_eq!(transition.requeue, Requeue::Drift);
    }
}
