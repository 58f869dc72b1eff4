use std::sync::Arc;
use std::time::Duration;

use budget::{Bucket, StateCostTable};

use super::*;

const NOW: u64 = 1_700_000_000_000_000_000;

fn anomaly_only_tunables() -> Tunables {
    Tunables {
        weights: Weights {
            anomaly: 1.0,
            quorum: 0.0,
            integrity: 0.0,
            pressure: 0.0,
        },
        thresholds: Thresholds::default(),
        pressure_alpha: 0.8,
        cooldown_ns: 0,
        bounds: InputBounds::default(),
    }
}

fn engine_with(capacity: u64, tunables: Tunables) -> EscalationEngine {
    let bucket = Arc::new(Bucket::new(capacity, Duration::from_secs(3600)));
    EscalationEngine::new("test-node", Box::new(MemoryLedger::new()), bucket, tunables)
}

#[test]
fn severity_is_weighted_sum() {
    let inputs = SignalInputs {
        anomaly: 2.0,
        quorum: 1.0,
        integrity: 0.5,
        pressure: 1.0,
    };
    let weights = Weights::default();
    let s = compute_severity(&inputs, &weights);
    assert!((s - (0.4 * 2.0 + 0.2 * 1.0 + 0.2 * 0.5 + 0.2 * 1.0)).abs() < 1e-12);
}

#[test]
fn target_state_maps_threshold_bands() {
    let t = Thresholds::default();
    assert_eq!(target_state(0.5, &t), ContainState::Normal);
    assert_eq!(target_state(1.0, &t), ContainState::Pressure);
    assert_eq!(target_state(4.2, &t), ContainState::Isolated);
    assert_eq!(target_state(7.0, &t), ContainState::Frozen);
    assert_eq!(target_state(10.0, &t), ContainState::Quarantined);
    assert_eq!(target_state(12.0, &t), ContainState::Terminated);
}

#[test]
fn ewma_pressure_smooths_spikes() {
    let p1 = ewma_pressure(0.8, 0.0, 10.0);
    assert!((p1 - 2.0).abs() < 1e-12);
    let p2 = ewma_pressure(0.8, p1, 0.0);
    assert!((p2 - 1.6).abs() < 1e-12);
}

#[test]
fn low_scores_hold_at_normal() {
    let engine = engine_with(100, anomaly_only_tunables());
    let outcome = engine.evaluate(42, 0.1, 0.0, 0.0, NOW).unwrap();
    assert!(matches!(outcome, Outcome::Held { state: ContainState::Normal, .. }));
    assert_eq!(engine.table().state_of(42), Some(ContainState::Normal));
}

#[test]
fn high_anomaly_escalates_and_ledgers() {
    let engine = engine_with(100, anomaly_only_tunables());
    let outcome = engine.evaluate(42, 4.0, 0.0, 0.0, NOW).unwrap();
    match outcome {
        Outcome::Escalated { from, to, .. } => {
            assert_eq!(from, ContainState::Normal);
            assert_eq!(to, ContainState::Isolated);
        }
        other => panic!("expected escalation, got {:?}", other),
    }
    let entries = engine.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, DecisionOutcome::Applied);
    assert_eq!(entries[0].state_to, ContainState::Isolated.as_byte());
}

#[test]
fn non_finite_anomaly_aborts_and_chains_the_abort() {
    let engine = engine_with(100, anomaly_only_tunables());
    let outcome = engine.evaluate(42, f64::NAN, 0.0, 0.0, NOW).unwrap();
    assert!(matches!(outcome, Outcome::Aborted { .. }));
    // State untouched, abort recorded.
    assert_eq!(engine.table().state_of(42), Some(ContainState::Normal));
    let entries = engine.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0].outcome, DecisionOutcome::Aborted { .. }));
    engine.ledger().verify_chain().unwrap();
}

#[test]
fn out_of_range_quorum_aborts() {
    let engine = engine_with(100, anomaly_only_tunables());
    let outcome = engine.evaluate(42, 0.5, 3.0, 0.0, NOW).unwrap();
    assert!(matches!(outcome, Outcome::Aborted { .. }));
}

#[test]
fn budget_downgrades_to_highest_affordable_tier() {
    // Tokens cover ISOLATED (5) but not TERMINATED (50).
    let bucket = Arc::new(Bucket::with_costs(
        8,
        Duration::from_secs(3600),
        StateCostTable::default(),
    ));
    let engine = EscalationEngine::new(
        "test-node",
        Box::new(MemoryLedger::new()),
        bucket,
        anomaly_only_tunables(),
    );
    let outcome = engine.evaluate(42, 20.0, 0.0, 0.0, NOW).unwrap();
    match outcome {
        Outcome::Escalated { to, downgraded_from, .. } => {
            assert_eq!(to, ContainState::Isolated);
            assert_eq!(downgraded_from, Some(ContainState::Terminated));
        }
        other => panic!("expected downgraded escalation, got {:?}", other),
    }
}

#[test]
fn exhausted_budget_defers_without_transition() {
    let bucket = Arc::new(Bucket::with_costs(
        0,
        Duration::from_secs(3600),
        StateCostTable::default(),
    ));
    let engine = EscalationEngine::new(
        "test-node",
        Box::new(MemoryLedger::new()),
        bucket,
        anomaly_only_tunables(),
    );
    let outcome = engine.evaluate(42, 20.0, 0.0, 0.0, NOW).unwrap();
    assert!(matches!(outcome, Outcome::Deferred { .. }));
    assert_eq!(engine.table().state_of(42), Some(ContainState::Normal));
    let entries = engine.ledger().entries().unwrap();
    assert!(matches!(entries[0].outcome, DecisionOutcome::Deferred { .. }));
}

#[test]
fn pinned_pid_is_exempt_from_escalation() {
    let engine = engine_with(100, anomaly_only_tunables());
    engine.operator_pin(42, ContainState::Normal, NOW).unwrap();
    let outcome = engine.evaluate(42, 20.0, 0.0, 0.0, NOW).unwrap();
    assert!(matches!(outcome, Outcome::Held { .. }));
    assert_eq!(engine.table().state_of(42), Some(ContainState::Normal));
}

#[test]
fn decay_tick_lowers_cooled_down_pids() {
    let mut tunables = anomaly_only_tunables();
    tunables.cooldown_ns = 1_000;
    let engine = engine_with(100, tunables);
    engine.evaluate(42, 4.0, 0.0, 0.0, NOW).unwrap();
    assert_eq!(engine.table().state_of(42), Some(ContainState::Isolated));

    // Too soon: nothing decays.
    assert!(engine.decay_tick(NOW + 10).unwrap().is_empty());

    let applied = engine.decay_tick(NOW + 2_000).unwrap();
    assert_eq!(applied, vec![(42, ContainState::Isolated, ContainState::Pressure)]);
    assert_eq!(engine.table().state_of(42), Some(ContainState::Pressure));
}

#[test]
fn operator_reset_returns_previous_state_and_zeroes_pressure() {
    let engine = engine_with(100, anomaly_only_tunables());
    engine.evaluate(42, 4.0, 0.0, 0.0, NOW).unwrap();
    let prev = engine.operator_reset(42, NOW + 1).unwrap();
    assert_eq!(prev, ContainState::Isolated);
    let status = engine.operator_status(42).unwrap();
    assert_eq!(status.state, ContainState::Normal);
    assert_eq!(status.pressure, 0.0);
    assert!(status.pinned.is_none());
}

#[test]
fn process_exit_drops_tracking() {
    let engine = engine_with(100, anomaly_only_tunables());
    engine.evaluate(42, 0.1, 0.0, 0.0, NOW).unwrap();
    assert!(engine.process_exit(42).is_some());
    assert!(engine.table().state_of(42).is_none());
    assert!(engine.operator_status(42).is_err());
}

#[test]
fn sustained_pressure_escalates_where_single_spike_does_not() {
    let tunables = Tunables {
        weights: Weights {
            anomaly: 0.0,
            quorum: 0.0,
            integrity: 0.0,
            pressure: 1.0,
        },
        thresholds: Thresholds::default(),
        pressure_alpha: 0.8,
        cooldown_ns: 0,
        bounds: InputBounds::default(),
    };
    let engine = engine_with(100, tunables);

    // One spike: pressure only reaches 0.2 * 10 = 2.0 -> PRESSURE at most.
    engine.evaluate(42, 10.0, 0.0, 0.0, NOW).unwrap();
    assert_eq!(engine.table().state_of(42), Some(ContainState::Pressure));

    // Sustained anomalous samples push pressure past the ISOLATED band.
    for i in 1..20 {
        engine.evaluate(42, 10.0, 0.0, 0.0, NOW + i).unwrap();
    }
    let state = engine.table().state_of(42).unwrap();
    assert!(state >= ContainState::Isolated, "state was {}", state);
}
