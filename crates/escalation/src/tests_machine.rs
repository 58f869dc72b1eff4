use proptest::prelude::*;

use super::*;

const NOW: u64 = 1_700_000_000_000_000_000;

#[test]
fn states_are_strictly_ordered() {
    assert!(ContainState::Normal < ContainState::Pressure);
    assert!(ContainState::Pressure < ContainState::Isolated);
    assert!(ContainState::Isolated < ContainState::Frozen);
    assert!(ContainState::Frozen < ContainState::Quarantined);
    assert!(ContainState::Quarantined < ContainState::Terminated);
}

#[test]
fn byte_round_trip_and_rejection() {
    for raw in 0u8..=5 {
        let state = ContainState::from_byte(raw).unwrap();
        assert_eq!(state.as_byte(), raw);
    }
    assert!(ContainState::from_byte(6).is_none());
}

#[test]
fn state_names_parse_case_insensitively() {
    assert_eq!(ContainState::parse("isolated"), Some(ContainState::Isolated));
    assert_eq!(ContainState::parse(" FROZEN "), Some(ContainState::Frozen));
    assert_eq!(ContainState::parse("bogus"), None);
}

#[test]
fn escalate_never_reduces_state() {
    let table = ProcessTable::new();
    table.observe(7, NOW);
    table.escalate(7, ContainState::Frozen, NOW).unwrap();

    let err = table.escalate(7, ContainState::Pressure, NOW).unwrap_err();
    assert!(matches!(err, EscalationError::NonMonotonic { .. }));
    assert_eq!(table.state_of(7), Some(ContainState::Frozen));
}

#[test]
fn decay_from_terminated_always_fails() {
    let table = ProcessTable::new();
    table.observe(7, NOW);
    table.escalate(7, ContainState::Terminated, NOW).unwrap();
    let err = table.decay(7, 0, NOW + 1).unwrap_err();
    assert!(matches!(err, EscalationError::DecayFromTerminated));
    assert_eq!(table.state_of(7), Some(ContainState::Terminated));
}

#[test]
fn decay_from_isolated_yields_pressure() {
    let table = ProcessTable::new();
    table.observe(7, NOW);
    table.escalate(7, ContainState::Isolated, NOW).unwrap();
    let (from, to) = table.decay(7, 0, NOW + 1).unwrap();
    assert_eq!(from, ContainState::Isolated);
    assert_eq!(to, ContainState::Pressure);
}

#[test]
fn decay_respects_cooldown() {
    let table = ProcessTable::new();
    table.observe(7, NOW);
    table.escalate(7, ContainState::Isolated, NOW).unwrap();
    let err = table.decay(7, 1_000_000, NOW + 10).unwrap_err();
    assert!(matches!(err, EscalationError::CooldownActive { .. }));
}

#[test]
fn pinned_pid_rejects_escalation_and_decay() {
    let table = ProcessTable::new();
    table.pin(7, ContainState::Isolated, NOW);
    assert!(matches!(
        table.escalate(7, ContainState::Frozen, NOW).unwrap_err(),
        EscalationError::Pinned(7)
    ));
    assert!(matches!(
        table.decay(7, 0, NOW + 1).unwrap_err(),
        EscalationError::Pinned(7)
    ));

    table.unpin(7).unwrap();
    table.escalate(7, ContainState::Frozen, NOW + 2).unwrap();
}

#[test]
fn unknown_pid_is_not_tracked() {
    let table = ProcessTable::new();
    assert!(matches!(
        table.status(99).unwrap_err(),
        EscalationError::NotTracked(99)
    ));
}

proptest! {
    /// No sequence of escalate/decay attempts may ever observe the mirror
    /// state decrease except through the decay path, and decay moves exactly
    /// one tier.
    #[test]
    fn transitions_preserve_monotonicity(ops in proptest::collection::vec((0u8..=5, prop::bool::ANY), 1..64)) {
        let table = ProcessTable::new();
        table.observe(1, NOW);
        let mut now = NOW;
        let mut current = ContainState::Normal;

        for (raw, decay) in ops {
            now += 1;
            if decay {
                match table.decay(1, 0, now) {
                    Ok((from, to)) => {
                        prop_assert_eq!(from, current);
                        prop_assert_eq!(to.as_byte(), from.as_byte() - 1);
                        current = to;
                    }
                    Err(_) => {}
                }
            } else if let Some(target) = ContainState::from_byte(raw) {
                match table.escalate(1, target, now) {
                    Ok((from, to)) => {
                        prop_assert!(to > from);
                        prop_assert_eq!(from, current);
                        current = to;
                    }
                    Err(_) => {
                        // A rejected escalation must not move the state.
                        prop_assert_eq!(table.state_of(1), Some(current));
                    }
                }
            }
            prop_assert_eq!(table.state_of(1), Some(current));
        }
    }
}
