use super::*;

const NOW: u64 = 1_700_000_000_000_000_000;

fn decision(pid: u32, to: u8, outcome: DecisionOutcome) -> NewDecision {
    NewDecision {
        pid,
        state_from: 0,
        state_to: to,
        severity: 3.5,
        inputs: Some(SignalInputs {
            anomaly: 3.0,
            quorum: 0.5,
            integrity: 0.0,
            pressure: 1.0,
        }),
        outcome,
        node_id: "node-a".to_string(),
        ts_unix_ns: NOW,
    }
}

#[test]
fn memory_ledger_chains_from_genesis() {
    let ledger = MemoryLedger::new();
    let first = ledger.append(decision(1, 2, DecisionOutcome::Applied)).unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.parent_hash, GENESIS_HASH);

    let second = ledger.append(decision(2, 3, DecisionOutcome::Applied)).unwrap();
    assert_eq!(second.seq, 2);
    assert_eq!(second.parent_hash, first.hash);
    assert_eq!(ledger.verify_chain().unwrap(), 2);
}

#[test]
fn mutated_entry_breaks_verification() {
    let ledger = MemoryLedger::new();
    ledger.append(decision(1, 2, DecisionOutcome::Applied)).unwrap();
    ledger.append(decision(2, 3, DecisionOutcome::Applied)).unwrap();

    let mut records = ledger.entries().unwrap();
    records[0].severity = 99.0;
    let err = super::ledger_verify_for_tests(&records).unwrap_err();
    assert!(matches!(err, LedgerError::ChainBroken { seq: 1, .. }));
}

#[test]
fn reordered_parent_breaks_verification() {
    let ledger = MemoryLedger::new();
    ledger.append(decision(1, 2, DecisionOutcome::Applied)).unwrap();
    ledger.append(decision(2, 3, DecisionOutcome::Applied)).unwrap();
    ledger.append(decision(3, 4, DecisionOutcome::Applied)).unwrap();

    let mut records = ledger.entries().unwrap();
    records.swap(1, 2);
    assert!(super::ledger_verify_for_tests(&records).is_err());
}

#[test]
fn abort_entries_are_chained_like_applied_ones() {
    let ledger = MemoryLedger::new();
    ledger.append(decision(1, 2, DecisionOutcome::Applied)).unwrap();
    ledger
        .append(decision(
            1,
            0,
            DecisionOutcome::Aborted {
                reason: "anomaly is not finite: NaN".to_string(),
            },
        ))
        .unwrap();
    assert_eq!(ledger.verify_chain().unwrap(), 2);
}

#[test]
fn sqlite_ledger_persists_and_verifies_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let ledger = SqliteLedger::open(&path).unwrap();
        ledger.append(decision(1, 2, DecisionOutcome::Applied)).unwrap();
        ledger.append(decision(2, 5, DecisionOutcome::Applied)).unwrap();
    }

    let reopened = SqliteLedger::open(&path).unwrap();
    assert_eq!(reopened.len().unwrap(), 2);
    assert_eq!(reopened.verify_chain().unwrap(), 2);

    let third = reopened
        .append(decision(3, 1, DecisionOutcome::Decayed))
        .unwrap();
    assert_eq!(third.seq, 3);
    assert_eq!(reopened.verify_chain().unwrap(), 3);
}

#[test]
fn sqlite_prune_drops_old_entries_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let ledger = SqliteLedger::open(&path).unwrap();

    let old = NewDecision {
        ts_unix_ns: 1_000,
        ..decision(1, 2, DecisionOutcome::Applied)
    };
    ledger.append(old).unwrap();
    ledger.append(decision(2, 3, DecisionOutcome::Applied)).unwrap();

    let deleted = ledger.prune_older_than(30, NOW).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(ledger.len().unwrap(), 1);
    // Chain still verifies from the earliest retained entry.
    assert_eq!(ledger.verify_chain().unwrap(), 1);
}
