use std::time::Duration;

use super::*;

fn bucket(capacity: u64) -> Bucket {
    Bucket::new(capacity, Duration::from_secs(3600))
}

#[test]
fn consume_within_capacity_succeeds() {
    let b = bucket(10);
    assert!(b.consume(4));
    assert_eq!(b.remaining(), 6);
}

#[test]
fn consume_over_capacity_fails_without_partial_debit() {
    let b = bucket(10);
    assert!(b.consume(8));
    assert!(!b.consume(5));
    assert_eq!(b.remaining(), 2);
}

#[test]
fn consume_for_tier_debits_configured_cost() {
    let b = bucket(100);
    assert!(b.consume_for_tier(2));
    assert_eq!(b.remaining(), 95);
    assert!(b.consume_for_tier(5));
    assert_eq!(b.remaining(), 45);
}

#[test]
fn terminal_tiers_cost_more_than_early_tiers() {
    let costs = StateCostTable::default();
    assert!(costs.cost_for_tier(5) > costs.cost_for_tier(2));
    assert!(costs.cost_for_tier(2) > costs.cost_for_tier(1));
}

#[test]
fn tier_out_of_range_clamps_to_last_cost() {
    let costs = StateCostTable::default();
    assert_eq!(costs.cost_for_tier(9), costs.cost_for_tier(5));
}

#[test]
fn refill_restores_full_capacity() {
    let b = Bucket::new(10, Duration::from_millis(10));
    assert!(b.consume(10));
    assert_eq!(b.remaining(), 0);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(b.remaining(), 10);
}

#[test]
fn can_afford_does_not_debit() {
    let b = bucket(100);
    assert!(b.can_afford_tier(5));
    assert_eq!(b.remaining(), 100);
}
