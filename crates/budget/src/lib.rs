//! Token-bucket governor bounding how many costly containment actions the
//! agent may take per unit time. A noisy detector must not be able to turn
//! the agent into its own denial-of-service.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_CAPACITY: u64 = 100;
pub const DEFAULT_REFILL_PERIOD: Duration = Duration::from_secs(60);

/// Per-tier transition costs. Tiers are the numeric containment state values
/// (0 = normal .. 5 = terminated). Terminal actions cost substantially more
/// than early-warning ones.
#[derive(Debug, Clone)]
pub struct StateCostTable {
    costs: [u64; 6],
}

impl Default for StateCostTable {
    fn default() -> Self {
        Self {
            costs: [0, 1, 5, 10, 20, 50],
        }
    }
}

impl StateCostTable {
    pub fn new(costs: [u64; 6]) -> Self {
        Self { costs }
    }

    pub fn cost_for_tier(&self, tier: u8) -> u64 {
        let idx = (tier as usize).min(self.costs.len() - 1);
        self.costs[idx]
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// Token bucket with whole-bucket refill each period and all-or-nothing
/// consumption. Safe for concurrent use from workers and the operator
/// channel.
#[derive(Debug)]
pub struct Bucket {
    capacity: u64,
    refill_period: Duration,
    costs: StateCostTable,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(capacity: u64, refill_period: Duration) -> Self {
        Self::with_costs(capacity, refill_period, StateCostTable::default())
    }

    pub fn with_costs(capacity: u64, refill_period: Duration, costs: StateCostTable) -> Self {
        Self {
            capacity,
            refill_period,
            costs,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Atomically consume `n` tokens. Either the full amount is debited or
    /// the bucket is left untouched and `false` is returned.
    pub fn consume(&self, n: u64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::refill_if_due(&mut state, self.capacity, self.refill_period);
        if state.tokens < n {
            debug!(requested = n, remaining = state.tokens, "budget denied");
            return false;
        }
        state.tokens -= n;
        true
    }

    /// Consume the configured cost for a transition into the given tier.
    pub fn consume_for_tier(&self, tier: u8) -> bool {
        self.consume(self.costs.cost_for_tier(tier))
    }

    /// Whether the configured cost for the given tier could be paid right
    /// now, without debiting anything.
    pub fn can_afford_tier(&self, tier: u8) -> bool {
        self.costs.cost_for_tier(tier) <= self.remaining()
    }

    pub fn cost_for_tier(&self, tier: u8) -> u64 {
        self.costs.cost_for_tier(tier)
    }

    pub fn remaining(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::refill_if_due(&mut state, self.capacity, self.refill_period);
        state.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn refill_if_due(state: &mut BucketState, capacity: u64, period: Duration) {
        if period.is_zero() {
            return;
        }
        let elapsed = state.last_refill.elapsed();
        if elapsed >= period {
            state.tokens = capacity;
            state.last_refill = Instant::now();
            debug!(capacity, "budget refilled");
        }
    }
}

#[cfg(test)]
mod tests;
