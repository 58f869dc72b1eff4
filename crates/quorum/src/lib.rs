//! Cross-node corroboration store.
//!
//! Nodes that independently flag the same process binary report into this
//! store. Reports from the same node replace each other, so quorum size is a
//! count of distinct observers, never of raw report volume. Entries expire
//! on a TTL independent of report frequency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_QUORUM_MIN: usize = 2;
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct NodeReport {
    score: f64,
    recorded_at: Instant,
}

/// TTL'd, per-node-deduplicated record of which nodes have flagged which
/// process binary identity. Safe for concurrent use.
#[derive(Debug)]
pub struct QuorumStore {
    quorum_min: usize,
    ttl: Duration,
    reports: Mutex<HashMap<String, HashMap<String, NodeReport>>>,
}

impl QuorumStore {
    pub fn new(quorum_min: usize, ttl: Duration) -> Self {
        Self {
            quorum_min: quorum_min.max(1),
            ttl,
            reports: Mutex::new(HashMap::new()),
        }
    }

    /// Upsert the calling node's latest report for a binary identity. A
    /// newer report from the same node replaces the older one.
    pub fn record(&self, identity: &str, node: &str, score: f64) {
        self.record_at(identity, node, score, Instant::now());
    }

    fn record_at(&self, identity: &str, node: &str, score: f64, now: Instant) {
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let per_node = reports.entry(identity.to_string()).or_default();
        per_node.insert(
            node.to_string(),
            NodeReport {
                score,
                recorded_at: now,
            },
        );
        debug!(identity, node, score, nodes = per_node.len(), "quorum report recorded");
    }

    /// Corroboration signal in [0, 1] for a binary identity.
    ///
    /// Returns 0 below the minimum distinct-node count. At or above it, the
    /// signal grows sub-linearly with the observer count:
    /// `min(1, ln(1+n) / ln(1+quorum_min))`, so a handful of extra reports
    /// cannot dominate severity.
    pub fn signal(&self, identity: &str) -> f64 {
        self.signal_at(identity, Instant::now())
    }

    fn signal_at(&self, identity: &str, now: Instant) -> f64 {
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let Some(per_node) = reports.get(identity) else {
            return 0.0;
        };
        let live = per_node
            .values()
            .filter(|r| now.duration_since(r.recorded_at) < self.ttl)
            .count();
        if live < self.quorum_min {
            return 0.0;
        }
        let boosted = ((1 + live) as f64).ln() / ((1 + self.quorum_min) as f64).ln();
        boosted.min(1.0)
    }

    /// Mean reported score across live observers, for diagnostics.
    pub fn mean_score(&self, identity: &str) -> Option<f64> {
        let now = Instant::now();
        let reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        let per_node = reports.get(identity)?;
        let live: Vec<f64> = per_node
            .values()
            .filter(|r| now.duration_since(r.recorded_at) < self.ttl)
            .map(|r| r.score)
            .collect();
        if live.is_empty() {
            return None;
        }
        Some(live.iter().sum::<f64>() / live.len() as f64)
    }

    /// Drop expired reports and identities with no live reports left.
    /// Returns the number of identities removed outright.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        for per_node in reports.values_mut() {
            per_node.retain(|_, r| now.duration_since(r.recorded_at) < self.ttl);
        }
        let before = reports.len();
        reports.retain(|_, per_node| !per_node.is_empty());
        before - reports.len()
    }

    pub fn tracked_identities(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
