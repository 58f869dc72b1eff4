use serde::{Deserialize, Serialize};

use crate::state::ContainState;

/// Weights for the composite severity `S = w1·A + w2·Q + w3·I + w4·P`.
/// Config validation requires them to sum to 1 (within tolerance).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    pub anomaly: f64,
    pub quorum: f64,
    pub integrity: f64,
    pub pressure: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            anomaly: 0.4,
            quorum: 0.2,
            integrity: 0.2,
            pressure: 0.2,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.anomaly + self.quorum + self.integrity + self.pressure
    }
}

/// Ascending severity thresholds for each non-normal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub pressure: f64,
    pub isolated: f64,
    pub frozen: f64,
    pub quarantined: f64,
    pub terminated: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pressure: 1.0,
            isolated: 3.0,
            frozen: 6.0,
            quarantined: 9.0,
            terminated: 12.0,
        }
    }
}

impl Thresholds {
    pub fn ascending(&self) -> bool {
        self.pressure < self.isolated
            && self.isolated < self.frozen
            && self.frozen < self.quarantined
            && self.quarantined < self.terminated
    }
}

/// The four signals feeding a single escalation decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalInputs {
    pub anomaly: f64,
    pub quorum: f64,
    pub integrity: f64,
    pub pressure: f64,
}

pub fn compute_severity(inputs: &SignalInputs, weights: &Weights) -> f64 {
    weights.anomaly * inputs.anomaly
        + weights.quorum * inputs.quorum
        + weights.integrity * inputs.integrity
        + weights.pressure * inputs.pressure
}

pub fn target_state(severity: f64, thresholds: &Thresholds) -> ContainState {
    if severity >= thresholds.terminated {
        ContainState::Terminated
    } else if severity >= thresholds.quarantined {
        ContainState::Quarantined
    } else if severity >= thresholds.frozen {
        ContainState::Frozen
    } else if severity >= thresholds.isolated {
        ContainState::Isolated
    } else if severity >= thresholds.pressure {
        ContainState::Pressure
    } else {
        ContainState::Normal
    }
}

/// EWMA pressure update: `P ← α·P + (1-α)·A`. Smooths single-sample spikes
/// while still reacting to sustained anomalous behaviour.
pub fn ewma_pressure(alpha: f64, prev: f64, anomaly_score: f64) -> f64 {
    let a = alpha.clamp(0.0, 1.0);
    a * prev + (1.0 - a) * anomaly_score
}
