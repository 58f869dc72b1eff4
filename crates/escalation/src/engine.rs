use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use budget::Bucket;

use crate::errors::{EscalationError, EscalationResult};
use crate::ledger::{DecisionLedger, DecisionOutcome, NewDecision};
use crate::severity::{
    compute_severity, ewma_pressure, target_state, SignalInputs, Thresholds, Weights,
};
use crate::state::ContainState;
use crate::table::{ProcessStatus, ProcessTable};
use crate::validate::{validate_inputs, validate_severity, InputBounds, Violation};

/// Tunables the engine reads on every decision. Hot-reload swaps the whole
/// set atomically.
#[derive(Debug, Clone)]
pub struct Tunables {
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub pressure_alpha: f64,
    pub cooldown_ns: u64,
    pub bounds: InputBounds,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            pressure_alpha: 0.8,
            cooldown_ns: 30_000_000_000,
            bounds: InputBounds::default(),
        }
    }
}

/// What a single evaluation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No transition: target not above current, or the pid is pinned.
    Held { state: ContainState, severity: f64 },
    /// State raised. `downgraded_from` is set when the budget forced a
    /// cheaper target than severity alone demanded.
    Escalated {
        from: ContainState,
        to: ContainState,
        severity: f64,
        downgraded_from: Option<ContainState>,
    },
    /// Budget could not afford any tier above current; decision deferred.
    Deferred {
        current: ContainState,
        wanted: ContainState,
        severity: f64,
    },
    /// Input validation failed; the transition was aborted and the abort
    /// recorded in the decision chain.
    Aborted { violation: Violation },
}

/// The escalation engine: combines the anomaly, quorum, integrity, and
/// pressure signals into a severity, maps it onto the monotonic state
/// machine, and gates every costly transition through the budget governor.
/// Every decision — applied, deferred, or aborted — lands in the injected
/// decision ledger.
pub struct EscalationEngine {
    node_id: String,
    table: Arc<ProcessTable>,
    ledger: Box<dyn DecisionLedger>,
    bucket: Arc<Bucket>,
    tunables: RwLock<Tunables>,
}

impl EscalationEngine {
    pub fn new(
        node_id: impl Into<String>,
        ledger: Box<dyn DecisionLedger>,
        bucket: Arc<Bucket>,
        tunables: Tunables,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            table: Arc::new(ProcessTable::new()),
            ledger,
            bucket,
            tunables: RwLock::new(tunables),
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Shared handle to the state table for the enforcement gate.
    pub fn shared_table(&self) -> Arc<ProcessTable> {
        Arc::clone(&self.table)
    }

    pub fn ledger(&self) -> &dyn DecisionLedger {
        self.ledger.as_ref()
    }

    pub fn tunables(&self) -> Tunables {
        self.tunables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Atomically swap the non-destructive tunables (hot reload path).
    pub fn update_tunables(&self, tunables: Tunables) {
        let mut guard = self.tunables.write().unwrap_or_else(|e| e.into_inner());
        *guard = tunables;
        info!("escalation tunables updated");
    }

    /// Evaluate one scored sample for a pid and apply the resulting
    /// transition, if any. Pressure is folded in here: the caller supplies
    /// the instantaneous anomaly score and the per-pid EWMA lives in the
    /// process table.
    pub fn evaluate(
        &self,
        pid: u32,
        anomaly: f64,
        quorum_signal: f64,
        integrity_signal: f64,
        now_ns: u64,
    ) -> EscalationResult<Outcome> {
        let tunables = self.tunables();
        let current = self.table.observe(pid, now_ns);
        let prev_pressure = self
            .table
            .status(pid)
            .map(|s| s.pressure)
            .unwrap_or_default();
        let pressure = ewma_pressure(tunables.pressure_alpha, prev_pressure, anomaly);

        let inputs = SignalInputs {
            anomaly,
            quorum: quorum_signal,
            integrity: integrity_signal,
            pressure,
        };

        if let Err(violation) = validate_inputs(&inputs, &tunables.bounds) {
            return self.abort(pid, current, &inputs, 0.0, violation, now_ns);
        }

        let severity = compute_severity(&inputs, &tunables.weights);
        if let Err(violation) = validate_severity(severity, &tunables.bounds) {
            return self.abort(pid, current, &inputs, severity, violation, now_ns);
        }

        // Inputs are valid from here on; commit the smoothed pressure.
        self.table.update_pressure(pid, pressure);

        let wanted = target_state(severity, &tunables.thresholds);
        if wanted <= current {
            return Ok(Outcome::Held {
                state: current,
                severity,
            });
        }
        if self.table.status(pid)?.pinned.is_some() {
            return Ok(Outcome::Held {
                state: current,
                severity,
            });
        }

        // Budget gate: walk the target down to the highest affordable tier
        // still above current. The corroboration boost never bypasses the
        // governor.
        let mut target = wanted;
        while target > current && !self.bucket.can_afford_tier(target.as_byte()) {
            match target.one_tier_down() {
                Some(lower) => target = lower,
                None => break,
            }
        }
        if target <= current || !self.bucket.consume_for_tier(target.as_byte()) {
            warn!(
                pid,
                wanted = %wanted,
                remaining = self.bucket.remaining(),
                "budget exhausted; deferring escalation"
            );
            self.ledger.append(NewDecision {
                pid,
                state_from: current.as_byte(),
                state_to: current.as_byte(),
                severity,
                inputs: Some(inputs),
                outcome: DecisionOutcome::Deferred {
                    reason: format!("budget exhausted for target {}", wanted),
                },
                node_id: self.node_id.clone(),
                ts_unix_ns: now_ns,
            })?;
            return Ok(Outcome::Deferred {
                current,
                wanted,
                severity,
            });
        }

        match self.table.escalate(pid, target, now_ns) {
            Ok((from, to)) => {
                self.ledger.append(NewDecision {
                    pid,
                    state_from: from.as_byte(),
                    state_to: to.as_byte(),
                    severity,
                    inputs: Some(inputs),
                    outcome: DecisionOutcome::Applied,
                    node_id: self.node_id.clone(),
                    ts_unix_ns: now_ns,
                })?;
                info!(pid, from = %from, to = %to, severity, "process state escalated");
                Ok(Outcome::Escalated {
                    from,
                    to,
                    severity,
                    downgraded_from: (target != wanted).then_some(wanted),
                })
            }
            // Lost a race with the operator channel; hold.
            Err(EscalationError::Pinned(_)) | Err(EscalationError::NonMonotonic { .. }) => {
                Ok(Outcome::Held {
                    state: self.table.status(pid)?.state,
                    severity,
                })
            }
            Err(other) => Err(other),
        }
    }

    fn abort(
        &self,
        pid: u32,
        current: ContainState,
        inputs: &SignalInputs,
        severity: f64,
        violation: Violation,
        now_ns: u64,
    ) -> EscalationResult<Outcome> {
        warn!(pid, violation = %violation, "aborting transition on invalid inputs");
        self.ledger.append(NewDecision {
            pid,
            state_from: current.as_byte(),
            state_to: current.as_byte(),
            severity,
            inputs: Some(*inputs),
            outcome: DecisionOutcome::Aborted {
                reason: violation.to_string(),
            },
            node_id: self.node_id.clone(),
            ts_unix_ns: now_ns,
        })?;
        Ok(Outcome::Aborted { violation })
    }

    /// Userspace decay sweep: lower every cooled-down, unpinned, non-terminal
    /// pid by one tier. Returns the applied transitions so the caller can
    /// mirror them into the kernel table and thaw frozen processes.
    pub fn decay_tick(
        &self,
        now_ns: u64,
    ) -> EscalationResult<Vec<(u32, ContainState, ContainState)>> {
        let cooldown_ns = self.tunables().cooldown_ns;
        let mut applied = Vec::new();
        for pid in self.table.decay_candidates() {
            match self.table.decay(pid, cooldown_ns, now_ns) {
                Ok((from, to)) => {
                    self.ledger.append(NewDecision {
                        pid,
                        state_from: from.as_byte(),
                        state_to: to.as_byte(),
                        severity: 0.0,
                        inputs: None,
                        outcome: DecisionOutcome::Decayed,
                        node_id: self.node_id.clone(),
                        ts_unix_ns: now_ns,
                    })?;
                    info!(pid, from = %from, to = %to, "process state decayed");
                    applied.push((pid, from, to));
                }
                Err(EscalationError::CooldownActive { .. })
                | Err(EscalationError::Pinned(_))
                | Err(EscalationError::DecayFromTerminated)
                | Err(EscalationError::AtFloor)
                | Err(EscalationError::NotTracked(_)) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(applied)
    }

    // ── Operator override path ────────────────────────────────────────────

    pub fn operator_reset(&self, pid: u32, now_ns: u64) -> EscalationResult<ContainState> {
        let prev = self.table.reset(pid, now_ns)?;
        self.log_operator(pid, prev, ContainState::Normal, "reset", now_ns)?;
        Ok(prev)
    }

    pub fn operator_pin(
        &self,
        pid: u32,
        state: ContainState,
        now_ns: u64,
    ) -> EscalationResult<ContainState> {
        let prev = self.table.pin(pid, state, now_ns);
        self.log_operator(pid, prev, state, "pin", now_ns)?;
        Ok(prev)
    }

    pub fn operator_unpin(&self, pid: u32, now_ns: u64) -> EscalationResult<ContainState> {
        let state = self.table.unpin(pid)?;
        self.log_operator(pid, state, state, "unpin", now_ns)?;
        Ok(state)
    }

    pub fn operator_status(&self, pid: u32) -> EscalationResult<ProcessStatus> {
        self.table.status(pid)
    }

    pub fn operator_list(&self) -> Vec<u32> {
        self.table.list()
    }

    fn log_operator(
        &self,
        pid: u32,
        from: ContainState,
        to: ContainState,
        command: &str,
        now_ns: u64,
    ) -> EscalationResult<()> {
        self.ledger.append(NewDecision {
            pid,
            state_from: from.as_byte(),
            state_to: to.as_byte(),
            severity: 0.0,
            inputs: None,
            outcome: DecisionOutcome::Operator {
                command: command.to_string(),
            },
            node_id: self.node_id.clone(),
            ts_unix_ns: now_ns,
        })?;
        info!(pid, command, from = %from, to = %to, "operator override applied");
        Ok(())
    }

    /// Process exit: drop tracking state. The kernel-side map entry is
    /// removed by the caller.
    pub fn process_exit(&self, pid: u32) -> Option<ProcessStatus> {
        self.table.remove(pid)
    }
}
