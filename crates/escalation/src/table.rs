use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::errors::{EscalationError, EscalationResult};
use crate::state::ContainState;

/// Per-process tracking record. The `state` field is the authoritative copy;
/// the kernel-shared table holds a read-only mirror of it.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub state: ContainState,
    pub pinned: Option<ContainState>,
    pub pressure: f64,
    pub last_transition_ns: u64,
    pub last_event_ns: u64,
}

impl ProcessEntry {
    fn new(pid: u32, now_ns: u64) -> Self {
        Self {
            pid,
            state: ContainState::Normal,
            pinned: None,
            pressure: 0.0,
            last_transition_ns: now_ns,
            last_event_ns: now_ns,
        }
    }
}

/// Snapshot returned to the operator channel.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub pid: u32,
    pub state: ContainState,
    pub pinned: Option<ContainState>,
    pub pressure: f64,
    pub last_transition_ns: u64,
}

impl From<&ProcessEntry> for ProcessStatus {
    fn from(entry: &ProcessEntry) -> Self {
        Self {
            pid: entry.pid,
            state: entry.state,
            pinned: entry.pinned,
            pressure: entry.pressure,
            last_transition_ns: entry.last_transition_ns,
        }
    }
}

/// Tracked-process table: read-heavy from scoring workers, occasional writes
/// from the escalation engine and the operator channel. Escalation here is a
/// guarded setter — monotonicity is enforced by the table, not by caller
/// discipline.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: RwLock<HashMap<u32, ProcessEntry>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed event for a pid, creating the entry on first
    /// sight. Returns the current state.
    pub fn observe(&self, pid: u32, now_ns: u64) -> ContainState {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry(pid)
            .or_insert_with(|| ProcessEntry::new(pid, now_ns));
        entry.last_event_ns = entry.last_event_ns.max(now_ns);
        entry.state
    }

    pub fn update_pressure(&self, pid: u32, pressure: f64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&pid) {
            entry.pressure = pressure;
        }
    }

    /// Raise a pid's state. Fails (and changes nothing) unless
    /// `target > current`; pinned pids are exempt from automatic
    /// transitions.
    pub fn escalate(
        &self,
        pid: u32,
        target: ContainState,
        now_ns: u64,
    ) -> EscalationResult<(ContainState, ContainState)> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&pid).ok_or(EscalationError::NotTracked(pid))?;
        if entry.pinned.is_some() {
            return Err(EscalationError::Pinned(pid));
        }
        if target <= entry.state {
            return Err(EscalationError::NonMonotonic {
                current: entry.state,
                target,
            });
        }
        let from = entry.state;
        entry.state = target;
        entry.last_transition_ns = now_ns;
        Ok((from, target))
    }

    /// Lower a pid's state by exactly one tier. Only the userspace decay
    /// path calls this; the kernel side never downgrades. Gated by a
    /// cooldown since the last transition or event, whichever is later.
    pub fn decay(
        &self,
        pid: u32,
        cooldown_ns: u64,
        now_ns: u64,
    ) -> EscalationResult<(ContainState, ContainState)> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&pid).ok_or(EscalationError::NotTracked(pid))?;
        if entry.state.is_terminal() {
            return Err(EscalationError::DecayFromTerminated);
        }
        if entry.pinned.is_some() {
            return Err(EscalationError::Pinned(pid));
        }
        let quiescent_since = entry.last_transition_ns.max(entry.last_event_ns);
        let elapsed = now_ns.saturating_sub(quiescent_since);
        if elapsed < cooldown_ns {
            return Err(EscalationError::CooldownActive {
                remaining_ns: cooldown_ns - elapsed,
            });
        }
        let from = entry.state;
        let to = from.one_tier_down().ok_or(EscalationError::AtFloor)?;
        entry.state = to;
        entry.last_transition_ns = now_ns;
        Ok((from, to))
    }

    /// Operator: force NORMAL, zero pressure, unpin. Returns the previous
    /// state.
    pub fn reset(&self, pid: u32, now_ns: u64) -> EscalationResult<ContainState> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&pid).ok_or(EscalationError::NotTracked(pid))?;
        let prev = entry.state;
        entry.state = ContainState::Normal;
        entry.pinned = None;
        entry.pressure = 0.0;
        entry.last_transition_ns = now_ns;
        Ok(prev)
    }

    /// Operator: force and lock a state, exempting the pid from automatic
    /// escalation and decay until unpinned. Creates the entry if the pid is
    /// not yet tracked.
    pub fn pin(&self, pid: u32, state: ContainState, now_ns: u64) -> ContainState {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .entry(pid)
            .or_insert_with(|| ProcessEntry::new(pid, now_ns));
        let prev = entry.state;
        entry.state = state;
        entry.pinned = Some(state);
        entry.last_transition_ns = now_ns;
        prev
    }

    pub fn unpin(&self, pid: u32) -> EscalationResult<ContainState> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(&pid).ok_or(EscalationError::NotTracked(pid))?;
        entry.pinned = None;
        Ok(entry.state)
    }

    pub fn status(&self, pid: u32) -> EscalationResult<ProcessStatus> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&pid)
            .map(ProcessStatus::from)
            .ok_or(EscalationError::NotTracked(pid))
    }

    pub fn list(&self) -> Vec<u32> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut pids: Vec<u32> = entries.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Pids eligible for a decay attempt: above NORMAL, not pinned, not
    /// terminated.
    pub fn decay_candidates(&self) -> Vec<u32> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|e| {
                e.state > ContainState::Normal && !e.state.is_terminal() && e.pinned.is_none()
            })
            .map(|e| e.pid)
            .collect()
    }

    /// Drop a pid on process exit.
    pub fn remove(&self, pid: u32) -> Option<ProcessStatus> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&pid).map(|e| ProcessStatus::from(&e))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_of(&self, pid: u32) -> Option<ContainState> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&pid).map(|e| e.state)
    }
}
