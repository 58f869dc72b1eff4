use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use escalation::{ContainState, ProcessTable};
use tracing::debug;

use crate::HookKind;

/// Per-syscall-class deny verdict, mirrored by the kernel hook programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Permit,
    Deny,
}

#[derive(Debug, Default, Clone)]
pub struct GateStats {
    pub decisions: u64,
    pub denials: u64,
}

/// Userspace view of the enforcement policy the kernel hooks apply. The
/// decision is a containment-state lookup against per-kind deny floors:
/// connect and file_open are refused from ISOLATED up, setuid from PRESSURE
/// up. Untracked pids and whitelisted pids always pass, so a wedged agent
/// degrades to observe-only instead of bricking the host.
pub struct EnforcementGate {
    table: Arc<ProcessTable>,
    whitelist: RwLock<HashSet<u32>>,
    decisions: AtomicU64,
    denials: AtomicU64,
}

impl EnforcementGate {
    pub fn new(table: Arc<ProcessTable>) -> Self {
        let gate = Self {
            table,
            whitelist: RwLock::new(HashSet::new()),
            decisions: AtomicU64::new(0),
            denials: AtomicU64::new(0),
        };
        // The agent must never contain itself.
        gate.whitelist_pid(std::process::id());
        gate
    }

    pub fn whitelist_pid(&self, pid: u32) {
        self.whitelist
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pid);
    }

    pub fn is_whitelisted(&self, pid: u32) -> bool {
        self.whitelist
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&pid)
    }

    /// Deny floor for a syscall class: the lowest containment state at which
    /// the class is refused.
    pub fn deny_floor(kind: HookKind) -> ContainState {
        match kind {
            HookKind::Connect | HookKind::FileOpen => ContainState::Isolated,
            HookKind::SetUid => ContainState::Pressure,
        }
    }

    pub fn decide(&self, kind: HookKind, pid: u32) -> Verdict {
        self.decisions.fetch_add(1, Ordering::Relaxed);

        if self.is_whitelisted(pid) {
            return Verdict::Permit;
        }

        let verdict = match self.table.state_of(pid) {
            Some(state) if state >= Self::deny_floor(kind) => Verdict::Deny,
            // Unknown pids are permitted: enforcement only binds processes
            // the escalation engine has placed under containment.
            _ => Verdict::Permit,
        };

        if verdict == Verdict::Deny {
            self.denials.fetch_add(1, Ordering::Relaxed);
            debug!(pid, kind = kind.name(), "syscall denied by containment state");
        }

        verdict
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            decisions: self.decisions.load(Ordering::Relaxed),
            denials: self.denials.load(Ordering::Relaxed),
        }
    }
}
