use std::collections::HashSet;

use escalation::ContainState;
use tracing::{info, warn};

use crate::errors::{ResponseError, ResponseResult};
use crate::signal::{ProcessIntrospector, Signal, SignalSender};
use crate::ProtectedList;

/// Terminal-tier side effect of a containment transition. PRESSURE and
/// ISOLATED have no process-level action; they are enforced per-syscall by
/// the kernel gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainAction {
    None,
    Suspend,
    Resume,
    KillTree,
}

/// Map a state transition to the signal action it requires.
pub fn action_for_transition(from: ContainState, to: ContainState) -> ContainAction {
    if to == ContainState::Terminated {
        return ContainAction::KillTree;
    }
    if to >= ContainState::Frozen && from < ContainState::Frozen {
        return ContainAction::Suspend;
    }
    if from >= ContainState::Frozen && to < ContainState::Frozen {
        return ContainAction::Resume;
    }
    ContainAction::None
}

#[derive(Debug, Clone)]
pub struct ActionReport {
    pub pid: u32,
    pub action: ContainAction,
    pub signalled_pids: Vec<u32>,
    pub skipped_protected_pids: Vec<u32>,
}

/// Applies containment side effects to live processes. Protected processes
/// are never signalled; `dry_run` logs the intent without sending anything.
pub struct ResponseActuator {
    protected: ProtectedList,
    introspector: Box<dyn ProcessIntrospector + Send + Sync>,
    sender: Box<dyn SignalSender + Send + Sync>,
    dry_run: bool,
}

impl ResponseActuator {
    pub fn new(
        protected: ProtectedList,
        introspector: Box<dyn ProcessIntrospector + Send + Sync>,
        sender: Box<dyn SignalSender + Send + Sync>,
        dry_run: bool,
    ) -> Self {
        Self {
            protected,
            introspector,
            sender,
            dry_run,
        }
    }

    pub fn apply(
        &self,
        pid: u32,
        from: ContainState,
        to: ContainState,
    ) -> ResponseResult<ActionReport> {
        let action = action_for_transition(from, to);
        match action {
            ContainAction::None => Ok(ActionReport {
                pid,
                action,
                signalled_pids: Vec::new(),
                skipped_protected_pids: Vec::new(),
            }),
            ContainAction::Suspend => self.signal_one(pid, action, Signal::SIGSTOP),
            ContainAction::Resume => self.signal_one(pid, action, Signal::SIGCONT),
            ContainAction::KillTree => self.kill_tree(pid),
        }
    }

    /// Thaw a suspended process, used on operator reset and agent shutdown.
    pub fn thaw(&self, pid: u32) -> ResponseResult<ActionReport> {
        self.signal_one(pid, ContainAction::Resume, Signal::SIGCONT)
    }

    fn signal_one(
        &self,
        pid: u32,
        action: ContainAction,
        signal: Signal,
    ) -> ResponseResult<ActionReport> {
        if pid == 0 {
            return Err(ResponseError::InvalidInput(
                "pid must be greater than zero".to_string(),
            ));
        }
        if self.is_pid_protected(pid) {
            return Err(ResponseError::ProtectedProcess(pid));
        }

        if self.dry_run {
            info!(pid, ?signal, "dry run, signal suppressed");
        } else {
            self.sender.send(pid, signal)?;
        }

        Ok(ActionReport {
            pid,
            action,
            signalled_pids: vec![pid],
            skipped_protected_pids: Vec::new(),
        })
    }

    /// SIGSTOP the root first so it cannot spawn replacements, kill
    /// descendants deepest-first, then the root.
    fn kill_tree(&self, pid: u32) -> ResponseResult<ActionReport> {
        if pid == 0 {
            return Err(ResponseError::InvalidInput(
                "pid must be greater than zero".to_string(),
            ));
        }
        if self.is_pid_protected(pid) {
            return Err(ResponseError::ProtectedProcess(pid));
        }

        if self.dry_run {
            info!(pid, "dry run, kill tree suppressed");
            return Ok(ActionReport {
                pid,
                action: ContainAction::KillTree,
                signalled_pids: Vec::new(),
                skipped_protected_pids: Vec::new(),
            });
        }

        let _ = self.sender.send(pid, Signal::SIGSTOP);

        let mut descendants = Vec::new();
        let mut seen = HashSet::new();
        let _ = seen.insert(pid);
        self.collect_descendants(pid, &mut descendants, &mut seen);

        let mut signalled = Vec::new();
        let mut skipped = Vec::new();

        for child in descendants.iter().rev() {
            if self.is_pid_protected(*child) {
                warn!(pid = *child, "skipping protected descendant");
                skipped.push(*child);
                continue;
            }
            let _ = self.sender.send(*child, Signal::SIGKILL);
            signalled.push(*child);
        }

        self.sender.send(pid, Signal::SIGKILL)?;
        signalled.push(pid);

        Ok(ActionReport {
            pid,
            action: ContainAction::KillTree,
            signalled_pids: signalled,
            skipped_protected_pids: skipped,
        })
    }

    fn collect_descendants(&self, pid: u32, out: &mut Vec<u32>, seen: &mut HashSet<u32>) {
        for child in self.introspector.children_of(pid) {
            if !seen.insert(child) {
                continue;
            }
            out.push(child);
            self.collect_descendants(child, out, seen);
        }
    }

    fn is_pid_protected(&self, pid: u32) -> bool {
        if pid == 1 || pid == std::process::id() {
            return true;
        }
        self.introspector
            .process_name(pid)
            .map(|name| self.protected.is_protected_process(&name))
            .unwrap_or(false)
    }
}
