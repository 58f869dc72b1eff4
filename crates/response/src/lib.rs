//! Process-level containment side effects: mapping state transitions to
//! signals and delivering them with protected-process guardrails.

mod actuator;
mod errors;
mod signal;

use std::collections::HashSet;

pub use actuator::{action_for_transition, ActionReport, ContainAction, ResponseActuator};
pub use errors::{ResponseError, ResponseResult};
pub use signal::{NixSignalSender, ProcessIntrospector, ProcfsIntrospector, Signal, SignalSender};

/// Processes the actuator refuses to signal no matter what the escalation
/// engine decides.
#[derive(Debug, Clone)]
pub struct ProtectedList {
    process_names: HashSet<String>,
}

impl ProtectedList {
    pub fn default_linux() -> Self {
        let process_names = [
            "systemd",
            "init",
            "sshd",
            "dbus-daemon",
            "journald",
            "reflex-agent",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self { process_names }
    }

    pub fn with_names(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            process_names: names.into_iter().collect(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>) {
        self.process_names.insert(name.into());
    }

    pub fn is_protected_process(&self, process_name: &str) -> bool {
        self.process_names.contains(process_name)
    }
}

#[cfg(test)]
mod tests;
