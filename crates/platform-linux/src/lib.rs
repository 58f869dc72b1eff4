//! Linux kernel-facing layer: eBPF hook event ingestion, the userspace
//! enforcement gate, and the bounded event channel between hook context and
//! the scoring workers.

pub mod ebpf;
pub mod gate;
pub mod sink;

use std::fs;

use serde::{Deserialize, Serialize};

pub use ebpf::{HookEngine, HookError, HookStats, KernelStateMap, NoopKernelStateMap};
pub use gate::{EnforcementGate, GateStats, Verdict};
pub use sink::{BoundedEventSink, EventReceiver, SinkStats};

/// Syscall classes intercepted by the kernel hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    Connect,
    FileOpen,
    SetUid,
}

impl HookKind {
    pub const fn wire_id(self) -> u8 {
        match self {
            Self::Connect => 1,
            Self::FileOpen => 2,
            Self::SetUid => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::FileOpen => "file_open",
            Self::SetUid => "setuid",
        }
    }
}

/// One decoded hook event as it crosses from kernel to userspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub kind: HookKind,
    pub pid: u32,
    pub uid: u32,
    pub ts_ns: u64,
    /// Kind-specific metadata rendered as `key=value` pairs.
    pub payload: String,
}

pub fn platform_name() -> &'static str {
    "linux"
}

/// Resolve a live process's executable path via procfs.
pub fn resolve_exe_path(pid: u32) -> Option<String> {
    fs::read_link(format!("/proc/{}/exe", pid))
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// True while the pid has a procfs entry.
pub fn process_alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{}", pid)).exists()
}
