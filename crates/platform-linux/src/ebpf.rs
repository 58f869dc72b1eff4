//! Ring-buffer transport between the kernel hook programs and userspace.
//! Backends are swappable: libbpf against a live kernel, NDJSON replay for
//! pipeline testing, or a no-op engine when hooks are disabled.

mod backend;
mod capabilities;
mod codec;
mod engine;
mod replay;
mod replay_codec;
mod state_map;
mod types;

#[cfg(feature = "hooks-libbpf")]
mod libbpf_backend;

pub use capabilities::{capability_report, check_kernel_requirements};
pub use engine::HookEngine;
pub use state_map::{KernelStateMap, NoopKernelStateMap};
pub use types::{HookError, HookStats, PollBatch};

#[cfg(test)]
mod tests;
