use std::fmt;

/// Fixed header preceding every hook record: kind(1) + pid(4) + uid(4) +
/// ts_ns(8).
pub(super) const EVENT_HEADER_SIZE: usize = 1 + 4 + 4 + 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookStats {
    pub events_received: u64,
    pub events_dropped: u64,
    pub parse_errors: u64,
    /// Per-hook event counters (hook name to count).
    pub per_hook_events: std::collections::HashMap<String, u64>,
    pub kernel_version: String,
    pub btf_available: bool,
    pub lsm_available: bool,
}

#[derive(Debug)]
pub enum HookError {
    FeatureDisabled(&'static str),
    KernelUnsupported(String),
    Backend(String),
    Parse(String),
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureDisabled(feature) => {
                write!(f, "feature '{}' is disabled in this build", feature)
            }
            Self::KernelUnsupported(msg) => write!(f, "kernel requirement not met: {}", msg),
            Self::Backend(msg) => write!(f, "hook backend error: {}", msg),
            Self::Parse(msg) => write!(f, "hook parse error: {}", msg),
        }
    }
}

impl std::error::Error for HookError {}

pub type Result<T> = std::result::Result<T, HookError>;

/// Raw records pulled from the ring buffer in one poll, with the kernel-side
/// overflow count observed since the previous poll.
#[derive(Debug, Default)]
pub struct PollBatch {
    pub records: Vec<Vec<u8>>,
    pub dropped: u64,
}
