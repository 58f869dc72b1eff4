use serde::{Deserialize, Serialize};

/// Behavioural event classes observed by the enforcement hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Connect,
    FileOpen,
    SetUid,
}

pub const EVENT_KINDS: [EventKind; 3] = [EventKind::Connect, EventKind::FileOpen, EventKind::SetUid];
pub const EVENT_KIND_COUNT: usize = 3;

impl EventKind {
    pub const fn index(self) -> usize {
        match self {
            Self::Connect => 0,
            Self::FileOpen => 1,
            Self::SetUid => 2,
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

/// Dimensionality of the behavioural feature vector: per-kind rates plus
/// the overall event rate.
pub const FEATURE_DIM: usize = EVENT_KIND_COUNT + 1;
