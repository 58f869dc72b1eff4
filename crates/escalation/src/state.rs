use std::fmt;

use serde::{Deserialize, Serialize};

/// Containment states, strictly ordered by severity. The kernel-shared
/// mirror stores the `u8` value; the kernel side never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContainState {
    Normal = 0,
    Pressure = 1,
    Isolated = 2,
    Frozen = 3,
    Quarantined = 4,
    Terminated = 5,
}

impl ContainState {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Normal),
            1 => Some(Self::Pressure),
            2 => Some(Self::Isolated),
            3 => Some(Self::Frozen),
            4 => Some(Self::Quarantined),
            5 => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Self::Normal),
            "PRESSURE" => Some(Self::Pressure),
            "ISOLATED" => Some(Self::Isolated),
            "FROZEN" => Some(Self::Frozen),
            "QUARANTINED" => Some(Self::Quarantined),
            "TERMINATED" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Terminated is absorbing: no transition, including decay, leaves it.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// The next state down, or `None` at the floor.
    pub fn one_tier_down(self) -> Option<Self> {
        match self {
            Self::Normal => None,
            other => Self::from_byte(other.as_byte() - 1),
        }
    }
}

impl fmt::Display for ContainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "NORMAL",
            Self::Pressure => "PRESSURE",
            Self::Isolated => "ISOLATED",
            Self::Frozen => "FROZEN",
            Self::Quarantined => "QUARANTINED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}
