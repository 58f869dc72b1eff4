use std::fmt;

use crate::ledger::LedgerError;
use crate::state::ContainState;
use crate::validate::Violation;

#[derive(Debug)]
pub enum EscalationError {
    NotTracked(u32),
    NonMonotonic { current: ContainState, target: ContainState },
    DecayFromTerminated,
    AtFloor,
    CooldownActive { remaining_ns: u64 },
    Pinned(u32),
    UnknownState(String),
    Validation(Violation),
    Ledger(LedgerError),
}

impl fmt::Display for EscalationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTracked(pid) => write!(f, "pid {} not tracked", pid),
            Self::NonMonotonic { current, target } => write!(
                f,
                "refusing downgrade: target {} not above current {}",
                target, current
            ),
            Self::DecayFromTerminated => f.write_str("TERMINATED is absorbing; decay refused"),
            Self::AtFloor => f.write_str("already NORMAL; nothing to decay"),
            Self::CooldownActive { remaining_ns } => {
                write!(f, "decay cooldown active for {}ns more", remaining_ns)
            }
            Self::Pinned(pid) => write!(f, "pid {} is pinned by operator", pid),
            Self::UnknownState(name) => write!(f, "unknown state name {:?}", name),
            Self::Validation(violation) => write!(f, "input validation failed: {}", violation),
            Self::Ledger(err) => write!(f, "ledger failure: {}", err),
        }
    }
}

impl std::error::Error for EscalationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LedgerError> for EscalationError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<Violation> for EscalationError {
    fn from(value: Violation) -> Self {
        Self::Validation(value)
    }
}

pub type EscalationResult<T> = std::result::Result<T, EscalationError>;
