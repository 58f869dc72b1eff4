//! Escalation core: the monotonic containment state machine, the composite
//! severity law, the hash-chained decision ledger, and the engine that ties
//! them to the budget governor.
//!
//! The kernel-shared state table only ever mirrors decisions made here;
//! nothing in the kernel path can raise or lower a state on its own.

mod engine;
mod errors;
mod ledger;
mod severity;
mod state;
mod table;
mod validate;

pub use engine::{EscalationEngine, Outcome, Tunables};
pub use errors::{EscalationError, EscalationResult};
pub use ledger::{
    DecisionLedger, DecisionOutcome, DecisionRecord, LedgerError, LedgerResult, MemoryLedger,
    NewDecision, SqliteLedger, GENESIS_HASH,
};
pub use severity::{
    compute_severity, ewma_pressure, target_state, SignalInputs, Thresholds, Weights,
};
pub use state::ContainState;
pub use table::{ProcessEntry, ProcessStatus, ProcessTable};
pub use validate::{validate_inputs, validate_severity, InputBounds, Violation};

#[cfg(test)]
pub(crate) use ledger::verify_records as ledger_verify_for_tests;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod tests_ledger;
#[cfg(test)]
mod tests_machine;
