//! Agent lifecycle: event ingestion, the scoring worker pool, the runtime
//! that wires every component together, and its periodic maintenance tasks.

mod ingest;
mod processor;
mod runtime;
mod workers;

pub use processor::{EventProcessor, IdentityResolver, ProcessIdentity, ProcfsIdentityResolver};
pub use runtime::AgentRuntime;
