//! Behavioural anomaly scoring: per-binary statistical baselines, sliding
//! per-pid feature windows, and pluggable distance scorers feeding the
//! escalation engine's anomaly term.

pub mod baseline;
pub mod integrity;
pub mod math;
pub mod scorer;
pub mod store;
pub mod types;
pub mod window;

pub use baseline::Baseline;
pub use integrity::{hash_executable, hash_process_executable, IntegrityTracker};
pub use scorer::{MahalanobisScorer, Score, ScoreError, ScoreResult, Scorer, ScorerRegistry};
pub use store::{BaselineStore, BaselineStoreError, BaselineStoreResult};
pub use types::{EventKind, EVENT_KINDS, EVENT_KIND_COUNT, FEATURE_DIM};
pub use window::{FeatureWindow, WindowTable};

#[cfg(test)]
mod tests;
