//! Agent configuration: compiled defaults, overlaid by an optional TOML
//! file, overlaid by `REFLEX_*` environment variables, then validated.
//! An invalid merged configuration is fatal at startup.

use std::path::PathBuf;
use std::time::Duration;

use escalation::{InputBounds, Thresholds, Tunables, Weights};

mod defaults;
mod env;
mod file;
mod load;
mod util;
mod validate;

pub use file::FileConfig;
pub use load::{config_file_path, DEFAULT_CONFIG_PATH};

#[cfg(test)]
mod tests;

/// The fully merged agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable identity of this node in quorum reports and ledger records.
    pub node_id: String,
    pub data_root: PathBuf,
    pub ledger_path: PathBuf,
    /// Ledger entries older than this are pruned at startup.
    pub retention_days: u32,
    pub baseline_path: PathBuf,
    pub socket_path: PathBuf,

    // Severity blend and state machine.
    pub weight_anomaly: f64,
    pub weight_quorum: f64,
    pub weight_integrity: f64,
    pub weight_pressure: f64,
    pub threshold_pressure: f64,
    pub threshold_isolated: f64,
    pub threshold_frozen: f64,
    pub threshold_quarantined: f64,
    pub threshold_terminated: f64,
    pub pressure_alpha: f64,
    pub cooldown_secs: u64,

    // Anomaly scoring.
    /// Registry key of the scoring strategy, e.g. "mahalanobis".
    pub scorer: String,
    pub entropy_weight: f64,
    pub min_baseline_samples: u64,
    pub window_secs: u64,
    pub window_max_events: usize,
    pub window_table_pids: usize,

    // Corroboration.
    pub quorum_min: usize,
    pub quorum_ttl_secs: u64,
    pub quorum_prune_secs: u64,

    // Budget governor.
    pub budget_capacity: u64,
    pub budget_refill_secs: u64,

    // Runtime shape.
    pub worker_count: usize,
    pub sink_capacity: usize,
    pub poll_interval_ms: u64,
    pub decay_interval_secs: u64,
    pub baseline_save_secs: u64,

    // Hook ingestion.
    pub hooks_enabled: bool,
    pub hook_elf_paths: Vec<PathBuf>,
    pub ring_buffer_map: String,
    /// Name of the kernel pid->state hash map the hooks enforce against.
    pub state_map: String,
    /// NDJSON replay source; when set it replaces kernel attachment.
    pub replay_path: Option<PathBuf>,

    // Response.
    pub dry_run: bool,
    pub protected_processes: Vec<String>,
}

impl AgentConfig {
    /// Escalation tunables derived from the merged configuration. This is
    /// also the payload of a SIGHUP hot reload.
    pub fn tunables(&self) -> Tunables {
        Tunables {
            weights: Weights {
                anomaly: self.weight_anomaly,
                quorum: self.weight_quorum,
                integrity: self.weight_integrity,
                pressure: self.weight_pressure,
            },
            thresholds: Thresholds {
                pressure: self.threshold_pressure,
                isolated: self.threshold_isolated,
                frozen: self.threshold_frozen,
                quarantined: self.threshold_quarantined,
                terminated: self.threshold_terminated,
            },
            pressure_alpha: self.pressure_alpha,
            cooldown_ns: self.cooldown_secs.saturating_mul(1_000_000_000),
            bounds: InputBounds::default(),
        }
    }

    pub fn quorum_ttl(&self) -> Duration {
        Duration::from_secs(self.quorum_ttl_secs)
    }

    pub fn budget_refill_period(&self) -> Duration {
        Duration::from_secs(self.budget_refill_secs)
    }

    pub fn window_ns(&self) -> u64 {
        self.window_secs.saturating_mul(1_000_000_000)
    }
}
