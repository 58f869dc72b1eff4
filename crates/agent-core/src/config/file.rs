use std::path::PathBuf;

use serde::Deserialize;

use super::AgentConfig;

/// On-disk configuration: every field optional, each present field
/// overriding the compiled default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub node_id: Option<String>,
    pub data_root: Option<PathBuf>,
    pub ledger_path: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub baseline_path: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,

    pub weight_anomaly: Option<f64>,
    pub weight_quorum: Option<f64>,
    pub weight_integrity: Option<f64>,
    pub weight_pressure: Option<f64>,
    pub threshold_pressure: Option<f64>,
    pub threshold_isolated: Option<f64>,
    pub threshold_frozen: Option<f64>,
    pub threshold_quarantined: Option<f64>,
    pub threshold_terminated: Option<f64>,
    pub pressure_alpha: Option<f64>,
    pub cooldown_secs: Option<u64>,

    pub scorer: Option<String>,
    pub entropy_weight: Option<f64>,
    pub min_baseline_samples: Option<u64>,
    pub window_secs: Option<u64>,
    pub window_max_events: Option<usize>,
    pub window_table_pids: Option<usize>,

    pub quorum_min: Option<usize>,
    pub quorum_ttl_secs: Option<u64>,
    pub quorum_prune_secs: Option<u64>,

    pub budget_capacity: Option<u64>,
    pub budget_refill_secs: Option<u64>,

    pub worker_count: Option<usize>,
    pub sink_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub decay_interval_secs: Option<u64>,
    pub baseline_save_secs: Option<u64>,

    pub hooks_enabled: Option<bool>,
    pub hook_elf_paths: Option<Vec<PathBuf>>,
    pub ring_buffer_map: Option<String>,
    pub state_map: Option<String>,
    pub replay_path: Option<PathBuf>,

    pub dry_run: Option<bool>,
    pub protected_processes: Option<Vec<String>>,
}

impl FileConfig {
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overlay present fields onto the merged configuration. When
    /// `data_root` moves and the derived paths were not set explicitly,
    /// they move with it.
    pub fn apply(self, cfg: &mut AgentConfig) {
        if let Some(data_root) = self.data_root {
            cfg.ledger_path = data_root.join("decisions.db");
            cfg.baseline_path = data_root.join("baselines.bin");
            cfg.data_root = data_root;
        }
        if let Some(v) = self.node_id {
            cfg.node_id = v;
        }
        if let Some(v) = self.ledger_path {
            cfg.ledger_path = v;
        }
        if let Some(v) = self.retention_days {
            cfg.retention_days = v;
        }
        if let Some(v) = self.baseline_path {
            cfg.baseline_path = v;
        }
        if let Some(v) = self.socket_path {
            cfg.socket_path = v;
        }

        if let Some(v) = self.weight_anomaly {
            cfg.weight_anomaly = v;
        }
        if let Some(v) = self.weight_quorum {
            cfg.weight_quorum = v;
        }
        if let Some(v) = self.weight_integrity {
            cfg.weight_integrity = v;
        }
        if let Some(v) = self.weight_pressure {
            cfg.weight_pressure = v;
        }
        if let Some(v) = self.threshold_pressure {
            cfg.threshold_pressure = v;
        }
        if let Some(v) = self.threshold_isolated {
            cfg.threshold_isolated = v;
        }
        if let Some(v) = self.threshold_frozen {
            cfg.threshold_frozen = v;
        }
        if let Some(v) = self.threshold_quarantined {
            cfg.threshold_quarantined = v;
        }
        if let Some(v) = self.threshold_terminated {
            cfg.threshold_terminated = v;
        }
        if let Some(v) = self.pressure_alpha {
            cfg.pressure_alpha = v;
        }
        if let Some(v) = self.cooldown_secs {
            cfg.cooldown_secs = v;
        }

        if let Some(v) = self.scorer {
            cfg.scorer = v;
        }
        if let Some(v) = self.entropy_weight {
            cfg.entropy_weight = v;
        }
        if let Some(v) = self.min_baseline_samples {
            cfg.min_baseline_samples = v;
        }
        if let Some(v) = self.window_secs {
            cfg.window_secs = v;
        }
        if let Some(v) = self.window_max_events {
            cfg.window_max_events = v;
        }
        if let Some(v) = self.window_table_pids {
            cfg.window_table_pids = v;
        }

        if let Some(v) = self.quorum_min {
            cfg.quorum_min = v;
        }
        if let Some(v) = self.quorum_ttl_secs {
            cfg.quorum_ttl_secs = v;
        }
        if let Some(v) = self.quorum_prune_secs {
            cfg.quorum_prune_secs = v;
        }

        if let Some(v) = self.budget_capacity {
            cfg.budget_capacity = v;
        }
        if let Some(v) = self.budget_refill_secs {
            cfg.budget_refill_secs = v;
        }

        if let Some(v) = self.worker_count {
            cfg.worker_count = v;
        }
        if let Some(v) = self.sink_capacity {
            cfg.sink_capacity = v;
        }
        if let Some(v) = self.poll_interval_ms {
            cfg.poll_interval_ms = v;
        }
        if let Some(v) = self.decay_interval_secs {
            cfg.decay_interval_secs = v;
        }
        if let Some(v) = self.baseline_save_secs {
            cfg.baseline_save_secs = v;
        }

        if let Some(v) = self.hooks_enabled {
            cfg.hooks_enabled = v;
        }
        if let Some(v) = self.hook_elf_paths {
            cfg.hook_elf_paths = v;
        }
        if let Some(v) = self.ring_buffer_map {
            cfg.ring_buffer_map = v;
        }
        if let Some(v) = self.state_map {
            cfg.state_map = v;
        }
        if self.replay_path.is_some() {
            cfg.replay_path = self.replay_path;
        }

        if let Some(v) = self.dry_run {
            cfg.dry_run = v;
        }
        if let Some(v) = self.protected_processes {
            cfg.protected_processes = v;
        }
    }
}
