use std::path::PathBuf;

use super::AgentConfig;

const DEFAULT_DATA_ROOT: &str = "/var/lib/reflex-agent";
const DEFAULT_SOCKET_PATH: &str = "/run/reflex-agent/override.sock";
const DEFAULT_RING_BUFFER_MAP: &str = "hook_events";
const DEFAULT_STATE_MAP: &str = "process_state";
const DEFAULT_HOOK_ELF: &str = "/usr/lib/reflex-agent/hooks.bpf.o";

fn default_node_id() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "reflex-node".to_string())
}

impl Default for AgentConfig {
    fn default() -> Self {
        let data_root = PathBuf::from(DEFAULT_DATA_ROOT);
        Self {
            node_id: default_node_id(),
            ledger_path: data_root.join("decisions.db"),
            retention_days: 30,
            baseline_path: data_root.join("baselines.bin"),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            data_root,

            weight_anomaly: 0.4,
            weight_quorum: 0.2,
            weight_integrity: 0.2,
            weight_pressure: 0.2,
            threshold_pressure: 1.0,
            threshold_isolated: 3.0,
            threshold_frozen: 6.0,
            threshold_quarantined: 9.0,
            threshold_terminated: 12.0,
            pressure_alpha: 0.8,
            cooldown_secs: 30,

            scorer: "mahalanobis".to_string(),
            entropy_weight: 0.3,
            min_baseline_samples: 8,
            window_secs: 10,
            window_max_events: 256,
            window_table_pids: 4_096,

            quorum_min: 2,
            quorum_ttl_secs: 30,
            quorum_prune_secs: 60,

            budget_capacity: 100,
            budget_refill_secs: 60,

            worker_count: 4,
            sink_capacity: 8_192,
            poll_interval_ms: 100,
            decay_interval_secs: 5,
            baseline_save_secs: 300,

            hooks_enabled: true,
            hook_elf_paths: vec![PathBuf::from(DEFAULT_HOOK_ELF)],
            ring_buffer_map: DEFAULT_RING_BUFFER_MAP.to_string(),
            state_map: DEFAULT_STATE_MAP.to_string(),
            replay_path: None,

            dry_run: false,
            protected_processes: Vec::new(),
        }
    }
}
