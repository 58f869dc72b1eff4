use std::path::PathBuf;

use tracing::warn;

use super::util::{env_non_empty, parse_bool, split_csv};
use super::AgentConfig;

impl AgentConfig {
    /// Overlay `REFLEX_*` environment variables. Environment wins over the
    /// file, which wins over compiled defaults.
    pub fn apply_env(&mut self) {
        self.apply_env_identity();
        self.apply_env_paths();
        self.apply_env_engine();
        self.apply_env_runtime();
        self.apply_env_hooks();
    }

    fn apply_env_identity(&mut self) {
        if let Some(v) = env_non_empty("REFLEX_NODE_ID") {
            self.node_id = v;
        }
    }

    fn apply_env_paths(&mut self) {
        if let Some(v) = env_non_empty("REFLEX_DATA_ROOT") {
            let data_root = PathBuf::from(v);
            self.ledger_path = data_root.join("decisions.db");
            self.baseline_path = data_root.join("baselines.bin");
            self.data_root = data_root;
        }
        if let Some(v) = env_non_empty("REFLEX_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        set_u32(&mut self.retention_days, "REFLEX_RETENTION_DAYS");
        if let Some(v) = env_non_empty("REFLEX_BASELINE_PATH") {
            self.baseline_path = PathBuf::from(v);
        }
        if let Some(v) = env_non_empty("REFLEX_SOCKET_PATH") {
            self.socket_path = PathBuf::from(v);
        }
    }

    fn apply_env_engine(&mut self) {
        if let Some(v) = env_non_empty("REFLEX_SCORER") {
            self.scorer = v;
        }
        set_f64(&mut self.pressure_alpha, "REFLEX_PRESSURE_ALPHA");
        set_f64(&mut self.entropy_weight, "REFLEX_ENTROPY_WEIGHT");
        set_u64(&mut self.cooldown_secs, "REFLEX_COOLDOWN_SECS");
        set_u64(&mut self.quorum_ttl_secs, "REFLEX_QUORUM_TTL_SECS");
        set_usize(&mut self.quorum_min, "REFLEX_QUORUM_MIN");
        set_u64(&mut self.budget_capacity, "REFLEX_BUDGET_CAPACITY");
        set_u64(&mut self.budget_refill_secs, "REFLEX_BUDGET_REFILL_SECS");
    }

    fn apply_env_runtime(&mut self) {
        set_usize(&mut self.worker_count, "REFLEX_WORKER_COUNT");
        set_usize(&mut self.sink_capacity, "REFLEX_SINK_CAPACITY");
        set_u64(&mut self.poll_interval_ms, "REFLEX_POLL_INTERVAL_MS");
        set_u64(&mut self.decay_interval_secs, "REFLEX_DECAY_INTERVAL_SECS");
        if let Some(v) = env_non_empty("REFLEX_DRY_RUN") {
            match parse_bool(&v) {
                Some(flag) => self.dry_run = flag,
                None => warn!(value = %v, "ignoring unparseable REFLEX_DRY_RUN"),
            }
        }
        if let Some(v) = env_non_empty("REFLEX_PROTECTED_PROCESSES") {
            self.protected_processes = split_csv(&v);
        }
    }

    fn apply_env_hooks(&mut self) {
        if let Some(v) = env_non_empty("REFLEX_HOOKS_ENABLED") {
            match parse_bool(&v) {
                Some(flag) => self.hooks_enabled = flag,
                None => warn!(value = %v, "ignoring unparseable REFLEX_HOOKS_ENABLED"),
            }
        }
        if let Some(v) = env_non_empty("REFLEX_HOOK_ELF_PATHS") {
            self.hook_elf_paths = split_csv(&v).into_iter().map(PathBuf::from).collect();
        }
        if let Some(v) = env_non_empty("REFLEX_RING_BUFFER_MAP") {
            self.ring_buffer_map = v;
        }
        if let Some(v) = env_non_empty("REFLEX_STATE_MAP") {
            self.state_map = v;
        }
        if let Some(v) = env_non_empty("REFLEX_REPLAY_PATH") {
            self.replay_path = Some(PathBuf::from(v));
        }
    }
}

fn set_f64(slot: &mut f64, name: &str) {
    if let Some(v) = env_non_empty(name) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(variable = name, value = %v, "ignoring unparseable override"),
        }
    }
}

fn set_u32(slot: &mut u32, name: &str) {
    if let Some(v) = env_non_empty(name) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(variable = name, value = %v, "ignoring unparseable override"),
        }
    }
}

fn set_u64(slot: &mut u64, name: &str) {
    if let Some(v) = env_non_empty(name) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(variable = name, value = %v, "ignoring unparseable override"),
        }
    }
}

fn set_usize(slot: &mut usize, name: &str) {
    if let Some(v) = env_non_empty(name) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(variable = name, value = %v, "ignoring unparseable override"),
        }
    }
}
