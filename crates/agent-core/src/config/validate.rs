use anyhow::bail;

use super::AgentConfig;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl AgentConfig {
    /// Reject configurations the engine cannot run safely under. Called on
    /// the merged result, so a bad file or environment override is fatal at
    /// startup rather than silently clamped.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_id.trim().is_empty() {
            bail!("node_id must not be empty");
        }

        let weights = [
            ("weight_anomaly", self.weight_anomaly),
            ("weight_quorum", self.weight_quorum),
            ("weight_integrity", self.weight_integrity),
            ("weight_pressure", self.weight_pressure),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be finite and non-negative, got {}", name, value);
            }
        }
        let sum = self.weight_anomaly
            + self.weight_quorum
            + self.weight_integrity
            + self.weight_pressure;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("severity weights must sum to 1.0, got {}", sum);
        }

        let thresholds = [
            self.threshold_pressure,
            self.threshold_isolated,
            self.threshold_frozen,
            self.threshold_quarantined,
            self.threshold_terminated,
        ];
        for value in thresholds {
            if !value.is_finite() {
                bail!("escalation thresholds must be finite, got {}", value);
            }
        }
        if !thresholds.windows(2).all(|pair| pair[0] < pair[1]) {
            bail!(
                "escalation thresholds must be strictly ascending, got {:?}",
                thresholds
            );
        }

        if !self.pressure_alpha.is_finite()
            || !(0.0..=1.0).contains(&self.pressure_alpha)
        {
            bail!(
                "pressure_alpha must be within [0, 1], got {}",
                self.pressure_alpha
            );
        }
        if !self.entropy_weight.is_finite() || self.entropy_weight < 0.0 {
            bail!(
                "entropy_weight must be finite and non-negative, got {}",
                self.entropy_weight
            );
        }

        if self.scorer.trim().is_empty() {
            bail!("scorer must not be empty");
        }
        if self.quorum_min < 1 {
            bail!("quorum_min must be at least 1");
        }
        if self.worker_count < 1 {
            bail!("worker_count must be at least 1");
        }
        if self.sink_capacity < 1 {
            bail!("sink_capacity must be at least 1");
        }
        if self.window_secs < 1 {
            bail!("window_secs must be at least 1");
        }
        if self.window_max_events < 1 {
            bail!("window_max_events must be at least 1");
        }
        if self.budget_capacity < 1 {
            bail!("budget_capacity must be at least 1");
        }
        if self.retention_days < 1 {
            bail!("retention_days must be at least 1");
        }

        if self.hooks_enabled && self.replay_path.is_none() && self.hook_elf_paths.is_empty() {
            bail!("hooks_enabled requires hook_elf_paths or a replay_path");
        }

        Ok(())
    }
}
