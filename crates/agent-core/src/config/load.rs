use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use super::file::FileConfig;
use super::util::env_non_empty;
use super::AgentConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/reflex-agent/config.toml";

/// Path the agent will read its TOML from: `REFLEX_CONFIG` when set,
/// otherwise the packaged default location.
pub fn config_file_path() -> PathBuf {
    env_non_empty("REFLEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl AgentConfig {
    /// Merge order: compiled defaults, then the TOML file when present,
    /// then environment overrides, then validation. A file named by
    /// `REFLEX_CONFIG` must exist; the default path is optional.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_file_path();
        let explicit = env_non_empty("REFLEX_CONFIG").is_some();
        Self::load_from(&path, explicit)
    }

    pub fn load_from(path: &Path, required: bool) -> anyhow::Result<Self> {
        let mut cfg = Self::default();

        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let file = FileConfig::parse(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?;
                file.apply(&mut cfg);
                info!(path = %path.display(), "loaded configuration file");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!(path = %path.display(), "no configuration file, using defaults");
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading config file {}", path.display()));
            }
        }

        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }
}
