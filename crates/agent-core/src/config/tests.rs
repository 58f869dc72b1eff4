use std::io::Write;
use std::path::PathBuf;

use super::file::FileConfig;
use super::AgentConfig;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn defaults_validate() {
    AgentConfig::default().validate().unwrap();
}

#[test]
fn default_tunables_round_into_engine_terms() {
    let cfg = AgentConfig::default();
    let tunables = cfg.tunables();
    assert_eq!(tunables.cooldown_ns, 30_000_000_000);
    assert!((tunables.weights.sum() - 1.0).abs() < 1e-9);
    assert!(tunables.thresholds.ascending());
}

#[test]
fn file_overlays_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
node_id = "edge-7"
cooldown_secs = 120
worker_count = 2
dry_run = true
state_map = "contain_state"
replay_path = "/tmp/events.ndjson"
"#,
    );

    let cfg = AgentConfig::load_from(&path, true).unwrap();
    assert_eq!(cfg.node_id, "edge-7");
    assert_eq!(cfg.cooldown_secs, 120);
    assert_eq!(cfg.worker_count, 2);
    assert!(cfg.dry_run);
    assert_eq!(cfg.state_map, "contain_state");
    assert_eq!(cfg.replay_path.as_deref(), Some(std::path::Path::new("/tmp/events.ndjson")));
    // Untouched fields keep their defaults.
    assert_eq!(cfg.quorum_min, 2);
    assert_eq!(cfg.ring_buffer_map, "hook_events");
}

#[test]
fn data_root_moves_derived_paths() {
    let mut cfg = AgentConfig::default();
    let file = FileConfig::parse("data_root = \"/srv/reflex\"").unwrap();
    file.apply(&mut cfg);
    assert_eq!(cfg.ledger_path, PathBuf::from("/srv/reflex/decisions.db"));
    assert_eq!(cfg.baseline_path, PathBuf::from("/srv/reflex/baselines.bin"));
}

#[test]
fn explicit_ledger_path_wins_over_data_root() {
    let mut cfg = AgentConfig::default();
    let file = FileConfig::parse(
        "data_root = \"/srv/reflex\"\nledger_path = \"/var/ledger.db\"",
    )
    .unwrap();
    file.apply(&mut cfg);
    assert_eq!(cfg.ledger_path, PathBuf::from("/var/ledger.db"));
    assert_eq!(cfg.baseline_path, PathBuf::from("/srv/reflex/baselines.bin"));
}

#[test]
fn unknown_file_key_is_rejected() {
    assert!(FileConfig::parse("no_such_knob = 1").is_err());
}

#[test]
fn missing_required_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(AgentConfig::load_from(&missing, true).is_err());
}

#[test]
fn missing_optional_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let cfg = AgentConfig::load_from(&missing, false).unwrap();
    assert_eq!(cfg.budget_capacity, 100);
}

#[test]
fn weights_must_sum_to_one() {
    let mut cfg = AgentConfig::default();
    cfg.weight_anomaly = 0.9;
    assert!(cfg.validate().is_err());
}

#[test]
fn thresholds_must_ascend() {
    let mut cfg = AgentConfig::default();
    cfg.threshold_frozen = cfg.threshold_isolated;
    assert!(cfg.validate().is_err());
}

#[test]
fn pressure_alpha_is_bounded() {
    let mut cfg = AgentConfig::default();
    cfg.pressure_alpha = 1.5;
    assert!(cfg.validate().is_err());
}

#[test]
fn hooks_without_a_source_are_rejected() {
    let mut cfg = AgentConfig::default();
    cfg.hook_elf_paths.clear();
    cfg.replay_path = None;
    assert!(cfg.validate().is_err());
    cfg.hooks_enabled = false;
    cfg.validate().unwrap();
}

#[test]
fn csv_and_bool_parsing() {
    use super::util::{parse_bool, split_csv};

    assert_eq!(split_csv("sshd, systemd ,,init"), vec!["sshd", "systemd", "init"]);
    assert_eq!(parse_bool("Yes"), Some(true));
    assert_eq!(parse_bool("0"), Some(false));
    assert_eq!(parse_bool("maybe"), None);
}
