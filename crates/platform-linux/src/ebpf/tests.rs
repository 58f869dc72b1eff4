use std::io::Write;
use std::time::Duration;

use crate::HookKind;

use super::capabilities::{kernel_supports, parse_kernel_version};
use super::codec::{parse_hook_kind, parse_raw_event};
use super::engine::HookEngine;
use super::replay_codec::encode_replay_event;
use super::state_map::KernelStateMap;
use super::types::HookError;

#[test]
fn connect_event_roundtrips_through_replay_encoding() {
    let line = r#"{"event_type":"connect","pid":1234,"uid":1000,"ts_ns":42,"dst_ip":"10.0.0.9","dst_port":443,"src_ip":"192.168.1.5","src_port":55120}"#;
    let raw = encode_replay_event(line).unwrap();
    let event = parse_raw_event(&raw).unwrap();

    assert_eq!(event.kind, HookKind::Connect);
    assert_eq!(event.pid, 1234);
    assert_eq!(event.uid, 1000);
    assert_eq!(event.ts_ns, 42);
    assert!(event.payload.contains("dst_ip=10.0.0.9"));
    assert!(event.payload.contains("dst_port=443"));
    assert!(event.payload.contains("src_port=55120"));
}

#[test]
fn file_open_event_carries_path_and_flags() {
    let line = r#"{"event_type":"file_open","pid":9,"uid":0,"ts_ns":7,"file_path":"/etc/shadow","flags":2,"mode":384}"#;
    let raw = encode_replay_event(line).unwrap();
    let event = parse_raw_event(&raw).unwrap();

    assert_eq!(event.kind, HookKind::FileOpen);
    assert!(event.payload.contains("path=/etc/shadow"));
    assert!(event.payload.contains("flags=2"));
    assert!(event.payload.contains("mode=384"));
}

#[test]
fn setuid_event_carries_both_uids() {
    let line = r#"{"event_type":"setuid","pid":77,"uid":1000,"ts_ns":5,"target_uid":0,"current_uid":1000}"#;
    let raw = encode_replay_event(line).unwrap();
    let event = parse_raw_event(&raw).unwrap();

    assert_eq!(event.kind, HookKind::SetUid);
    assert!(event.payload.contains("target_uid=0"));
    assert!(event.payload.contains("current_uid=1000"));
}

#[test]
fn unknown_kind_byte_is_a_parse_error() {
    assert!(matches!(parse_hook_kind(0), Err(HookError::Parse(_))));
    assert!(matches!(parse_hook_kind(99), Err(HookError::Parse(_))));
}

#[test]
fn truncated_record_is_a_parse_error() {
    let err = parse_raw_event(&[1, 2, 3]).unwrap_err();
    assert!(matches!(err, HookError::Parse(_)));
}

#[test]
fn unknown_replay_event_type_is_rejected() {
    let line = r#"{"event_type":"dns_query","pid":1}"#;
    assert!(matches!(
        encode_replay_event(line),
        Err(HookError::Parse(_))
    ));
}

#[test]
fn replay_engine_yields_decoded_events() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# fixture").unwrap();
    writeln!(
        file,
        r#"{{"event_type":"connect","pid":1,"uid":0,"ts_ns":10,"dst_ip":"1.2.3.4","dst_port":80}}"#
    )
    .unwrap();
    writeln!(file).unwrap();
    writeln!(
        file,
        r#"{{"event_type":"file_open","pid":2,"uid":0,"ts_ns":20,"file_path":"/tmp/x"}}"#
    )
    .unwrap();
    writeln!(file, "not json at all").unwrap();
    writeln!(
        file,
        r#"{{"event_type":"setuid","pid":3,"uid":0,"ts_ns":30,"target_uid":0}}"#
    )
    .unwrap();
    file.flush().unwrap();

    let mut engine = HookEngine::from_replay(file.path()).unwrap();
    let events = engine.poll_once(Duration::from_millis(1)).unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, HookKind::Connect);
    assert_eq!(events[1].kind, HookKind::FileOpen);
    assert_eq!(events[2].kind, HookKind::SetUid);

    let stats = engine.stats();
    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.parse_errors, 0);
    assert_eq!(stats.per_hook_events.get("connect"), Some(&1));
}

#[test]
fn disabled_engine_polls_nothing() {
    let mut engine = HookEngine::disabled();
    let events = engine.poll_once(Duration::from_millis(1)).unwrap();
    assert!(events.is_empty());
    assert_eq!(engine.stats().events_received, 0);
}

#[test]
fn detached_engines_accept_state_writes() {
    // No kernel map behind the noop and replay backends, but callers mirror
    // transitions unconditionally, so the writes must succeed.
    let engine = HookEngine::disabled();
    let map = engine.state_map();
    map.write_state(42, 2).unwrap();
    map.remove(42).unwrap();
    map.remove(43).unwrap();
}

#[test]
fn kernel_version_parsing() {
    assert_eq!(parse_kernel_version("6.8.0-41-generic"), Some((6, 8, 0)));
    assert_eq!(parse_kernel_version("5.15.2"), Some((5, 15, 2)));
    assert_eq!(parse_kernel_version("5.8"), Some((5, 8, 0)));
    assert_eq!(parse_kernel_version("garbage"), None);
}

#[test]
fn kernel_support_threshold() {
    assert!(kernel_supports("5.8.0", 5, 8));
    assert!(kernel_supports("6.1.0", 5, 8));
    assert!(!kernel_supports("5.7.19", 5, 8));
    assert!(!kernel_supports("unknown", 5, 8));
}
