use super::types::{HookError, Result};

/// Convert one NDJSON line into the binary layout `parse_raw_event` expects.
///
/// Header layout: kind(1) + pid(4 LE) + uid(4 LE) + ts_ns(8 LE), payload
/// after, per hook kind.
pub(super) fn encode_replay_event(json_line: &str) -> Result<Vec<u8>> {
    let v: serde_json::Value = serde_json::from_str(json_line)
        .map_err(|e| HookError::Parse(format!("replay JSON: {}", e)))?;

    let kind_str = v
        .get("event_type")
        .and_then(|v| v.as_str())
        .unwrap_or("connect");

    let kind_id: u8 = match kind_str {
        "connect" | "tcp_connect" => 1,
        "file_open" => 2,
        "setuid" => 3,
        other => {
            return Err(HookError::Parse(format!(
                "unknown replay event_type: {}",
                other
            )));
        }
    };

    let pid = v.get("pid").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let uid = v.get("uid").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let ts_ns = v.get("ts_ns").and_then(|v| v.as_u64()).unwrap_or(0);

    let mut buf = Vec::with_capacity(320);
    buf.push(kind_id);
    buf.extend_from_slice(&pid.to_le_bytes());
    buf.extend_from_slice(&uid.to_le_bytes());
    buf.extend_from_slice(&ts_ns.to_le_bytes());

    match kind_id {
        1 => encode_connect_payload(&v, &mut buf),
        2 => encode_file_open_payload(&v, &mut buf),
        3 => encode_setuid_payload(&v, &mut buf),
        _ => {}
    }

    Ok(buf)
}

fn push_c_string_padded(buf: &mut Vec<u8>, value: &str, max_len: usize) {
    let bytes = value.as_bytes();
    let copy_len = bytes.len().min(max_len.saturating_sub(1));
    buf.extend_from_slice(&bytes[..copy_len]);
    for _ in copy_len..max_len {
        buf.push(0);
    }
}

fn encode_connect_payload(v: &serde_json::Value, buf: &mut Vec<u8>) {
    let family: u16 = 2; // AF_INET
    let sport: u16 = v.get("src_port").and_then(|v| v.as_u64()).unwrap_or(0) as u16;
    let dport: u16 = v.get("dst_port").and_then(|v| v.as_u64()).unwrap_or(0) as u16;
    let protocol: u8 = 6; // TCP

    let src_ip = v.get("src_ip").and_then(|v| v.as_str()).unwrap_or("0.0.0.0");
    let dst_ip = v.get("dst_ip").and_then(|v| v.as_str()).unwrap_or("0.0.0.0");

    buf.extend_from_slice(&family.to_le_bytes());
    buf.extend_from_slice(&sport.to_le_bytes());
    buf.extend_from_slice(&dport.to_le_bytes());
    buf.push(protocol);
    buf.push(0);
    buf.extend_from_slice(&parse_ipv4_octets(src_ip));
    buf.extend_from_slice(&parse_ipv4_octets(dst_ip));
}

fn encode_file_open_payload(v: &serde_json::Value, buf: &mut Vec<u8>) {
    let flags = v.get("flags").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let mode = v.get("mode").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let path = v.get("file_path").and_then(|v| v.as_str()).unwrap_or("");

    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&mode.to_le_bytes());
    push_c_string_padded(buf, path, 256);
}

fn encode_setuid_payload(v: &serde_json::Value, buf: &mut Vec<u8>) {
    let target_uid = v.get("target_uid").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let current_uid = v.get("current_uid").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    buf.extend_from_slice(&target_uid.to_le_bytes());
    buf.extend_from_slice(&current_uid.to_le_bytes());
}

fn parse_ipv4_octets(ip: &str) -> [u8; 4] {
    let parts: Vec<u8> = ip
        .split('.')
        .filter_map(|s| s.parse::<u8>().ok())
        .collect();
    if parts.len() == 4 {
        [parts[0], parts[1], parts[2], parts[3]]
    } else {
        [0u8; 4]
    }
}
