use crate::{HookEvent, HookKind};

use super::types::{HookError, Result, EVENT_HEADER_SIZE};

fn read_u16_le(raw: &[u8], offset: usize) -> Result<u16> {
    let end = offset.saturating_add(2);
    let bytes = raw
        .get(offset..end)
        .ok_or_else(|| HookError::Parse(format!("u16 out of bounds at offset {}", offset)))?;
    let mut out = [0u8; 2];
    out.copy_from_slice(bytes);
    Ok(u16::from_le_bytes(out))
}

fn read_u32_le(raw: &[u8], offset: usize) -> Result<u32> {
    let end = offset.saturating_add(4);
    let bytes = raw
        .get(offset..end)
        .ok_or_else(|| HookError::Parse(format!("u32 out of bounds at offset {}", offset)))?;
    let mut out = [0u8; 4];
    out.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(out))
}

fn read_u64_le(raw: &[u8], offset: usize) -> Result<u64> {
    let end = offset.saturating_add(8);
    let bytes = raw
        .get(offset..end)
        .ok_or_else(|| HookError::Parse(format!("u64 out of bounds at offset {}", offset)))?;
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(out))
}

pub(super) fn parse_raw_event(raw: &[u8]) -> Result<HookEvent> {
    if raw.len() < EVENT_HEADER_SIZE {
        return Err(HookError::Parse(format!(
            "event shorter than header: got {} bytes, need at least {}",
            raw.len(),
            EVENT_HEADER_SIZE
        )));
    }

    let kind = parse_hook_kind(raw[0])?;
    let pid = read_u32_le(raw, 1)?;
    let uid = read_u32_le(raw, 5)?;
    let ts_ns = read_u64_le(raw, 9)?;
    let payload = parse_payload(kind, &raw[EVENT_HEADER_SIZE..]);

    Ok(HookEvent {
        kind,
        pid,
        uid,
        ts_ns,
        payload,
    })
}

pub(super) fn parse_hook_kind(raw: u8) -> Result<HookKind> {
    match raw {
        1 => Ok(HookKind::Connect),
        2 => Ok(HookKind::FileOpen),
        3 => Ok(HookKind::SetUid),
        other => Err(HookError::Parse(format!("unknown hook kind id {}", other))),
    }
}

fn parse_payload(kind: HookKind, raw: &[u8]) -> String {
    match kind {
        HookKind::Connect => parse_connect_payload(raw),
        HookKind::FileOpen => parse_file_open_payload(raw),
        HookKind::SetUid => parse_setuid_payload(raw),
    }
}

fn parse_connect_payload(raw: &[u8]) -> String {
    if raw.len() < 16 {
        return parse_c_string(raw);
    }

    let family = read_u16_le(raw, 0).unwrap_or_default();
    let sport = read_u16_le(raw, 2).unwrap_or_default();
    let dport = read_u16_le(raw, 4).unwrap_or_default();
    let protocol = raw.get(6).copied().unwrap_or_default();
    let saddr_v4 = read_ipv4(raw, 8).unwrap_or([0u8; 4]);
    let daddr_v4 = read_ipv4(raw, 12).unwrap_or([0u8; 4]);

    let (src_ip, dst_ip) = if family == 10 && raw.len() >= 48 {
        match (read_ipv6(raw, 16), read_ipv6(raw, 32)) {
            (Some(src), Some(dst)) => (format_ipv6(src), format_ipv6(dst)),
            _ => (format_ipv4(saddr_v4), format_ipv4(daddr_v4)),
        }
    } else {
        (format_ipv4(saddr_v4), format_ipv4(daddr_v4))
    };

    format!(
        "family={};protocol={};src_ip={};src_port={};dst_ip={};dst_port={}",
        family, protocol, src_ip, sport, dst_ip, dport
    )
}

fn parse_file_open_payload(raw: &[u8]) -> String {
    if raw.len() < 8 {
        return parse_c_string(raw);
    }

    let flags = read_u32_le(raw, 0).unwrap_or_default();
    let mode = read_u32_le(raw, 4).unwrap_or_default();
    let path = parse_c_string(slice_window(raw, 8, 256));
    if path.is_empty() {
        return parse_c_string(raw);
    }

    format!("path={};flags={};mode={}", path, flags, mode)
}

fn parse_setuid_payload(raw: &[u8]) -> String {
    if raw.len() < 8 {
        return parse_c_string(raw);
    }

    let target_uid = read_u32_le(raw, 0).unwrap_or_default();
    let current_uid = read_u32_le(raw, 4).unwrap_or_default();
    format!("target_uid={};current_uid={}", target_uid, current_uid)
}

fn format_ipv4(ip: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])
}

fn format_ipv6(ip: [u8; 16]) -> String {
    std::net::Ipv6Addr::from(ip).to_string()
}

fn read_ipv4(raw: &[u8], offset: usize) -> Option<[u8; 4]> {
    let end = offset.checked_add(4)?;
    let bytes = raw.get(offset..end)?;
    let mut out = [0u8; 4];
    out.copy_from_slice(bytes);
    Some(out)
}

fn read_ipv6(raw: &[u8], offset: usize) -> Option<[u8; 16]> {
    let end = offset.checked_add(16)?;
    let bytes = raw.get(offset..end)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(bytes);
    Some(out)
}

fn parse_c_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn slice_window(raw: &[u8], offset: usize, max_len: usize) -> &[u8] {
    if offset >= raw.len() {
        return &[];
    }

    let end = raw.len().min(offset.saturating_add(max_len));
    &raw[offset..end]
}
