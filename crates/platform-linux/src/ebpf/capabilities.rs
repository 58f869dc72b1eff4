use std::collections::HashMap;

use super::types::{HookError, HookStats, Result};

/// Minimum kernel for BPF ring buffer maps.
const MIN_RINGBUF_KERNEL: (u32, u32) = (5, 8);

pub(super) fn detect_kernel_capabilities(stats: &mut HookStats) {
    if let Ok(version) = std::fs::read_to_string("/proc/version") {
        let first_line = version.lines().next().unwrap_or("");
        // "Linux version X.Y.Z ..."
        let parts: Vec<&str> = first_line.split_whitespace().collect();
        if parts.len() >= 3 {
            stats.kernel_version = parts[2].to_string();
        }
    }

    stats.btf_available = std::path::Path::new("/sys/kernel/btf/vmlinux").exists();

    if let Ok(lsm) = std::fs::read_to_string("/sys/kernel/security/lsm") {
        stats.lsm_available = lsm.contains("bpf");
    }
}

pub(super) fn parse_kernel_version(version: &str) -> Option<(u32, u32, u32)> {
    let stripped = version.split(['-', ' ']).next()?;
    let parts: Vec<&str> = stripped.split('.').collect();
    if parts.len() < 2 {
        return None;
    }

    let major = parts[0].parse::<u32>().ok()?;
    let minor = parts[1].parse::<u32>().ok()?;
    let patch = parts
        .get(2)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}

pub(super) fn kernel_supports(version_str: &str, min_major: u32, min_minor: u32) -> bool {
    match parse_kernel_version(version_str) {
        Some((major, minor, _)) => (major, minor) >= (min_major, min_minor),
        None => false,
    }
}

/// Verify the running kernel can host the live hook programs. Called from
/// startup before any program loads; failure here is fatal for the libbpf
/// path because hooks that cannot attach would leave enforcement blind.
pub fn check_kernel_requirements(stats: &HookStats) -> Result<()> {
    let (min_major, min_minor) = MIN_RINGBUF_KERNEL;
    if !kernel_supports(&stats.kernel_version, min_major, min_minor) {
        return Err(HookError::KernelUnsupported(format!(
            "BPF ring buffer needs kernel {}.{}+, running '{}'",
            min_major, min_minor, stats.kernel_version
        )));
    }
    if !stats.btf_available {
        return Err(HookError::KernelUnsupported(
            "BTF (/sys/kernel/btf/vmlinux) unavailable, CO-RE hook programs cannot load"
                .to_string(),
        ));
    }
    if !stats.lsm_available {
        return Err(HookError::KernelUnsupported(
            "BPF LSM not in active LSM list, enforcement hooks cannot attach".to_string(),
        ));
    }
    Ok(())
}

/// Capability summary for startup logging and operator status.
pub fn capability_report(stats: &HookStats) -> HashMap<String, String> {
    let mut report = HashMap::new();
    report.insert("kernel_version".to_string(), stats.kernel_version.clone());
    report.insert("btf_available".to_string(), stats.btf_available.to_string());
    report.insert("lsm_available".to_string(), stats.lsm_available.to_string());
    report.insert(
        "ring_buffer".to_string(),
        kernel_supports(&stats.kernel_version, MIN_RINGBUF_KERNEL.0, MIN_RINGBUF_KERNEL.1)
            .to_string(),
    );
    report.insert(
        "lsm_hooks".to_string(),
        (stats.lsm_available && kernel_supports(&stats.kernel_version, 5, 7)).to_string(),
    );

    for (hook, count) in &stats.per_hook_events {
        report.insert(format!("hook_{}_events", hook), count.to_string());
    }

    report
}
