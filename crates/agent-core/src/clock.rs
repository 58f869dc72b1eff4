//! Two clocks: monotonic nanoseconds since boot, the base the kernel
//! hooks stamp events with, and unix nanoseconds, the base the decision
//! ledger records so retention survives reboots.

use std::time::{SystemTime, UNIX_EPOCH};

use nix::time::{clock_gettime, ClockId};

pub fn monotonic_ns() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => (ts.tv_sec() as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec() as u64),
        // CLOCK_MONOTONIC is unconditionally available on Linux.
        Err(_) => 0,
    }
}

pub fn unix_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Offset that rebases a kernel event timestamp onto the unix clock.
/// Constant shifts cancel out in cooldown arithmetic, so rebasing every
/// engine input keeps the ledger in wall time without disturbing timing.
pub fn boot_to_unix_offset_ns() -> u64 {
    unix_ns().saturating_sub(monotonic_ns())
}
