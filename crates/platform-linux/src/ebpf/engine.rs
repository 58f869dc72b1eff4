use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "hooks-libbpf")]
use std::path::PathBuf;

use crate::HookEvent;

use super::backend::{NoopRingBufferBackend, RingBufferBackend};
use super::capabilities::detect_kernel_capabilities;

#[cfg(feature = "hooks-libbpf")]
use super::capabilities::check_kernel_requirements;
use super::codec::parse_raw_event;
use super::replay::ReplayBackend;
use super::state_map::{KernelStateMap, NoopKernelStateMap};
use super::types::{HookError, HookStats, Result, EVENT_HEADER_SIZE};

#[cfg(feature = "hooks-libbpf")]
use super::libbpf_backend::LibbpfRingBufferBackend;

/// Owns a ring-buffer backend and turns its raw records into decoded hook
/// events while tracking receive, drop, and parse-error counters.
pub struct HookEngine {
    backend: Box<dyn RingBufferBackend>,
    state_map: Arc<dyn KernelStateMap>,
    stats: HookStats,
}

impl HookEngine {
    /// Engine with no kernel attachment. Used in tests and when live hooks
    /// are configured off.
    pub fn disabled() -> Self {
        let mut stats = HookStats::default();
        detect_kernel_capabilities(&mut stats);
        Self {
            backend: Box::<NoopRingBufferBackend>::default(),
            state_map: Arc::new(NoopKernelStateMap),
            stats,
        }
    }

    #[cfg(feature = "hooks-libbpf")]
    pub fn from_elf(elf_path: &Path, ring_buffer_map: &str, state_map: &str) -> Result<Self> {
        Self::from_elfs(&[elf_path.to_path_buf()], ring_buffer_map, state_map)
    }

    #[cfg(feature = "hooks-libbpf")]
    pub fn from_elfs(
        elf_paths: &[PathBuf],
        ring_buffer_map: &str,
        state_map: &str,
    ) -> Result<Self> {
        let mut stats = HookStats::default();
        detect_kernel_capabilities(&mut stats);
        check_kernel_requirements(&stats)?;
        let (backend, state_map) =
            LibbpfRingBufferBackend::new_many(elf_paths, ring_buffer_map, state_map)?;
        Ok(Self {
            backend: Box::new(backend),
            state_map: Arc::new(state_map),
            stats,
        })
    }

    #[cfg(not(feature = "hooks-libbpf"))]
    pub fn from_elf(_elf_path: &Path, _ring_buffer_map: &str, _state_map: &str) -> Result<Self> {
        Err(HookError::FeatureDisabled("hooks-libbpf"))
    }

    #[cfg(not(feature = "hooks-libbpf"))]
    pub fn from_elfs(
        _elf_paths: &[std::path::PathBuf],
        _ring_buffer_map: &str,
        _state_map: &str,
    ) -> Result<Self> {
        Err(HookError::FeatureDisabled("hooks-libbpf"))
    }

    /// Engine that reads NDJSON events from a file or FIFO. Each line is a
    /// JSON object matching the hook event schema, so the full pipeline can
    /// run without kernel attachment.
    pub fn from_replay(path: &Path) -> Result<Self> {
        let backend = ReplayBackend::open(path)?;
        let mut stats = HookStats::default();
        detect_kernel_capabilities(&mut stats);
        Ok(Self {
            backend: Box::new(backend),
            state_map: Arc::new(NoopKernelStateMap),
            stats,
        })
    }

    /// Shared handle to the kernel-side pid->state map for this backend.
    /// Callers hold it past the engine moving into the poll thread.
    pub fn state_map(&self) -> Arc<dyn KernelStateMap> {
        Arc::clone(&self.state_map)
    }

    pub fn poll_once(&mut self, timeout: Duration) -> Result<Vec<HookEvent>> {
        let batch = self.backend.poll_raw_events(timeout)?;
        self.stats.events_dropped = self.stats.events_dropped.saturating_add(batch.dropped);

        let mut events = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            self.stats.events_received = self.stats.events_received.saturating_add(1);
            match parse_raw_event(record) {
                Ok(event) => {
                    *self
                        .stats
                        .per_hook_events
                        .entry(event.kind.name().to_string())
                        .or_insert(0) += 1;
                    events.push(event);
                }
                Err(_) => {
                    self.stats.parse_errors = self.stats.parse_errors.saturating_add(1);
                    if record.len() >= EVENT_HEADER_SIZE {
                        tracing::debug!(kind_id = record[0], "undecodable hook record");
                    }
                }
            }
        }

        Ok(events)
    }

    pub fn stats(&self) -> HookStats {
        self.stats.clone()
    }
}
