#![cfg(feature = "hooks-libbpf")]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libbpf_rs::{MapCore, MapFlags};
use tracing::{debug, info};

use super::backend::RingBufferBackend;
use super::state_map::KernelStateMap;
use super::types::{HookError, PollBatch, Result};

pub(super) struct LibbpfRingBufferBackend {
    // Drop order matters: ring_buffer must drop before _loaded so the map fd
    // references release before programs detach.
    ring_buffer: libbpf_rs::RingBuffer<'static>,
    records: RecordSink,
    drop_counter_sources: Vec<DropCounterSource>,
    _loaded: Vec<LoadedObject>,
}

type RecordSink = Arc<Mutex<Vec<Vec<u8>>>>;

struct LoadedObject {
    path: PathBuf,
    object: libbpf_rs::Object,
    _links: Vec<libbpf_rs::Link>,
    attached_programs: Vec<String>,
}

struct DropCounterSource {
    owner_path: PathBuf,
    map_handle: libbpf_rs::MapHandle,
    last_seen: u64,
}

/// Writer over the hook programs' pid->state hash map. Every transition the
/// escalation engine applies is mirrored through this handle; a state the
/// kernel never sees is a state that is never enforced.
pub(super) struct LibbpfStateMap {
    map_handle: libbpf_rs::MapHandle,
}

impl KernelStateMap for LibbpfStateMap {
    fn write_state(&self, pid: u32, state: u8) -> Result<()> {
        self.map_handle
            .update(&pid.to_ne_bytes(), &[state], MapFlags::ANY)
            .map_err(|err| {
                HookError::Backend(format!("write state map entry for pid {}: {}", pid, err))
            })
    }

    fn remove(&self, pid: u32) -> Result<()> {
        // Exited pids may already be absent; delete failures are not
        // actionable here.
        if let Err(err) = self.map_handle.delete(&pid.to_ne_bytes()) {
            debug!(pid, error = %err, "state map delete skipped");
        }
        Ok(())
    }
}

impl LibbpfRingBufferBackend {
    pub(super) fn new_many(
        elf_paths: &[PathBuf],
        ring_buffer_map: &str,
        state_map: &str,
    ) -> Result<(Self, LibbpfStateMap)> {
        if elf_paths.is_empty() {
            return Err(HookError::Backend("no hook ELF files provided".to_string()));
        }

        let mut loaded = Vec::with_capacity(elf_paths.len());
        for path in elf_paths {
            loaded.push(load_object(path, ring_buffer_map)?);
        }

        let total_attached: usize = loaded.iter().map(|o| o.attached_programs.len()).sum();
        info!(
            objects = loaded.len(),
            attached = total_attached,
            "hook programs attached"
        );

        let state_map = find_state_map(&loaded, state_map)?;
        let drop_counter_sources = collect_drop_counter_sources(&loaded)?;
        let (ring_buffer, records) = build_ring_buffer(&mut loaded, ring_buffer_map)?;

        let backend = Self {
            ring_buffer,
            records,
            drop_counter_sources,
            _loaded: loaded,
        };
        Ok((backend, state_map))
    }
}

/// The state map is as load-bearing as the hooks themselves: without it the
/// programs have nothing to enforce against, so a missing map aborts startup.
fn find_state_map(loaded: &[LoadedObject], name: &str) -> Result<LibbpfStateMap> {
    for loaded_object in loaded {
        for map in loaded_object.object.maps() {
            if map.name() != name {
                continue;
            }
            let map_handle = libbpf_rs::MapHandle::try_from(&map).map_err(|err| {
                HookError::Backend(format!(
                    "clone state map '{}' from '{}': {}",
                    name,
                    loaded_object.path.display(),
                    err
                ))
            })?;
            return Ok(LibbpfStateMap { map_handle });
        }
    }
    Err(HookError::Backend(format!(
        "state map '{}' not found in loaded objects",
        name
    )))
}

/// Load one ELF and attach every program in it. Enforcement hooks are not
/// optional: a hook that cannot attach leaves a syscall class unpoliced, so
/// any attach failure aborts startup.
fn load_object(path: &Path, ring_buffer_map: &str) -> Result<LoadedObject> {
    let object = libbpf_rs::ObjectBuilder::default()
        .open_file(path)
        .map_err(|err| HookError::Backend(format!("open ELF '{}': {}", path.display(), err)))?
        .load()
        .map_err(|err| HookError::Backend(format!("load ELF '{}': {}", path.display(), err)))?;

    let map_exists = object.maps().any(|map| map.name() == ring_buffer_map);
    if !map_exists {
        return Err(HookError::Backend(format!(
            "ring buffer map '{}' missing in '{}'",
            ring_buffer_map,
            path.display()
        )));
    }

    let mut links = Vec::new();
    let mut attached_programs = Vec::new();
    for program in object.progs_mut() {
        let name = program.name().to_string_lossy().into_owned();
        let link = program.attach().map_err(|err| {
            HookError::Backend(format!(
                "attach program '{}' from '{}': {}",
                name,
                path.display(),
                err
            ))
        })?;
        debug!(program = %name, elf = %path.display(), "hook program attached");
        links.push(link);
        attached_programs.push(name);
    }

    if attached_programs.is_empty() {
        return Err(HookError::Backend(format!(
            "no programs found in '{}'",
            path.display()
        )));
    }

    Ok(LoadedObject {
        path: path.to_path_buf(),
        object,
        _links: links,
        attached_programs,
    })
}

impl RingBufferBackend for LibbpfRingBufferBackend {
    fn poll_raw_events(&mut self, timeout: Duration) -> Result<PollBatch> {
        self.ring_buffer
            .poll(timeout)
            .map_err(|err| HookError::Backend(format!("poll ring buffer: {}", err)))?;

        let records = drain_record_sink(&self.records)?;
        let dropped = sample_drop_counters(&mut self.drop_counter_sources)?;

        Ok(PollBatch { records, dropped })
    }
}

fn collect_drop_counter_sources(loaded: &[LoadedObject]) -> Result<Vec<DropCounterSource>> {
    let mut sources = Vec::new();

    for loaded_object in loaded {
        for map in loaded_object.object.maps() {
            let map_name = map.name().to_string_lossy();
            if !is_bss_map_name(&map_name) {
                continue;
            }

            let map_handle = libbpf_rs::MapHandle::try_from(&map).map_err(|err| {
                HookError::Backend(format!(
                    "clone drop-counter map '{}' from '{}': {}",
                    map_name,
                    loaded_object.path.display(),
                    err
                ))
            })?;

            sources.push(DropCounterSource {
                owner_path: loaded_object.path.clone(),
                map_handle,
                last_seen: 0,
            });
        }
    }

    Ok(sources)
}

fn is_bss_map_name(raw: &str) -> bool {
    raw == ".bss" || raw.ends_with(".bss")
}

fn build_ring_buffer(
    loaded: &mut [LoadedObject],
    ring_buffer_map: &str,
) -> Result<(libbpf_rs::RingBuffer<'static>, RecordSink)> {
    struct RingBufferMapSource {
        owner_path: PathBuf,
        map_handle: libbpf_rs::MapHandle,
    }

    let records = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let mut map_sources = Vec::<RingBufferMapSource>::new();

    for loaded_object in loaded {
        for map in loaded_object.object.maps_mut() {
            if map.name() != ring_buffer_map {
                continue;
            }

            let map_handle = libbpf_rs::MapHandle::try_from(&map).map_err(|err| {
                HookError::Backend(format!(
                    "clone ring buffer map '{}' from '{}': {}",
                    ring_buffer_map,
                    loaded_object.path.display(),
                    err
                ))
            })?;

            map_sources.push(RingBufferMapSource {
                owner_path: loaded_object.path.clone(),
                map_handle,
            });
        }
    }

    if map_sources.is_empty() {
        return Err(HookError::Backend(format!(
            "ring buffer map '{}' not found in loaded objects",
            ring_buffer_map
        )));
    }

    let mut builder = libbpf_rs::RingBufferBuilder::new();

    for source in &map_sources {
        let records_sink = Arc::clone(&records);
        builder
            .add(&source.map_handle, move |raw| {
                if let Ok(mut guard) = records_sink.lock() {
                    guard.push(raw.to_vec());
                }
                0
            })
            .map_err(|err| {
                HookError::Backend(format!(
                    "add ring buffer callback for '{}': {}",
                    source.owner_path.display(),
                    err
                ))
            })?;
    }

    let ring_buffer = builder
        .build()
        .map_err(|err| HookError::Backend(format!("build ring buffer: {}", err)))?;

    Ok((ring_buffer, records))
}

fn drain_record_sink(records: &RecordSink) -> Result<Vec<Vec<u8>>> {
    let mut guard = records
        .lock()
        .map_err(|_| HookError::Backend("failed to collect ring buffer records".to_string()))?;
    Ok(std::mem::take(&mut *guard))
}

/// The hook programs keep a monotonically increasing u64 overflow counter at
/// the head of their .bss map. Userspace samples the delta every poll.
fn sample_drop_counters(sources: &mut [DropCounterSource]) -> Result<u64> {
    let mut dropped = 0u64;

    for source in sources {
        let key = 0u32.to_ne_bytes();
        let value = source
            .map_handle
            .lookup(&key, MapFlags::ANY)
            .map_err(|err| {
                HookError::Backend(format!(
                    "read drop-counter map from '{}': {}",
                    source.owner_path.display(),
                    err
                ))
            })?;

        let Some(raw) = value else {
            continue;
        };

        let Some(total) = parse_dropped_total(&raw) else {
            continue;
        };

        let delta = total.saturating_sub(source.last_seen);
        source.last_seen = total;
        dropped = dropped.saturating_add(delta);
    }

    Ok(dropped)
}

fn parse_dropped_total(raw: &[u8]) -> Option<u64> {
    let bytes = raw.get(0..8)?;
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    Some(u64::from_le_bytes(out))
}
