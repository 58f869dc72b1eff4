use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::warn;

/// Content hash of a process's executable, used both as the baseline
/// identity key and for drift detection.
pub fn hash_executable(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Resolve and hash a live process's binary via procfs.
pub fn hash_process_executable(pid: u32) -> std::io::Result<String> {
    hash_executable(format!("/proc/{}/exe", pid))
}

/// Pins the first executable hash seen for each pid and reports drift.
/// A changed hash on a live pid means the binary on disk was replaced,
/// which feeds the integrity term of the severity blend.
#[derive(Debug, Default)]
pub struct IntegrityTracker {
    first_seen: Mutex<HashMap<u32, String>>,
}

impl IntegrityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash for a pid and return the integrity signal:
    /// 0.0 while the hash matches the first observation, 1.0 once it
    /// diverges. Divergence is sticky for the life of the pid.
    pub fn observe(&self, pid: u32, exe_hash: &str) -> f64 {
        let mut first_seen = self.first_seen.lock().unwrap_or_else(|e| e.into_inner());
        match first_seen.get(&pid) {
            None => {
                first_seen.insert(pid, exe_hash.to_string());
                0.0
            }
            Some(pinned) if pinned == exe_hash => 0.0,
            Some(pinned) => {
                warn!(pid, pinned = %pinned, current = %exe_hash, "executable hash drift");
                1.0
            }
        }
    }

    pub fn pinned_hash(&self, pid: u32) -> Option<String> {
        self.first_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pid)
            .cloned()
    }

    pub fn remove(&self, pid: u32) {
        self.first_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pid);
    }

    pub fn len(&self) -> usize {
        self.first_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
