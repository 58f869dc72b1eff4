use std::path::Path;
use std::time::Duration;

use tracing::warn;

use super::backend::RingBufferBackend;
use super::replay_codec::encode_replay_event;
use super::types::{HookError, PollBatch, Result};

/// Maximum lines to yield per poll so a large replay file feeds the pipeline
/// gradually instead of in one burst.
const REPLAY_BATCH_LIMIT: usize = 64;

pub(super) struct ReplayBackend {
    reader: std::io::BufReader<std::fs::File>,
}

impl ReplayBackend {
    pub(super) fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            HookError::Backend(format!("open replay file '{}': {}", path.display(), e))
        })?;
        Ok(Self {
            reader: std::io::BufReader::new(file),
        })
    }
}

impl RingBufferBackend for ReplayBackend {
    fn poll_raw_events(&mut self, _timeout: Duration) -> Result<PollBatch> {
        use std::io::BufRead;

        let mut records = Vec::new();
        while records.len() < REPLAY_BATCH_LIMIT {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(HookError::Backend(format!("replay read: {}", e)));
                }
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match encode_replay_event(trimmed) {
                Ok(raw) => records.push(raw),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable replay line");
                }
            }
        }
        Ok(PollBatch {
            records,
            dropped: 0,
        })
    }
}
