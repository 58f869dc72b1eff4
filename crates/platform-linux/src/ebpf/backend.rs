use std::time::Duration;

use super::types::{PollBatch, Result};

pub(super) trait RingBufferBackend: Send {
    fn poll_raw_events(&mut self, timeout: Duration) -> Result<PollBatch>;
}

#[derive(Default)]
pub(super) struct NoopRingBufferBackend;

impl RingBufferBackend for NoopRingBufferBackend {
    fn poll_raw_events(&mut self, _timeout: Duration) -> Result<PollBatch> {
        Ok(PollBatch::default())
    }
}
