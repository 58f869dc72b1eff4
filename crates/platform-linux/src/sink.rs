use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use tracing::trace;

use crate::HookEvent;

pub const DEFAULT_SINK_CAPACITY: usize = 8_192;

#[derive(Debug, Default, Clone)]
pub struct SinkStats {
    pub accepted: u64,
    pub dropped: u64,
}

/// Bounded handoff between the hook poll loop and the scoring workers.
/// `offer` never blocks: when the channel is full the event is counted as
/// dropped and discarded, because stalling the poll loop would back-pressure
/// into the kernel ring buffer and stall hook callbacks.
pub struct BoundedEventSink {
    tx: SyncSender<HookEvent>,
    accepted: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

pub struct EventReceiver {
    rx: Receiver<HookEvent>,
}

impl BoundedEventSink {
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (
            Self {
                tx,
                accepted: Arc::new(AtomicU64::new(0)),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            EventReceiver { rx },
        )
    }

    /// Non-blocking enqueue. Returns false when the event was dropped.
    pub fn offer(&self, event: HookEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(pid = event.pid, kind = event.kind.name(), "event channel full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Clone for BoundedEventSink {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            accepted: Arc::clone(&self.accepted),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl EventReceiver {
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<HookEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<HookEvent> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<HookEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}
