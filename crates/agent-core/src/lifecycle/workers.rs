use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use platform_linux::{EventReceiver, HookEvent};
use tracing::{debug, info, trace};

use super::processor::EventProcessor;

const WORKER_QUEUE_CAPACITY: usize = 1_024;
const RECV_TICK: Duration = Duration::from_millis(100);

/// Routes events to scoring workers: `pid % worker_count`, so all events
/// for one pid land on one worker and its window updates and escalations
/// stay ordered.
#[derive(Clone)]
pub struct EventRouter {
    senders: Vec<SyncSender<HookEvent>>,
}

impl EventRouter {
    /// Route one event to its pid's worker. Blocks only against the
    /// worker's own bounded queue; the hook-side sink has already
    /// decoupled us from the kernel.
    pub fn dispatch(&self, event: HookEvent) {
        let index = (event.pid as usize) % self.senders.len();
        match self.senders[index].try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                // Backpressure: wait for the slow worker rather than
                // silently losing an ordered event for its pid.
                let _ = self.senders[index].send(event);
            }
            Err(TrySendError::Disconnected(event)) => {
                trace!(pid = event.pid, "worker gone, event discarded");
            }
        }
    }
}

/// The scoring worker threads and their queues.
pub struct WorkerPool {
    router: EventRouter,
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn spawn(
        worker_count: usize,
        processor: Arc<EventProcessor>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let (tx, rx) = sync_channel::<HookEvent>(WORKER_QUEUE_CAPACITY);
            senders.push(tx);
            let processor = Arc::clone(&processor);
            let shutdown = Arc::clone(&shutdown);
            let handle = std::thread::Builder::new()
                .name(format!("score-{}", index))
                .spawn(move || worker_loop(index, rx, processor, shutdown))
                .unwrap_or_else(|err| panic!("spawning scoring worker: {}", err));
            handles.push(handle);
        }

        Self {
            router: EventRouter { senders },
            handles,
            shutdown,
        }
    }

    pub fn router(&self) -> EventRouter {
        self.router.clone()
    }

    /// Signal shutdown and join every worker. The dispatcher must already
    /// have stopped, or its router clone keeps the queues open.
    pub fn join(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.router);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    index: usize,
    rx: Receiver<HookEvent>,
    processor: Arc<EventProcessor>,
    shutdown: Arc<AtomicBool>,
) {
    debug!(worker = index, "scoring worker started");
    loop {
        match rx.recv_timeout(RECV_TICK) {
            Ok(event) => {
                processor.process(&event);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(worker = index, "scoring worker stopped");
}

/// Pump the bounded sink into the worker queues until shutdown.
pub fn spawn_dispatcher(
    receiver: EventReceiver,
    router: EventRouter,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("dispatch".to_string())
        .spawn(move || {
            loop {
                match receiver.recv_timeout(RECV_TICK) {
                    Some(event) => router.dispatch(event),
                    None => {
                        if shutdown.load(Ordering::SeqCst) {
                            // Drain what is already queued before exiting.
                            for event in receiver.drain() {
                                router.dispatch(event);
                            }
                            break;
                        }
                    }
                }
            }
            info!("dispatcher stopped");
        })
        .unwrap_or_else(|err| panic!("spawning dispatcher: {}", err))
}
