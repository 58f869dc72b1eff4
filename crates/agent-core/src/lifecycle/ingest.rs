use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use platform_linux::{BoundedEventSink, HookEngine};
use tracing::{debug, warn};

/// Drive the hook engine's poll loop on a dedicated thread, pushing decoded
/// events into the bounded sink. The sink never blocks, so a slow scoring
/// side can only ever cost events, not stall the ring buffer.
pub fn spawn_poller(
    mut engine: HookEngine,
    sink: BoundedEventSink,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("hook-poll".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                match engine.poll_once(poll_interval) {
                    Ok(events) => {
                        if events.is_empty() {
                            // Replay sources return immediately at EOF, so
                            // pace the loop ourselves.
                            std::thread::sleep(poll_interval);
                            continue;
                        }
                        for event in events {
                            sink.offer(event);
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "hook poll failed");
                        std::thread::sleep(poll_interval);
                    }
                }
            }
            debug!("hook poller stopped");
        })
        .unwrap_or_else(|err| panic!("spawning hook poller: {}", err))
}
