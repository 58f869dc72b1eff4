use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::types::{EventKind, EVENT_KIND_COUNT, FEATURE_DIM};

const DEFAULT_WINDOW_NS: u64 = 10_000_000_000;
const DEFAULT_MAX_EVENTS: usize = 256;
const DEFAULT_TABLE_CAPACITY: usize = 4096;

/// Sliding window of recent events for one pid. Feature extraction turns
/// the window into the rate vector the scorers consume.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    events: VecDeque<(u64, EventKind)>,
    window_ns: u64,
    max_events: usize,
}

impl FeatureWindow {
    pub fn new(window_ns: u64, max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(64)),
            window_ns: window_ns.max(1),
            max_events: max_events.max(1),
        }
    }

    pub fn push(&mut self, ts_ns: u64, kind: EventKind) {
        self.events.push_back((ts_ns, kind));
        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
        self.evict(ts_ns);
    }

    fn evict(&mut self, now_ns: u64) {
        let floor = now_ns.saturating_sub(self.window_ns);
        while let Some(&(ts, _)) = self.events.front() {
            if ts >= floor {
                break;
            }
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Per-kind counts of the events currently inside the window.
    pub fn kind_counts(&self) -> [u64; EVENT_KIND_COUNT] {
        let mut counts = [0u64; EVENT_KIND_COUNT];
        for &(_, kind) in &self.events {
            counts[kind.index()] += 1;
        }
        counts
    }

    /// Rate feature vector: events per second for each kind plus the total
    /// rate, measured over the window span.
    pub fn features(&self) -> [f64; FEATURE_DIM] {
        let mut out = [0.0; FEATURE_DIM];
        let span_secs = self.window_ns as f64 / 1e9;
        let counts = self.kind_counts();
        let mut total = 0u64;
        for (i, &c) in counts.iter().enumerate() {
            out[i] = c as f64 / span_secs;
            total += c;
        }
        out[EVENT_KIND_COUNT] = total as f64 / span_secs;
        out
    }
}

impl Default for FeatureWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_NS, DEFAULT_MAX_EVENTS)
    }
}

/// Per-pid windows with a hard capacity bound. Short-lived pids churn
/// constantly, so the table evicts least-recently-touched entries instead
/// of growing without bound.
pub struct WindowTable {
    windows: Mutex<LruCache<u32, FeatureWindow>>,
    window_ns: u64,
    max_events: usize,
}

impl WindowTable {
    pub fn new(capacity: usize, window_ns: u64, max_events: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            windows: Mutex::new(LruCache::new(capacity)),
            window_ns,
            max_events,
        }
    }

    /// Record an event and return the refreshed features and kind counts
    /// for the pid in one lock acquisition.
    pub fn observe(
        &self,
        pid: u32,
        ts_ns: u64,
        kind: EventKind,
    ) -> ([f64; FEATURE_DIM], [u64; EVENT_KIND_COUNT]) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows
            .get_or_insert_mut(pid, || FeatureWindow::new(self.window_ns, self.max_events));
        window.push(ts_ns, kind);
        (window.features(), window.kind_counts())
    }

    pub fn remove(&self, pid: u32) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop(&pid);
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WindowTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_CAPACITY, DEFAULT_WINDOW_NS, DEFAULT_MAX_EVENTS)
    }
}
