use std::sync::Arc;

use anomaly::{BaselineStore, EventKind, IntegrityTracker, Scorer, ScorerRegistry, WindowTable};
use escalation::{EscalationEngine, Outcome};
use platform_linux::{HookEvent, HookKind, KernelStateMap};
use quorum::QuorumStore;
use response::ResponseActuator;
use tracing::{debug, warn};

/// How a pid maps to a binary identity and an executable hash. Procfs in
/// production; fixtures in tests.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, pid: u32) -> ProcessIdentity;
}

#[derive(Debug, Clone)]
pub struct ProcessIdentity {
    /// Key for baselines and quorum reports. The executable hash when the
    /// binary is readable, a per-pid fallback otherwise.
    pub identity: String,
    pub exe_hash: Option<String>,
}

pub struct ProcfsIdentityResolver;

impl IdentityResolver for ProcfsIdentityResolver {
    fn resolve(&self, pid: u32) -> ProcessIdentity {
        match anomaly::hash_process_executable(pid) {
            Ok(hash) => ProcessIdentity {
                identity: hash.clone(),
                exe_hash: Some(hash),
            },
            // Short-lived or already-exited processes still get scored
            // against a pid-local baseline; they just cannot corroborate.
            Err(_) => ProcessIdentity {
                identity: platform_linux::resolve_exe_path(pid)
                    .unwrap_or_else(|| format!("pid-{}", pid)),
                exe_hash: None,
            },
        }
    }
}

/// The synchronous per-event pipeline a scoring worker runs: feature
/// window, integrity check, anomaly score, baseline update, quorum
/// report, escalation decision, containment action.
pub struct EventProcessor {
    node_id: String,
    windows: WindowTable,
    integrity: IntegrityTracker,
    store: Arc<BaselineStore>,
    scorers: ScorerRegistry,
    scorer_name: String,
    quorum: Arc<QuorumStore>,
    engine: Arc<EscalationEngine>,
    actuator: Arc<ResponseActuator>,
    state_map: Arc<dyn KernelStateMap>,
    resolver: Box<dyn IdentityResolver>,
    /// Local anomaly score at which this node reports the binary into the
    /// quorum store.
    flag_threshold: f64,
    /// Rebases kernel event timestamps onto the unix clock before they
    /// reach the engine and its ledger.
    ts_offset_ns: u64,
}

impl EventProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: impl Into<String>,
        windows: WindowTable,
        store: Arc<BaselineStore>,
        scorers: ScorerRegistry,
        scorer_name: impl Into<String>,
        quorum: Arc<QuorumStore>,
        engine: Arc<EscalationEngine>,
        actuator: Arc<ResponseActuator>,
        state_map: Arc<dyn KernelStateMap>,
        resolver: Box<dyn IdentityResolver>,
        flag_threshold: f64,
        ts_offset_ns: u64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            windows,
            integrity: IntegrityTracker::new(),
            store,
            scorers,
            scorer_name: scorer_name.into(),
            quorum,
            engine,
            actuator,
            state_map,
            resolver,
            flag_threshold,
            ts_offset_ns,
        }
    }

    /// Run the full pipeline for one hook event and return the engine's
    /// decision, or `None` when the event could not be scored.
    pub fn process(&self, event: &HookEvent) -> Option<Outcome> {
        let kind = event_kind(event.kind);
        let (features, counts) = self.windows.observe(event.pid, event.ts_ns, kind);

        let identity = self.resolver.resolve(event.pid);
        let integrity_signal = match identity.exe_hash.as_deref() {
            Some(hash) => self.integrity.observe(event.pid, hash),
            None => 0.0,
        };

        let baseline = self.store.get(&identity.identity);
        let score = match self
            .scorers
            .resolve(&self.scorer_name)
            .and_then(|scorer| scorer.score(&features, &counts, baseline.as_ref()))
        {
            Ok(score) => score,
            Err(err) => {
                warn!(pid = event.pid, error = %err, "scoring failed, event skipped");
                return None;
            }
        };

        // The event that was just scored also trains the baseline, so the
        // profile tracks drift in benign behaviour.
        self.store
            .update(&identity.identity, &features, kind.index());

        if score.value >= self.flag_threshold {
            self.quorum
                .record(&identity.identity, &self.node_id, score.value);
        }
        let quorum_signal = self.quorum.signal(&identity.identity);

        let outcome = match self.engine.evaluate(
            event.pid,
            score.value,
            quorum_signal,
            integrity_signal,
            event.ts_ns.saturating_add(self.ts_offset_ns),
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(pid = event.pid, error = %err, "escalation evaluation failed");
                return None;
            }
        };

        if let Outcome::Escalated { from, to, .. } = outcome {
            // The hooks enforce off the kernel map, not the userspace
            // table; an unmirrored transition is invisible to them.
            if let Err(err) = self.state_map.write_state(event.pid, to.as_byte()) {
                warn!(pid = event.pid, to = %to, error = %err, "kernel state map write failed");
            }
            match self.actuator.apply(event.pid, from, to) {
                Ok(report) => {
                    debug!(
                        pid = event.pid,
                        from = %from,
                        to = %to,
                        action = ?report.action,
                        "containment applied"
                    );
                }
                Err(err) => {
                    warn!(pid = event.pid, from = %from, to = %to, error = %err,
                        "containment action failed");
                }
            }
        }

        Some(outcome)
    }

    /// Forget per-pid scoring state once the process is gone. Baselines
    /// are per-binary and survive.
    pub fn forget_pid(&self, pid: u32) {
        self.integrity.remove(pid);
    }
}

fn event_kind(kind: HookKind) -> EventKind {
    match kind {
        HookKind::Connect => EventKind::Connect,
        HookKind::FileOpen => EventKind::FileOpen,
        HookKind::SetUid => EventKind::SetUid,
    }
}
