use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anomaly::{BaselineStore, MahalanobisScorer, ScorerRegistry, WindowTable};
use anyhow::Context;
use budget::Bucket;
use escalation::{ContainState, EscalationEngine, SqliteLedger};
use operator::OperatorServer;
use platform_linux::{
    BoundedEventSink, EnforcementGate, EventReceiver, HookEngine, KernelStateMap,
};
use quorum::QuorumStore;
use response::{NixSignalSender, ProcfsIntrospector, ProtectedList, ResponseActuator};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::clock::{boot_to_unix_offset_ns, unix_ns};
use crate::config::AgentConfig;
use crate::handler::EngineOverrideHandler;

use super::ingest::spawn_poller;
use super::processor::{EventProcessor, ProcfsIdentityResolver};
use super::workers::{spawn_dispatcher, WorkerPool};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Owns every component of the agent and runs them to completion.
pub struct AgentRuntime {
    config: AgentConfig,
    engine: Arc<EscalationEngine>,
    actuator: Arc<ResponseActuator>,
    gate: Arc<EnforcementGate>,
    store: Arc<BaselineStore>,
    quorum: Arc<QuorumStore>,
    bucket: Arc<Bucket>,
    processor: Arc<EventProcessor>,
    state_map: Arc<dyn KernelStateMap>,
    sink: BoundedEventSink,
    receiver: Option<EventReceiver>,
    hook_engine: Option<HookEngine>,
    shutdown: Arc<AtomicBool>,
}

impl AgentRuntime {
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_root).with_context(|| {
            format!("creating data root {}", config.data_root.display())
        })?;

        let ledger = SqliteLedger::open(&config.ledger_path).with_context(|| {
            format!("opening decision ledger {}", config.ledger_path.display())
        })?;
        ledger
            .prune_older_than(config.retention_days, unix_ns())
            .context("pruning decision ledger")?;

        let bucket = Arc::new(Bucket::new(
            config.budget_capacity,
            config.budget_refill_period(),
        ));
        let engine = Arc::new(EscalationEngine::new(
            config.node_id.clone(),
            Box::new(ledger),
            Arc::clone(&bucket),
            config.tunables(),
        ));
        let gate = Arc::new(EnforcementGate::new(engine.shared_table()));

        let store = Arc::new(
            BaselineStore::load_or_new(&config.baseline_path).with_context(|| {
                format!("loading baselines {}", config.baseline_path.display())
            })?,
        );
        info!(baselines = store.len(), "baseline store loaded");

        let quorum = Arc::new(QuorumStore::new(config.quorum_min, config.quorum_ttl()));

        let mut protected = ProtectedList::default_linux();
        for name in &config.protected_processes {
            protected.add(name.clone());
        }
        let actuator = Arc::new(ResponseActuator::new(
            protected,
            Box::new(ProcfsIntrospector),
            Box::new(NixSignalSender),
            config.dry_run,
        ));

        let windows = WindowTable::new(
            config.window_table_pids,
            config.window_ns(),
            config.window_max_events,
        );
        let scorers = ScorerRegistry::default().with_scorer(Box::new(MahalanobisScorer {
            entropy_weight: config.entropy_weight,
            min_samples: config.min_baseline_samples,
        }));
        scorers
            .resolve(&config.scorer)
            .map_err(|err| anyhow::anyhow!("{}", err))
            .context("selecting anomaly scorer")?;

        // The hook engine moves into the poll thread; the state-map handle
        // stays behind so escalation, decay, and operator paths can mirror
        // every transition into the kernel.
        let hook_engine = build_hook_engine(&config)?;
        let state_map = hook_engine.state_map();

        let processor = Arc::new(EventProcessor::new(
            config.node_id.clone(),
            windows,
            Arc::clone(&store),
            scorers,
            config.scorer.clone(),
            Arc::clone(&quorum),
            Arc::clone(&engine),
            Arc::clone(&actuator),
            Arc::clone(&state_map),
            Box::new(ProcfsIdentityResolver),
            config.threshold_pressure,
            boot_to_unix_offset_ns(),
        ));

        let (sink, receiver) = BoundedEventSink::new(config.sink_capacity);

        Ok(Self {
            config,
            engine,
            actuator,
            gate,
            store,
            quorum,
            bucket,
            processor,
            state_map,
            sink,
            receiver: Some(receiver),
            hook_engine: Some(hook_engine),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    #[cfg(test)]
    pub fn engine(&self) -> &Arc<EscalationEngine> {
        &self.engine
    }

    #[cfg(test)]
    pub fn gate(&self) -> &Arc<EnforcementGate> {
        &self.gate
    }

    /// Run until SIGINT/SIGTERM, then shut down in order: stop ingestion,
    /// drain the pipeline, thaw anything still suspended, persist baselines.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let hook_engine = self
            .hook_engine
            .take()
            .context("runtime already consumed")?;
        let receiver = self.receiver.take().context("runtime already consumed")?;

        let report = platform_linux::ebpf::capability_report(&hook_engine.stats());
        info!(?report, "kernel capabilities");

        let poller = spawn_poller(
            hook_engine,
            self.sink.clone(),
            Duration::from_millis(self.config.poll_interval_ms.max(1)),
            Arc::clone(&self.shutdown),
        );
        let pool = WorkerPool::spawn(
            self.config.worker_count,
            Arc::clone(&self.processor),
            Arc::clone(&self.shutdown),
        );
        let dispatcher = spawn_dispatcher(receiver, pool.router(), Arc::clone(&self.shutdown));

        let handler = Arc::new(EngineOverrideHandler::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.actuator),
            Arc::clone(&self.state_map),
        ));
        let server = OperatorServer::bind(&self.config.socket_path, handler)?;
        let server_task = tokio::spawn(async move {
            if let Err(err) = server.serve().await {
                error!(error = %err, "operator server exited");
            }
        });

        let mut decay_tick =
            tokio::time::interval(Duration::from_secs(self.config.decay_interval_secs.max(1)));
        let mut prune_tick =
            tokio::time::interval(Duration::from_secs(self.config.quorum_prune_secs.max(1)));
        let mut save_tick =
            tokio::time::interval(Duration::from_secs(self.config.baseline_save_secs.max(1)));
        let mut stats_tick = tokio::time::interval(STATS_INTERVAL);
        let mut sighup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

        info!(node_id = %self.config.node_id, "agent running");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("SIGINT received, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    self.reload_tunables();
                }
                _ = decay_tick.tick() => {
                    self.run_decay();
                    self.reap_exited();
                }
                _ = prune_tick.tick() => {
                    let removed = self.quorum.prune();
                    if removed > 0 {
                        info!(removed, "quorum identities expired");
                    }
                }
                _ = save_tick.tick() => {
                    if let Err(err) = self.store.save() {
                        warn!(error = %err, "baseline save failed");
                    }
                }
                _ = stats_tick.tick() => {
                    self.log_stats();
                }
            }
        }

        self.shutdown.store(true, Ordering::SeqCst);
        let _ = poller.join();
        let _ = dispatcher.join();
        pool.join();
        server_task.abort();

        self.thaw_suspended();
        if let Err(err) = self.store.save() {
            warn!(error = %err, "final baseline save failed");
        }
        info!("agent stopped");
        Ok(())
    }

    /// Re-read the configuration file and swap the engine tunables. Runtime
    /// shape (workers, paths, channels) needs a restart.
    fn reload_tunables(&self) {
        self.apply_reloaded(AgentConfig::load());
    }

    /// A reload that fails to parse or validate leaves the running tunables
    /// untouched.
    pub(crate) fn apply_reloaded(&self, fresh: anyhow::Result<AgentConfig>) {
        match fresh {
            Ok(fresh) => {
                self.engine.update_tunables(fresh.tunables());
                info!("tunables reloaded on SIGHUP");
            }
            Err(err) => {
                warn!(error = %err, "SIGHUP reload rejected, keeping current tunables");
            }
        }
    }

    fn run_decay(&self) {
        match self.engine.decay_tick(unix_ns()) {
            Ok(transitions) => {
                for (pid, from, to) in transitions {
                    if let Err(err) = self.state_map.write_state(pid, to.as_byte()) {
                        warn!(pid, to = %to, error = %err, "kernel state map write failed");
                    }
                    if let Err(err) = self.actuator.apply(pid, from, to) {
                        warn!(pid, from = %from, to = %to, error = %err,
                            "decay response action failed");
                    }
                }
            }
            Err(err) => warn!(error = %err, "decay sweep failed"),
        }
    }

    /// Drop table entries for pids that no longer exist.
    fn reap_exited(&self) {
        for pid in self.engine.operator_list() {
            if !platform_linux::process_alive(pid) {
                if let Some(status) = self.engine.process_exit(pid) {
                    info!(pid, state = %status.state, "tracked process exited");
                }
                if let Err(err) = self.state_map.remove(pid) {
                    warn!(pid, error = %err, "kernel state map cleanup failed");
                }
                self.processor.forget_pid(pid);
            }
        }
    }

    /// Leave no process stopped once the agent is gone.
    fn thaw_suspended(&self) {
        for pid in self.engine.operator_list() {
            let Ok(status) = self.engine.operator_status(pid) else {
                continue;
            };
            if status.state >= ContainState::Frozen && !status.state.is_terminal() {
                if let Err(err) = self.actuator.thaw(pid) {
                    warn!(pid, error = %err, "thaw on shutdown failed");
                }
            }
        }
    }

    fn log_stats(&self) {
        let sink = self.sink.stats();
        let gate = self.gate.stats();
        info!(
            events_accepted = sink.accepted,
            events_dropped = sink.dropped,
            gate_decisions = gate.decisions,
            gate_denials = gate.denials,
            tracked_pids = self.engine.table().len(),
            baselines = self.store.len(),
            quorum_identities = self.quorum.tracked_identities(),
            budget_remaining = self.bucket.remaining(),
            "agent stats"
        );
    }
}

fn build_hook_engine(config: &AgentConfig) -> anyhow::Result<HookEngine> {
    if let Some(replay_path) = &config.replay_path {
        info!(path = %replay_path.display(), "ingesting events from replay file");
        return HookEngine::from_replay(replay_path)
            .with_context(|| format!("opening replay source {}", replay_path.display()));
    }
    if !config.hooks_enabled {
        warn!("live hooks disabled, agent is observe-only with no event source");
        return Ok(HookEngine::disabled());
    }
    HookEngine::from_elfs(
        &config.hook_elf_paths,
        &config.ring_buffer_map,
        &config.state_map,
    )
    .context("attaching kernel hooks")
}
