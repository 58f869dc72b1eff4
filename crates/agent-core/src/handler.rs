//! Bridges the operator socket to the escalation engine. The server is
//! transport only; every command lands here, and every state change it
//! causes flows through the same engine entry points the automatic path
//! uses, so operator actions are ledgered like any other decision.

use std::sync::Arc;

use escalation::{ContainState, EscalationEngine};
use operator::{Command, OverrideHandler, Request, Response};
use platform_linux::KernelStateMap;
use response::ResponseActuator;
use tracing::{info, warn};

pub struct EngineOverrideHandler {
    engine: Arc<EscalationEngine>,
    actuator: Arc<ResponseActuator>,
    state_map: Arc<dyn KernelStateMap>,
}

impl EngineOverrideHandler {
    pub fn new(
        engine: Arc<EscalationEngine>,
        actuator: Arc<ResponseActuator>,
        state_map: Arc<dyn KernelStateMap>,
    ) -> Self {
        Self {
            engine,
            actuator,
            state_map,
        }
    }

    fn mirror_state(&self, pid: u32, state: ContainState) {
        if let Err(err) = self.state_map.write_state(pid, state.as_byte()) {
            warn!(pid, state = %state, error = %err, "kernel state map write failed");
        }
    }

    fn require_pid(request: &Request) -> Result<u32, Response> {
        request
            .pid
            .ok_or_else(|| Response::failure("command requires a pid"))
    }

    fn reset(&self, request: &Request) -> Response {
        let pid = match Self::require_pid(request) {
            Ok(pid) => pid,
            Err(response) => return response,
        };
        let prev = match self.engine.operator_reset(pid, crate::clock::unix_ns()) {
            Ok(prev) => prev,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.mirror_state(pid, ContainState::Normal);
        // A reset pid that was frozen must be runnable again.
        if prev >= ContainState::Frozen && !prev.is_terminal() {
            if let Err(err) = self.actuator.thaw(pid) {
                warn!(pid, error = %err, "thaw after reset failed");
            }
        }
        info!(pid, prev = %prev, "operator reset");
        Response {
            ok: true,
            pid: Some(pid),
            prev_state: Some(prev.to_string()),
            state: Some(ContainState::Normal.to_string()),
            ..Response::default()
        }
    }

    fn pin(&self, request: &Request) -> Response {
        let pid = match Self::require_pid(request) {
            Ok(pid) => pid,
            Err(response) => return response,
        };
        let Some(name) = request.state.as_deref() else {
            return Response::failure("pin requires a state");
        };
        let Some(state) = ContainState::parse(name) else {
            return Response::failure(format!("unknown state: {}", name));
        };
        let prev = match self.engine.operator_pin(pid, state, crate::clock::unix_ns()) {
            Ok(prev) => prev,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.mirror_state(pid, state);
        if let Err(err) = self.actuator.apply(pid, prev, state) {
            warn!(pid, error = %err, "response action for pin failed");
        }
        info!(pid, prev = %prev, state = %state, "operator pin");
        Response {
            ok: true,
            pid: Some(pid),
            prev_state: Some(prev.to_string()),
            state: Some(state.to_string()),
            pinned: Some(true),
            ..Response::default()
        }
    }

    fn unpin(&self, request: &Request) -> Response {
        let pid = match Self::require_pid(request) {
            Ok(pid) => pid,
            Err(response) => return response,
        };
        match self.engine.operator_unpin(pid, crate::clock::unix_ns()) {
            Ok(state) => {
                info!(pid, state = %state, "operator unpin");
                Response {
                    ok: true,
                    pid: Some(pid),
                    state: Some(state.to_string()),
                    pinned: Some(false),
                    ..Response::default()
                }
            }
            Err(err) => Response::failure(err.to_string()),
        }
    }

    fn status(&self, request: &Request) -> Response {
        let pid = match Self::require_pid(request) {
            Ok(pid) => pid,
            Err(response) => return response,
        };
        match self.engine.operator_status(pid) {
            Ok(status) => Response {
                ok: true,
                pid: Some(pid),
                state: Some(status.state.to_string()),
                pinned: Some(status.pinned.is_some()),
                pressure: Some(status.pressure),
                ..Response::default()
            },
            Err(err) => Response::failure(err.to_string()),
        }
    }

    fn list(&self) -> Response {
        Response {
            ok: true,
            pids: Some(self.engine.operator_list()),
            ..Response::default()
        }
    }
}

impl OverrideHandler for EngineOverrideHandler {
    fn handle(&self, request: Request) -> Response {
        match request.command {
            Command::Reset => self.reset(&request),
            Command::Pin => self.pin(&request),
            Command::Unpin => self.unpin(&request),
            Command::Status => self.status(&request),
            Command::List => self.list(),
        }
    }
}
