use std::collections::HashMap;
use std::sync::Mutex;

use escalation::ContainState;

use super::actuator::{action_for_transition, ContainAction, ResponseActuator};
use super::errors::{ResponseError, ResponseResult};
use super::signal::{ProcessIntrospector, Signal, SignalSender};
use super::ProtectedList;

#[derive(Default)]
struct FakeIntrospector {
    children: HashMap<u32, Vec<u32>>,
    names: HashMap<u32, String>,
}

impl ProcessIntrospector for FakeIntrospector {
    fn children_of(&self, pid: u32) -> Vec<u32> {
        self.children.get(&pid).cloned().unwrap_or_default()
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.names.get(&pid).cloned()
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(u32, Signal)>>,
}

impl SignalSender for RecordingSender {
    fn send(&self, pid: u32, signal: Signal) -> ResponseResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((pid, signal));
        Ok(())
    }
}

fn actuator_with(
    introspector: FakeIntrospector,
    dry_run: bool,
) -> (ResponseActuator, std::sync::Arc<Mutex<Vec<(u32, Signal)>>>) {
    let sent = std::sync::Arc::new(Mutex::new(Vec::new()));

    struct SharedSender(std::sync::Arc<Mutex<Vec<(u32, Signal)>>>);
    impl SignalSender for SharedSender {
        fn send(&self, pid: u32, signal: Signal) -> ResponseResult<()> {
            self.0
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((pid, signal));
            Ok(())
        }
    }

    let actuator = ResponseActuator::new(
        ProtectedList::default_linux(),
        Box::new(introspector),
        Box::new(SharedSender(std::sync::Arc::clone(&sent))),
        dry_run,
    );
    (actuator, sent)
}

#[test]
fn transition_to_frozen_suspends() {
    assert_eq!(
        action_for_transition(ContainState::Isolated, ContainState::Frozen),
        ContainAction::Suspend
    );
    assert_eq!(
        action_for_transition(ContainState::Normal, ContainState::Quarantined),
        ContainAction::Suspend
    );
}

#[test]
fn transition_to_terminated_kills() {
    assert_eq!(
        action_for_transition(ContainState::Quarantined, ContainState::Terminated),
        ContainAction::KillTree
    );
    assert_eq!(
        action_for_transition(ContainState::Normal, ContainState::Terminated),
        ContainAction::KillTree
    );
}

#[test]
fn decay_out_of_frozen_resumes() {
    assert_eq!(
        action_for_transition(ContainState::Frozen, ContainState::Isolated),
        ContainAction::Resume
    );
    assert_eq!(
        action_for_transition(ContainState::Quarantined, ContainState::Normal),
        ContainAction::Resume
    );
}

#[test]
fn lower_tiers_need_no_signal() {
    assert_eq!(
        action_for_transition(ContainState::Normal, ContainState::Pressure),
        ContainAction::None
    );
    assert_eq!(
        action_for_transition(ContainState::Pressure, ContainState::Isolated),
        ContainAction::None
    );
    assert_eq!(
        action_for_transition(ContainState::Frozen, ContainState::Quarantined),
        ContainAction::None
    );
}

#[test]
fn suspend_sends_sigstop() {
    let (actuator, sent) = actuator_with(FakeIntrospector::default(), false);
    let report = actuator
        .apply(500, ContainState::Isolated, ContainState::Frozen)
        .unwrap();

    assert_eq!(report.action, ContainAction::Suspend);
    assert_eq!(report.signalled_pids, vec![500]);
    assert_eq!(
        *sent.lock().unwrap(),
        vec![(500, Signal::SIGSTOP)]
    );
}

#[test]
fn kill_tree_stops_root_then_kills_deepest_first() {
    let mut introspector = FakeIntrospector::default();
    introspector.children.insert(100, vec![101]);
    introspector.children.insert(101, vec![102]);

    let (actuator, sent) = actuator_with(introspector, false);
    let report = actuator
        .apply(100, ContainState::Quarantined, ContainState::Terminated)
        .unwrap();

    assert_eq!(report.signalled_pids, vec![102, 101, 100]);
    assert_eq!(
        *sent.lock().unwrap(),
        vec![
            (100, Signal::SIGSTOP),
            (102, Signal::SIGKILL),
            (101, Signal::SIGKILL),
            (100, Signal::SIGKILL),
        ]
    );
}

#[test]
fn protected_descendants_are_skipped() {
    let mut introspector = FakeIntrospector::default();
    introspector.children.insert(100, vec![101, 102]);
    introspector.names.insert(101, "sshd".to_string());

    let (actuator, sent) = actuator_with(introspector, false);
    let report = actuator
        .apply(100, ContainState::Normal, ContainState::Terminated)
        .unwrap();

    assert_eq!(report.skipped_protected_pids, vec![101]);
    assert!(report.signalled_pids.contains(&102));
    assert!(!sent
        .lock()
        .unwrap()
        .iter()
        .any(|(pid, sig)| *pid == 101 && *sig == Signal::SIGKILL));
}

#[test]
fn protected_root_is_refused() {
    let mut introspector = FakeIntrospector::default();
    introspector.names.insert(200, "systemd".to_string());

    let (actuator, sent) = actuator_with(introspector, false);
    let err = actuator
        .apply(200, ContainState::Normal, ContainState::Terminated)
        .unwrap_err();

    assert!(matches!(err, ResponseError::ProtectedProcess(200)));
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn pid_one_is_always_protected() {
    let (actuator, sent) = actuator_with(FakeIntrospector::default(), false);
    let err = actuator
        .apply(1, ContainState::Normal, ContainState::Frozen)
        .unwrap_err();
    assert!(matches!(err, ResponseError::ProtectedProcess(1)));
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn pid_zero_is_invalid() {
    let (actuator, _) = actuator_with(FakeIntrospector::default(), false);
    let err = actuator
        .apply(0, ContainState::Normal, ContainState::Terminated)
        .unwrap_err();
    assert!(matches!(err, ResponseError::InvalidInput(_)));
}

#[test]
fn dry_run_suppresses_signals() {
    let (actuator, sent) = actuator_with(FakeIntrospector::default(), true);
    let report = actuator
        .apply(300, ContainState::Normal, ContainState::Terminated)
        .unwrap();

    assert_eq!(report.action, ContainAction::KillTree);
    assert!(report.signalled_pids.is_empty());
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn thaw_sends_sigcont() {
    let (actuator, sent) = actuator_with(FakeIntrospector::default(), false);
    actuator.thaw(400).unwrap();
    assert_eq!(*sent.lock().unwrap(), vec![(400, Signal::SIGCONT)]);
}
