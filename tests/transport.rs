//! Transport state machine acceptance tests: the coordinated
//! stop/locate/roll sequences a transport controller drives, observed
//! through the actions performed on the embedding.

use ostinato::{
    LocateRequest, StopRequest, TransportAPI, TransportEvent, TransportFSM, TransportState,
};

#[derive(Default)]
struct Recorder {
    actions: Vec<String>,
}

impl TransportAPI for Recorder {
    fn start_playback(&mut self) {
        self.actions.push("start_playback".into());
    }
    fn stop_playback(&mut self, stop: StopRequest) {
        self.actions
            .push(format!("stop_playback(abort={})", stop.abort));
    }
    fn start_locate(&mut self, locate: &LocateRequest) {
        self.actions.push(format!(
            "start_locate({},roll={})",
            locate.target, locate.with_roll
        ));
    }
    fn schedule_butler_for_transport_work(&mut self) {
        self.actions.push("schedule_butler".into());
    }
    fn butler_completed_transport_work(&mut self) {
        self.actions.push("butler_completed".into());
    }
    fn exit_declick(&mut self) {
        self.actions.push("exit_declick".into());
    }
    fn roll_after_locate(&mut self) {
        self.actions.push("roll_after_locate".into());
    }
    fn locate_phase_two(&mut self) {
        self.actions.push("locate_phase_two".into());
    }
}

fn locate(target: i64, with_roll: bool) -> TransportEvent {
    TransportEvent::Locate(LocateRequest {
        target,
        with_roll,
        with_flush: true,
        with_loop: false,
        force: false,
    })
}

/// Start from stopped.
#[test]
fn test_start_from_stopped() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();

    fsm.handle(TransportEvent::Start, &mut api);

    assert_eq!(fsm.state(), TransportState::Rolling);
    assert_eq!(api.actions, ["start_playback"]);
}

/// Stop with declick: Rolling → DeclickOut → Stopped.
#[test]
fn test_stop_with_declick() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();
    fsm.handle(TransportEvent::Start, &mut api);

    fsm.handle(
        TransportEvent::Stop(StopRequest {
            abort: false,
            clear_state: false,
        }),
        &mut api,
    );
    assert_eq!(fsm.state(), TransportState::DeclickOut);
    assert!(!fsm.stopped_to_locate());
    assert_eq!(api.actions.last().unwrap(), "stop_playback(abort=false)");

    fsm.handle(TransportEvent::DeclickDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Stopped);
    assert_eq!(api.actions.last().unwrap(), "exit_declick");
}

/// Locate while rolling, no roll-after: declick out, then locate, then
/// come to rest.
#[test]
fn test_locate_while_rolling_without_roll() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();
    fsm.handle(TransportEvent::Start, &mut api);

    fsm.handle(locate(44100, false), &mut api);
    assert_eq!(fsm.state(), TransportState::DeclickOut);
    assert_eq!(fsm.last_locate().unwrap().target, 44100);

    fsm.handle(TransportEvent::DeclickDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Locating);
    assert!(api
        .actions
        .contains(&"start_locate(44100,roll=false)".to_string()));

    fsm.handle(TransportEvent::LocateDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Stopped);
}

/// Locate with roll-after resumes rolling once the locate lands.
#[test]
fn test_locate_with_roll_after() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();
    fsm.handle(TransportEvent::Start, &mut api);
    fsm.handle(locate(44100, true), &mut api);
    fsm.handle(TransportEvent::DeclickDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Locating);

    fsm.handle(TransportEvent::LocateDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Rolling);
    assert_eq!(api.actions.last().unwrap(), "roll_after_locate");
}

/// Butler work during stop: a start arriving mid-wait is deferred, not
/// lost.
#[test]
fn test_butler_work_during_stop() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();
    fsm.handle(TransportEvent::Start, &mut api);
    fsm.handle(TransportEvent::Stop(StopRequest::default()), &mut api);
    assert_eq!(fsm.state(), TransportState::DeclickOut);

    fsm.handle(TransportEvent::ButlerRequired, &mut api);
    assert_eq!(fsm.state(), TransportState::ButlerWait);

    fsm.handle(TransportEvent::Start, &mut api); // deferred
    assert_eq!(fsm.state(), TransportState::ButlerWait);

    fsm.handle(TransportEvent::ButlerDone, &mut api);
    assert_eq!(fsm.state(), TransportState::Rolling);

    let butler_done_at = api
        .actions
        .iter()
        .position(|a| a == "butler_completed")
        .unwrap();
    let start_at = api
        .actions
        .iter()
        .rposition(|a| a == "start_playback")
        .unwrap();
    assert!(butler_done_at < start_at, "deferred start must replay last");
}

/// Redundant events in terminal states do nothing.
#[test]
fn test_idempotent_edges() {
    let mut fsm = TransportFSM::new();
    let mut api = Recorder::default();

    fsm.handle(TransportEvent::Stop(StopRequest::default()), &mut api);
    assert_eq!(fsm.state(), TransportState::Stopped);
    assert!(api.actions.is_empty());

    fsm.handle(TransportEvent::Start, &mut api);
    fsm.handle(TransportEvent::Start, &mut api);
    assert_eq!(fsm.state(), TransportState::Rolling);
    assert_eq!(api.actions, ["start_playback"]);
}

/// The diagnostic channel sees every transition.
#[test]
fn test_state_transitions_observable() {
    let mut fsm = TransportFSM::new();
    let transitions = fsm.subscribe();
    let mut api = Recorder::default();

    fsm.handle(TransportEvent::Start, &mut api);
    fsm.handle(TransportEvent::Stop(StopRequest::default()), &mut api);
    fsm.handle(TransportEvent::DeclickDone, &mut api);

    let seen: Vec<_> = transitions.try_iter().collect();
    assert_eq!(
        seen,
        [
            (TransportState::Stopped, TransportState::Rolling),
            (TransportState::Rolling, TransportState::DeclickOut),
            (TransportState::DeclickOut, TransportState::Stopped),
        ]
    );
}
