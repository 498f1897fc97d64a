//! Transport state machine.
//!
//! Coordinates start, stop, locate and butler work between the control
//! thread, the realtime thread (which injects `DeclickDone`) and the butler
//! (whose completions arrive as `ButlerDone`). Side effects happen through
//! the injected [`TransportAPI`] collaborator; the machine itself only
//! tracks state, the latched locate request, and events deferred while
//! butler work is outstanding.

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::signals::SignalHub;
use crate::SamplePos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Rolling,
    Locating,
    DeclickOut,
    ButlerWait,
    MasterWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopRequest {
    pub abort: bool,
    pub clear_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocateRequest {
    pub target: SamplePos,
    pub with_roll: bool,
    pub with_flush: bool,
    pub with_loop: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    Start,
    Stop(StopRequest),
    Locate(LocateRequest),
    LocateDone,
    ButlerDone,
    ButlerRequired,
    DeclickDone,
}

/// Actions the machine performs, implemented by the embedding.
pub trait TransportAPI {
    fn start_playback(&mut self);
    fn stop_playback(&mut self, stop: StopRequest);
    fn start_locate(&mut self, locate: &LocateRequest);
    fn schedule_butler_for_transport_work(&mut self);
    fn butler_completed_transport_work(&mut self);
    fn exit_declick(&mut self);
    fn roll_after_locate(&mut self);
    fn locate_phase_two(&mut self);
}

pub struct TransportFSM {
    state: TransportState,
    /// Why DeclickOut was entered: a locate (true) or a plain stop (false).
    /// Stays set until the locate resolves.
    stopped_to_locate: bool,
    /// Last locate request; newer requests overwrite older ones.
    last_locate: Option<LocateRequest>,
    /// Events received while waiting on the butler, replayed FIFO on exit.
    deferred: SmallVec<[TransportEvent; 4]>,
    /// Following an external transport master: roll-after-locate waits in
    /// MasterWait for the master's go-ahead.
    slaved: bool,
    state_changes: SignalHub<(TransportState, TransportState)>,
}

impl TransportFSM {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            stopped_to_locate: false,
            last_locate: None,
            deferred: SmallVec::new(),
            slaved: false,
            state_changes: SignalHub::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn stopped_to_locate(&self) -> bool {
        self.stopped_to_locate
    }

    pub fn last_locate(&self) -> Option<&LocateRequest> {
        self.last_locate.as_ref()
    }

    pub fn set_slaved(&mut self, slaved: bool) {
        self.slaved = slaved;
    }

    /// Observe state transitions (diagnostics).
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<(TransportState, TransportState)> {
        self.state_changes.subscribe()
    }

    /// Feed one event through the machine, performing actions on `api`.
    /// Events deferred during ButlerWait are replayed before this returns.
    pub fn handle(&mut self, event: TransportEvent, api: &mut dyn TransportAPI) {
        use TransportEvent::*;
        use TransportState::*;

        debug!(state = ?self.state, event = ?event, "transport event");

        match (self.state, event) {
            // ---- Stopped ----
            (Stopped, Start) => {
                api.start_playback();
                self.enter(Rolling);
            }
            (Stopped, Stop(_)) => {}
            (Stopped, Locate(l)) => {
                self.mark_for_locate(l);
                api.start_locate(&l);
                self.enter(Locating);
            }
            (Stopped, ButlerDone) => {
                api.butler_completed_transport_work();
            }
            (Stopped, ButlerRequired) => {
                api.schedule_butler_for_transport_work();
                self.enter(ButlerWait);
            }

            // ---- Rolling ----
            (Rolling, Stop(s)) => {
                self.stopped_to_locate = false;
                api.stop_playback(s);
                self.enter(DeclickOut);
            }
            (Rolling, Start) => {}
            (Rolling, Locate(l)) => {
                self.mark_for_locate(l);
                api.stop_playback(StopRequest::default());
                self.enter(DeclickOut);
            }
            (Rolling, ButlerDone) => {}

            // ---- DeclickOut ----
            (DeclickOut, DeclickDone) => {
                api.exit_declick();
                match (self.stopped_to_locate, self.last_locate) {
                    (true, Some(locate)) => {
                        api.start_locate(&locate);
                        self.enter(Locating);
                    }
                    (true, None) => {
                        warn!("declick finished with no latched locate");
                        self.enter(Stopped);
                    }
                    (false, _) => self.enter(Stopped),
                }
            }
            (DeclickOut, ButlerRequired) => {
                api.schedule_butler_for_transport_work();
                self.enter(ButlerWait);
            }

            // ---- Locating ----
            (Locating, LocateDone) => {
                let roll = self.should_roll_after_locate();
                self.stopped_to_locate = false;
                if roll && self.slaved {
                    self.enter(MasterWait);
                } else if roll {
                    api.roll_after_locate();
                    self.enter(Rolling);
                } else {
                    self.enter(Stopped);
                }
            }
            (Locating, Stop(s)) => {
                self.stopped_to_locate = false;
                api.stop_playback(s);
                self.enter(Stopped);
            }
            (Locating, Start) => {
                self.enter(Rolling);
            }
            (Locating, Locate(l)) => {
                // A newer locate supersedes the one in flight.
                self.last_locate = Some(l);
                self.enter(Rolling);
            }
            (Locating, ButlerDone) => {}
            (Locating, ButlerRequired) => {
                api.schedule_butler_for_transport_work();
                self.enter(ButlerWait);
            }

            // ---- ButlerWait ----
            (ButlerWait, ButlerDone) => {
                if self.stopped_to_locate {
                    api.locate_phase_two();
                    self.enter(Locating);
                } else {
                    api.butler_completed_transport_work();
                    self.enter(Stopped);
                }
                self.replay_deferred(api);
            }
            (ButlerWait, ev @ (Start | Stop(_))) => {
                debug!(event = ?ev, "deferred while waiting for butler");
                self.deferred.push(ev);
            }
            (ButlerWait, ButlerRequired) => {
                api.schedule_butler_for_transport_work();
            }

            // ---- MasterWait ----
            (MasterWait, Start) => {
                api.roll_after_locate();
                self.enter(Rolling);
            }
            (MasterWait, Stop(s)) => {
                api.stop_playback(s);
                self.enter(Stopped);
            }

            (state, event) => {
                warn!(?state, ?event, "transport event ignored in this state");
            }
        }
    }

    fn mark_for_locate(&mut self, locate: LocateRequest) {
        self.stopped_to_locate = true;
        self.last_locate = Some(locate);
    }

    fn should_roll_after_locate(&self) -> bool {
        self.last_locate.map(|l| l.with_roll).unwrap_or(false)
    }

    fn enter(&mut self, next: TransportState) {
        if next != self.state {
            self.state_changes.emit((self.state, next));
        }
        self.state = next;
    }

    fn replay_deferred(&mut self, api: &mut dyn TransportAPI) {
        let queued: SmallVec<[TransportEvent; 4]> = self.deferred.drain(..).collect();
        for ev in queued {
            self.handle(ev, api);
        }
    }
}

impl Default for TransportFSM {
    fn default() -> Self {
        Self::new()
    }
}
