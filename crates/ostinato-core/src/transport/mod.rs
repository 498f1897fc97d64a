//! Transport state machine and the collaborator interface it drives.

mod fsm;

pub use fsm::{
    LocateRequest, StopRequest, TransportAPI, TransportEvent, TransportFSM, TransportState,
};
