//! Core building blocks for the playback streaming engine.
//!
//! # Primary API
//!
//! - [`Beats`] / [`TempoMap`]: musical timebase (1920 ticks per beat)
//! - [`PlaybackBuffer`]: lock-free SPSC ring between butler and RT threads
//! - [`DeclickRamp`]: exponential gain ramp for click-free transport edges
//! - [`TransportFSM`] / [`TransportAPI`]: coordinated start/stop/locate
//! - [`SignalHub`]: RT-safe observer channels (underruns, state changes)

// Error types
pub mod error;
pub use error::{Error, Result};

// Timebase
pub mod time;
pub use time::{Beats, TempoMap, PPQN};

// Lock-free primitives
pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat, AtomicSamplePos};

// SPSC ring
pub mod buffer;
pub use buffer::PlaybackBuffer;

// Declick
pub mod declick;
pub use declick::DeclickRamp;

// Monitoring flags
pub mod monitor;
pub use monitor::MonitorState;

// Observer channels
pub mod signals;
pub use signals::SignalHub;

// Transport state machine
pub mod transport;
pub use transport::{
    LocateRequest, StopRequest, TransportAPI, TransportEvent, TransportFSM, TransportState,
};

/// One audio frame of a single channel.
pub type Sample = f32;

/// A position on the session timeline, in samples.
pub type SamplePos = i64;

/// A count of samples.
pub type SampleCnt = i64;

/// Sentinel for "end of the timeline".
pub const MAX_SAMPLEPOS: SamplePos = SamplePos::MAX;
