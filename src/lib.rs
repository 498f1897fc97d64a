//! # ostinato — playback-side disk streaming
//!
//! Umbrella crate tying together:
//! - **ostinato-core** — timebase ([`Beats`], [`TempoMap`]), the SPSC
//!   [`PlaybackBuffer`], [`DeclickRamp`], monitoring flags, observer
//!   channels, and the [`TransportFSM`]
//! - **ostinato-stream** — the per-track [`DiskReader`], MIDI stream
//!   buffer and note tracker, playlist contracts, and the [`Butler`]
//!   refill thread
//!
//! ## Shape of the system
//!
//! ```text
//! Playlist ──(butler refill)──▶ PlaybackBuffer ──(RT run)──▶ mix buffers
//!
//! control ─▶ TransportFSM ─▶ TransportAPI ─▶ butler seek/overwrite
//!                 ▲                               │
//!                 └──────── butler_done ◀─────────┘
//! ```
//!
//! The realtime thread only ever calls [`DiskReader::run`],
//! [`DiskReader::set_pending_overwrite`] and injects `DeclickDone`; it
//! never allocates, locks or blocks. The butler owns all disk I/O.

/// Re-export of ostinato-core for direct access.
pub use ostinato_core as core;

/// Re-export of ostinato-stream for direct access.
pub use ostinato_stream as stream;

pub use ostinato_core::{
    AtomicFlag, AtomicFloat, AtomicSamplePos, Beats, DeclickRamp, LocateRequest, MonitorState,
    PlaybackBuffer, Sample, SampleCnt, SamplePos, SignalHub, StopRequest, TempoMap, TransportAPI,
    TransportEvent, TransportFSM, TransportState, MAX_SAMPLEPOS, PPQN,
};

pub use ostinato_stream::{
    AudioPlaylist, BufferSet, Butler, ButlerNotice, ChannelFilter, DiskReader, LoopSpan,
    MidiCycleBuffer, MidiEvent, MidiPlaylist, MidiSink, MidiStreamBuffer, NoteTracker, Refill,
    RefillScratch, SessionHooks, StreamConfig, Underrun,
};
