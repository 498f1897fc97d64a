//! Playback-side disk streaming: per-track ring-buffered readers fed by a
//! background butler thread, serving the realtime process callback.
//!
//! Data flows playlist → (butler refill) → ring buffer → (RT read) → mix
//! buffers. Control flows through the transport state machine in
//! `ostinato-core`, whose butler-facing actions land here.

// Error types
pub mod error;
pub use error::{Error, Result};

// Stream configuration
pub mod config;
pub use config::StreamConfig;

// External collaborator contracts
pub mod playlist;
pub use playlist::{AudioPlaylist, LoopSpan, MidiPlaylist, SessionHooks};

// Per-cycle buffers
pub mod bufferset;
pub use bufferset::{BufferSet, MidiCycleBuffer};

// MIDI streaming
pub mod midi;
pub use midi::{ChannelFilter, MidiEvent, MidiSink, MidiStreamBuffer, NoteTracker};

// The disk reader
pub mod reader;
pub use reader::{DiskReader, Refill, RefillScratch, Underrun};

// Background refill thread
pub mod butler;
pub use butler::{Butler, ButlerNotice, ButlerRequest};
