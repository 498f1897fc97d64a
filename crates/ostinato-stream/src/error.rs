//! Error types.

use ostinato_core::{SampleCnt, SamplePos};
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The audio playlist produced fewer samples than requested.
    #[error("cannot read {want} samples from audio playlist at sample {pos} (got {got})")]
    AudioPlaylistRead {
        pos: SamplePos,
        want: SampleCnt,
        got: SampleCnt,
    },

    /// The MIDI playlist covered a shorter span than requested.
    #[error("cannot read {want} samples of MIDI from playlist at sample {pos} (got {got})")]
    MidiPlaylistRead {
        pos: SamplePos,
        want: SampleCnt,
        got: SampleCnt,
    },

    /// The butler thread is gone.
    #[error("butler thread unavailable")]
    ButlerUnavailable,
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
