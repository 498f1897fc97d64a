//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Musical time could not be parsed.
    #[error("invalid musical time: {0}")]
    ParseBeats(#[from] std::num::ParseFloatError),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
