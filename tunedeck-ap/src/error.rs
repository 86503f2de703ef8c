//! Error types for tunedeck-ap
//!
//! Only `UnsupportedPlatform` ever reaches engine callers. `PlaybackRejected`
//! is produced by media elements and swallowed inside the engine; invalid
//! command arguments are ignored without producing an error at all.

use thiserror::Error;

/// Main error type for tunedeck-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Host offers no audio-processing capability (fatal for the engine)
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Media output refused to start
    #[error("Playback rejected: {0}")]
    PlaybackRejected(#[from] PlaybackRejected),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Errors from the shared crate (settings, library, config)
    #[error(transparent)]
    Common(#[from] tunedeck_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output start refused by the media element (autoplay policy, no data, ...)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct PlaybackRejected {
    pub reason: String,
}

impl PlaybackRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using tunedeck-ap Error
pub type Result<T> = std::result::Result<T, Error>;
