//! Engine state reporting types

use serde::{Serialize, Serializer};
use std::fmt;

/// Engine lifecycle state
///
/// `Loaded`, `Playing` and `Paused` all imply the processing graph exists.
/// `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No processing graph yet
    Uninitialized,
    /// Graph exists, no source bound
    Ready,
    /// Source bound, not started since it was loaded
    Loaded,
    Playing,
    Paused,
    Disposed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Loaded => "loaded",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
            EngineState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// One time-channel notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeUpdate {
    /// Position in seconds
    pub current_time: f64,
    /// Duration in seconds; NaN while unknown (serialized as null)
    #[serde(serialize_with = "serialize_nan_as_null")]
    pub duration: f64,
    /// End of the last contiguous buffered range in seconds
    pub buffered: f64,
}

impl TimeUpdate {
    /// Duration if known
    pub fn known_duration(&self) -> Option<f64> {
        self.duration.is_finite().then_some(self.duration)
    }
}

fn serialize_nan_as_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}
