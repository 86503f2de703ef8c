//! Host audio capabilities consumed by the engine
//!
//! The engine never touches decoders or devices directly. It drives two
//! capabilities supplied by the host:
//!
//! - [`MediaElement`]: one decodable stream bound to a URL, with position,
//!   duration, buffered range, start/stop and an event channel
//! - [`AudioGraph`]: a processing context (gain with scheduled automation,
//!   spectral analyzer, output) with its own suspended/running/closed state
//!
//! [`AudioHost`] creates both. [`local::LocalHost`] is the in-tree host:
//! symphonia decoding, rubato resampling, [`SoftwareGraph`] processing and
//! (with the `device` feature) cpal output.

pub mod analyzer;
pub mod local;
pub mod software_graph;

pub use software_graph::SoftwareGraph;

use crate::error::{PlaybackRejected, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle state of a processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not processing (awaiting a user gesture or resume)
    Suspended,
    Running,
    /// Released; cannot be resumed
    Closed,
}

/// Notifications from a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Duration became known
    LoadedMetadata,
    /// More of the stream was buffered
    Progress,
    /// Output reached the end of the stream
    Ended,
    /// Source could not be loaded or decoded
    Error(String),
}

/// A single decodable audio stream
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Bind to a new URL (None detaches). Resets position to 0 and pauses.
    fn set_source(&self, url: Option<&str>);

    /// Currently bound URL
    fn source(&self) -> Option<String>;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// Move the playback position (seconds, already validated by the caller)
    fn set_current_time(&self, seconds: f64);

    /// Stream duration in seconds, NaN while unknown
    fn duration(&self) -> f64;

    /// End of the last contiguous buffered range in seconds (0 when nothing
    /// is buffered)
    fn buffered_end(&self) -> f64;

    fn is_paused(&self) -> bool;

    /// Start output. May be rejected (e.g. nothing loaded, autoplay policy).
    async fn play(&self) -> std::result::Result<(), PlaybackRejected>;

    /// Stop output, keeping the position
    fn pause(&self);

    /// Subscribe to media notifications
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;
}

/// Processing context with fixed topology source -> gain -> analyzer -> output
#[async_trait]
pub trait AudioGraph: Send + Sync {
    fn state(&self) -> ContextState;

    /// Resume a suspended context. Resolves once running.
    async fn resume(&self) -> Result<()>;

    /// Context clock in seconds (advances only while running)
    fn current_time(&self) -> f64;

    /// Instantaneous gain at the context clock
    fn gain_value(&self) -> f32;

    /// Drop every scheduled gain event at or after `time`
    fn cancel_scheduled_gain(&self, time: f64);

    /// Hold `value` from `time` on
    fn set_gain_at(&self, value: f32, time: f64);

    /// Linear ramp from the previous event's value, reaching `value` at `end_time`
    fn ramp_gain_to(&self, value: f32, end_time: f64);

    /// Number of magnitude bins (half the transform size)
    fn frequency_bin_count(&self) -> usize;

    /// Copy current byte magnitudes into `out` (up to `out.len()` bins)
    fn byte_frequency_data(&self, out: &mut [u8]);

    /// Disconnect all nodes
    fn disconnect(&self);

    /// Release the context
    fn close(&self);
}

/// Factory for media elements and processing graphs
pub trait AudioHost: Send + Sync {
    fn create_media(&self) -> Arc<dyn MediaElement>;

    /// Build a graph fed by `media` with an analyzer of `fft_size` samples.
    /// Returns `Error::UnsupportedPlatform` when the host cannot process audio.
    fn create_graph(
        &self,
        media: Arc<dyn MediaElement>,
        fft_size: usize,
    ) -> Result<Arc<dyn AudioGraph>>;
}
