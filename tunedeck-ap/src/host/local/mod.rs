//! Local playback host
//!
//! Media elements decode local files; graphs are [`SoftwareGraph`]s driven by
//! an output sink (the default audio device with the `device` feature, or a
//! real-time null sink).

pub mod decoder;
pub mod media;
pub mod output;
pub mod resampler;

pub use media::LocalMedia;

use crate::error::{Error, Result};
use crate::host::{AudioGraph, AudioHost, MediaElement, SoftwareGraph};
use std::sync::{Arc, Mutex, Weak};
use tracing::{info, warn};

/// Output rate when no device is probed
pub const DEFAULT_OUTPUT_RATE: u32 = 44100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Discard rendered audio, paced by the wall clock
    Null,
    /// Default system output device
    #[cfg(feature = "device")]
    Device,
}

/// Host for local files
pub struct LocalHost {
    output_rate: u32,
    sink: SinkKind,
    /// Media elements created by this host (graphs can only bind these)
    media: Mutex<Vec<Weak<LocalMedia>>>,
}

impl LocalHost {
    /// Host without an audio device
    pub fn headless(output_rate: u32) -> Self {
        Self {
            output_rate: output_rate.max(1),
            sink: SinkKind::Null,
            media: Mutex::new(Vec::new()),
        }
    }

    /// Host rendering through the default audio device
    #[cfg(feature = "device")]
    pub fn with_device() -> Result<Self> {
        let output_rate = output::probe_device_rate()?;
        Ok(Self {
            output_rate,
            sink: SinkKind::Device,
            media: Mutex::new(Vec::new()),
        })
    }

    /// Best available host: the audio device when compiled in and present,
    /// otherwise headless
    pub fn detect() -> Self {
        #[cfg(feature = "device")]
        {
            match Self::with_device() {
                Ok(host) => return host,
                Err(e) => warn!("Audio device unavailable, running headless: {}", e),
            }
        }
        #[cfg(not(feature = "device"))]
        warn!("Built without audio device support, running headless");

        Self::headless(DEFAULT_OUTPUT_RATE)
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn sink(&self) -> SinkKind {
        self.sink
    }

    fn find_local(&self, media: &Arc<dyn MediaElement>) -> Option<Arc<LocalMedia>> {
        let target = Arc::as_ptr(media) as *const ();
        let mut known = self.media.lock().ok()?;
        known.retain(|weak| weak.strong_count() > 0);
        known
            .iter()
            .filter_map(Weak::upgrade)
            .find(|local| Arc::as_ptr(local) as *const () == target)
    }
}

impl AudioHost for LocalHost {
    fn create_media(&self) -> Arc<dyn MediaElement> {
        let media = Arc::new(LocalMedia::new(self.output_rate));
        if let Ok(mut known) = self.media.lock() {
            known.push(Arc::downgrade(&media));
        }
        media
    }

    fn create_graph(
        &self,
        media: Arc<dyn MediaElement>,
        fft_size: usize,
    ) -> Result<Arc<dyn AudioGraph>> {
        let local = self.find_local(&media).ok_or_else(|| {
            Error::UnsupportedPlatform("media element was not created by this host".to_string())
        })?;

        let graph = Arc::new(SoftwareGraph::new(self.output_rate, fft_size));
        match self.sink {
            SinkKind::Null => output::spawn_null_sink(local, Arc::clone(&graph))
                .map_err(|e| Error::UnsupportedPlatform(e.to_string()))?,
            #[cfg(feature = "device")]
            SinkKind::Device => output::spawn_device_sink(local, Arc::clone(&graph))
                .map_err(|e| Error::UnsupportedPlatform(e.to_string()))?,
        }

        info!(
            "Created processing graph ({}Hz, fft {}, {:?} sink)",
            self.output_rate, fft_size, self.sink
        );
        Ok(graph)
    }
}
