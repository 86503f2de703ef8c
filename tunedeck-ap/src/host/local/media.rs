//! Local file media element
//!
//! Binding a source starts a background decode (symphonia + rubato) of the
//! whole file at the output rate. Until it finishes the duration is unknown
//! and nothing is buffered; afterwards the element reports `LoadedMetadata`
//! and `Progress`, and the output sink pulls frames through [`LocalMedia::render`].

use super::decoder::{self, OUTPUT_CHANNELS};
use super::resampler;
use crate::error::{Error, PlaybackRejected, Result};
use crate::host::{MediaElement, MediaEvent};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct MediaState {
    source: Option<String>,
    /// Interleaved stereo at the output rate
    audio: Option<Arc<Vec<f32>>>,
    position_frames: usize,
    paused: bool,
    failed: bool,
}

impl MediaState {
    fn total_frames(&self) -> Option<usize> {
        self.audio.as_ref().map(|a| a.len() / OUTPUT_CHANNELS)
    }
}

/// Media element for local files (`/path` or `file:///path`)
pub struct LocalMedia {
    output_rate: u32,
    state: Arc<Mutex<MediaState>>,
    events: broadcast::Sender<MediaEvent>,
    /// Bumped on every `set_source`; stale decodes are discarded
    generation: Arc<AtomicU64>,
}

impl LocalMedia {
    pub fn new(output_rate: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            output_rate: output_rate.max(1),
            state: Arc::new(Mutex::new(MediaState {
                paused: true,
                ..Default::default()
            })),
            events,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Fill an interleaved stereo block from the current position.
    ///
    /// Writes silence while paused or before decoding finishes. Reaching the
    /// end of the stream pauses the element and emits `Ended`.
    pub fn render(&self, block: &mut [f32]) {
        let mut ended = false;

        if let Ok(mut state) = self.state.lock() {
            let total = state.total_frames();
            match (state.paused, state.audio.clone(), total) {
                (false, Some(audio), Some(total)) => {
                    let start = state.position_frames.min(total);
                    let wanted = block.len() / OUTPUT_CHANNELS;
                    let available = (total - start).min(wanted);

                    let src = &audio[start * OUTPUT_CHANNELS..(start + available) * OUTPUT_CHANNELS];
                    block[..src.len()].copy_from_slice(src);
                    block[src.len()..].fill(0.0);

                    state.position_frames = start + available;
                    if state.position_frames >= total {
                        state.paused = true;
                        ended = true;
                    }
                }
                _ => block.fill(0.0),
            }
        } else {
            block.fill(0.0);
        }

        if ended {
            debug!("Reached end of stream");
            let _ = self.events.send(MediaEvent::Ended);
        }
    }

    fn start_decode(&self, url: String, generation: u64) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let current = Arc::clone(&self.generation);
        let output_rate = self.output_rate;

        let job = move || {
            let result = resolve_path(&url).and_then(|path| {
                let decoded = decoder::decode_file(&path)?;
                resampler::resample(
                    &decoded.samples,
                    decoded.sample_rate,
                    output_rate,
                    OUTPUT_CHANNELS,
                )
            });

            if current.load(Ordering::SeqCst) != generation {
                debug!("Discarding stale decode of {}", url);
                return;
            }

            match result {
                Ok(samples) => {
                    let frames = samples.len() / OUTPUT_CHANNELS;
                    if let Ok(mut state) = state.lock() {
                        state.audio = Some(Arc::new(samples));
                        let total = state.total_frames().unwrap_or(0);
                        state.position_frames = state.position_frames.min(total);
                    }
                    info!(
                        "Loaded {} ({:.2}s)",
                        url,
                        frames as f64 / output_rate as f64
                    );
                    let _ = events.send(MediaEvent::LoadedMetadata);
                    let _ = events.send(MediaEvent::Progress);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", url, e);
                    if let Ok(mut state) = state.lock() {
                        state.failed = true;
                    }
                    let _ = events.send(MediaEvent::Error(e.to_string()));
                }
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                std::thread::spawn(job);
            }
        }
    }
}

#[async_trait]
impl MediaElement for LocalMedia {
    fn set_source(&self, url: Option<&str>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Ok(mut state) = self.state.lock() {
            *state = MediaState {
                source: url.map(str::to_string),
                paused: true,
                ..Default::default()
            };
        }

        if let Some(url) = url {
            self.start_decode(url.to_string(), generation);
        }
    }

    fn source(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.source.clone())
    }

    fn current_time(&self) -> f64 {
        self.state
            .lock()
            .map(|s| s.position_frames as f64 / self.output_rate as f64)
            .unwrap_or(0.0)
    }

    fn set_current_time(&self, seconds: f64) {
        if let Ok(mut state) = self.state.lock() {
            let frames = (seconds.max(0.0) * self.output_rate as f64).round() as usize;
            state.position_frames = match state.total_frames() {
                Some(total) => frames.min(total),
                None => frames,
            };
        }
    }

    fn duration(&self) -> f64 {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.total_frames())
            .map(|frames| frames as f64 / self.output_rate as f64)
            .unwrap_or(f64::NAN)
    }

    fn buffered_end(&self) -> f64 {
        // Whole file is decoded at once
        let duration = self.duration();
        if duration.is_nan() {
            0.0
        } else {
            duration
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().map(|s| s.paused).unwrap_or(true)
    }

    async fn play(&self) -> std::result::Result<(), PlaybackRejected> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PlaybackRejected::new("media state poisoned"))?;

        if state.source.is_none() {
            return Err(PlaybackRejected::new("no source"));
        }
        if state.failed {
            return Err(PlaybackRejected::new("source failed to load"));
        }

        // Playing from the end restarts the stream
        if let Some(total) = state.total_frames() {
            if state.position_frames >= total {
                state.position_frames = 0;
            }
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.paused = true;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

/// Map a source URL to a local path
pub fn resolve_path(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(Error::Decode(format!("Unsupported source scheme: {}", url)));
    }
    Ok(PathBuf::from(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            resolve_path("file:///music/a.flac").unwrap(),
            PathBuf::from("/music/a.flac")
        );
        assert_eq!(
            resolve_path("/music/b.mp3").unwrap(),
            PathBuf::from("/music/b.mp3")
        );
        assert!(resolve_path("https://example.com/a.mp3").is_err());
    }

    #[tokio::test]
    async fn test_unbound_element_rejects_play() {
        let media = LocalMedia::new(48000);
        assert!(media.play().await.is_err());
        assert!(media.is_paused());
        assert!(media.duration().is_nan());
        assert_eq!(media.buffered_end(), 0.0);
    }

    #[tokio::test]
    async fn test_render_stops_at_end_and_emits_ended() {
        let media = LocalMedia::new(10);
        let mut events = media.subscribe();
        {
            let mut state = media.state.lock().unwrap();
            state.source = Some("/test.wav".to_string());
            state.audio = Some(Arc::new(vec![0.5; 2 * 15]));
        }
        media.play().await.unwrap();

        let mut block = vec![0.0; 2 * 10];
        media.render(&mut block);
        assert!(block.iter().all(|&s| s == 0.5));
        assert!((media.current_time() - 1.0).abs() < 1e-9);

        media.render(&mut block);
        assert!(block[..10].iter().all(|&s| s == 0.5));
        assert!(block[10..].iter().all(|&s| s == 0.0));
        assert!(media.is_paused());
        assert_eq!(events.recv().await.unwrap(), MediaEvent::Ended);
    }

    #[tokio::test]
    async fn test_seek_clamps_to_loaded_duration() {
        let media = LocalMedia::new(10);
        media.state.lock().unwrap().audio = Some(Arc::new(vec![0.0; 2 * 20]));
        media.set_current_time(99.0);
        assert!((media.current_time() - 2.0).abs() < 1e-9);
    }
}
