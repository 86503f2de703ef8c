//! Audio playback engine
//!
//! Owns exactly one media element and, once initialized, one processing graph
//! (source -> gain -> analyzer -> output). Exposes imperative commands, three
//! observer registries (time, spectrum, end of stream) and two frame-driven
//! polling loops that run while output is playing.
//!
//! # State machine
//!
//! `Uninitialized -> Ready -> Loaded -> Playing <-> Paused`, with `Disposed`
//! terminal from anywhere. After [`AudioEngine::dispose`] every command is a
//! silent no-op.
//!
//! # Gain
//!
//! All audible level changes are ramps on the graph's gain parameter. A new
//! ramp always supersedes the pending one and starts from the instantaneous
//! value, so play/pause/volume changes never click.
//!
//! # Concurrency
//!
//! `AudioEngine` is a cheap clonable handle. Interior state sits behind short
//! `std::sync::Mutex` sections that are never held across an `.await` or while
//! subscriber callbacks run.

pub mod envelope;
pub mod frame_loop;
pub mod state;
pub mod subscribers;

pub use envelope::{GainEnvelope, GainRamp};
pub use state::{EngineState, TimeUpdate};
pub use subscribers::{SubscriberSet, Subscription};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::host::{AudioGraph, AudioHost, ContextState, MediaElement, MediaEvent};
use frame_loop::FrameLoop;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tunedeck_common::Track;

/// Descriptive data attached to a loaded source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl From<&Track> for TrackMetadata {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
        }
    }
}

struct Core {
    graph: Option<Arc<dyn AudioGraph>>,
    envelope: GainEnvelope,
    /// Stored linear volume; applied on the next fade-in
    volume: f32,
    metadata: Option<TrackMetadata>,
    /// `play()` was issued since the last `load()`
    started: bool,
    /// `pause()` faded out and the delayed halt has not fired yet
    halt_pending: bool,
    time_loop: FrameLoop,
    spectrum_loop: FrameLoop,
    /// Reused between spectrum ticks (taken out while delivering)
    spectrum: Vec<u8>,
    /// Media receiver waiting for the event pump
    media_events: Option<broadcast::Receiver<MediaEvent>>,
    pump: Option<CancellationToken>,
}

impl Core {
    /// Stop loops and the event pump, hand back the graph for closing
    fn release(&mut self) -> Option<Arc<dyn AudioGraph>> {
        self.time_loop.stop();
        self.spectrum_loop.stop();
        if let Some(pump) = self.pump.take() {
            pump.cancel();
        }
        self.media_events = None;
        self.spectrum = Vec::new();
        self.graph.take()
    }
}

struct EngineInner {
    host: Arc<dyn AudioHost>,
    config: EngineConfig,
    media: Arc<dyn MediaElement>,
    core: Mutex<Core>,
    time_subscribers: SubscriberSet<TimeUpdate>,
    spectrum_subscribers: SubscriberSet<[u8]>,
    ended_subscribers: SubscriberSet<()>,
    /// Bumped whenever a delayed halt from `pause()` must be abandoned
    halt_generation: AtomicU64,
    disposed: AtomicBool,
}

impl Drop for EngineInner {
    // Last handle gone without dispose(): the output thread only exits once
    // the graph is closed
    fn drop(&mut self) {
        let core = self
            .core
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(graph) = core.release() {
            graph.disconnect();
            graph.close();
            debug!("Audio engine dropped without dispose; graph closed");
        }
    }
}

/// Handle to the playback engine
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Create an engine and its media element. The processing graph is built
    /// lazily by [`AudioEngine::initialize`].
    pub fn new(host: Arc<dyn AudioHost>, config: EngineConfig) -> Self {
        let media = host.create_media();
        let media_events = media.subscribe();

        Self {
            inner: Arc::new(EngineInner {
                host,
                config,
                media,
                core: Mutex::new(Core {
                    graph: None,
                    envelope: GainEnvelope::default(),
                    volume: 1.0,
                    metadata: None,
                    started: false,
                    halt_pending: false,
                    time_loop: FrameLoop::new("time"),
                    spectrum_loop: FrameLoop::new("spectrum"),
                    spectrum: Vec::new(),
                    media_events: Some(media_events),
                    pump: None,
                }),
                time_subscribers: SubscriberSet::new("time"),
                spectrum_subscribers: SubscriberSet::new("spectrum"),
                ended_subscribers: SubscriberSet::new("ended"),
                halt_generation: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        // Critical sections never panic while holding the lock
        self.inner
            .core
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create the processing graph if absent. Idempotent.
    ///
    /// Fails with `UnsupportedPlatform` when the host cannot process audio.
    /// The gain starts at 0 so the first `play()` fades in.
    pub fn initialize(&self) -> Result<()> {
        self.ensure_graph().map(|_| ())
    }

    fn ensure_graph(&self) -> Result<Option<Arc<dyn AudioGraph>>> {
        if self.is_disposed() {
            return Ok(None);
        }

        let mut core = self.core();
        if let Some(graph) = &core.graph {
            return Ok(Some(Arc::clone(graph)));
        }

        let graph = self
            .inner
            .host
            .create_graph(Arc::clone(&self.inner.media), self.inner.config.fft_size)?;

        core.envelope.silence(graph.as_ref());
        core.spectrum = vec![0; graph.frequency_bin_count()];
        core.graph = Some(Arc::clone(&graph));

        if let Some(events) = core.media_events.take() {
            core.pump = self.spawn_media_pump(events);
        }

        info!(
            "Audio engine initialized ({} frequency bins)",
            graph.frequency_bin_count()
        );
        Ok(Some(graph))
    }

    /// Make sure the processing context is running. Idempotent.
    ///
    /// Initializes the graph if needed. Resolves once the context runs.
    pub async fn resume_context(&self) -> Result<()> {
        let Some(graph) = self.ensure_graph()? else {
            return Ok(());
        };
        if graph.state() == ContextState::Suspended {
            graph.resume().await?;
            debug!("Processing context running");
        }
        Ok(())
    }

    /// Release everything: halt output, cancel loops and the event pump,
    /// disconnect and close the graph, drop all subscribers. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.halt_generation.fetch_add(1, Ordering::SeqCst);

        self.inner.media.pause();
        let graph = {
            let mut core = self.core();
            core.halt_pending = false;
            core.release()
        };

        if let Some(graph) = graph {
            graph.disconnect();
            graph.close();
        }
        self.inner.media.set_source(None);

        self.inner.time_subscribers.clear();
        self.inner.spectrum_subscribers.clear();
        self.inner.ended_subscribers.clear();
        info!("Audio engine disposed");
    }

    // ========================================================================
    // Playback commands
    // ========================================================================

    /// Bind a new source.
    ///
    /// Halts output, rebinds the media element, cancels scheduled ramps and
    /// resets the gain to 0, then emits one immediate time update (duration
    /// NaN until the media reports metadata). A blank URL is ignored.
    pub fn load(&self, url: &str, metadata: Option<TrackMetadata>) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        let url = url.trim();
        if url.is_empty() {
            debug!("Ignoring load with empty URL");
            return Ok(());
        }

        info!("Loading {}", url);
        self.inner.halt_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.media.pause();
        self.stop_loops();
        self.inner.media.set_source(Some(url));

        {
            let mut core = self.core();
            core.metadata = metadata;
            core.started = false;
            core.halt_pending = false;
        }

        if let Some(graph) = self.ensure_graph()? {
            self.core().envelope.silence(graph.as_ref());
        }

        self.emit_time_update();
        Ok(())
    }

    /// Start output with a fade-in to the stored volume.
    ///
    /// Resumes the processing context first. A rejected output start is
    /// logged and swallowed: callers are expected to invoke `play()` from a
    /// user-initiated action.
    pub async fn play(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        self.resume_context().await?;

        // Supersede a delayed halt from an earlier pause()
        self.inner.halt_generation.fetch_add(1, Ordering::SeqCst);

        if let Err(rejected) = self.inner.media.play().await {
            debug!("Output start rejected: {}", rejected);
        }
        if self.is_disposed() {
            return Ok(());
        }

        {
            let mut core = self.core();
            core.started = true;
            core.halt_pending = false;
            let volume = core.volume;
            if let Some(graph) = core.graph.clone() {
                core.envelope
                    .fade_to(graph.as_ref(), volume, self.inner.config.fade);
            }
        }

        self.start_loops();
        Ok(())
    }

    /// Fade out, then halt output and both loops after the fade plus a small
    /// margin. Without a graph, halts immediately.
    pub fn pause(&self) {
        if self.is_disposed() {
            return;
        }

        let graph = {
            let mut core = self.core();
            let graph = core.graph.clone();
            if let Some(graph) = &graph {
                core.envelope
                    .fade_to(graph.as_ref(), 0.0, self.inner.config.fade);
                core.halt_pending = true;
            }
            graph
        };

        if graph.is_none() {
            self.halt();
            return;
        }

        let generation = self.inner.halt_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.config.fade + self.inner.config.pause_margin;
        let weak = Arc::downgrade(&self.inner);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(engine) = upgrade(&weak) {
                        if engine.inner.halt_generation.load(Ordering::SeqCst) == generation {
                            engine.halt();
                        }
                    }
                });
            }
            Err(_) => self.halt(),
        }
    }

    fn halt(&self) {
        self.inner.media.pause();
        self.core().halt_pending = false;
        self.stop_loops();
        debug!("Output halted");
    }

    /// Move the playback position. Non-finite input is ignored; negative
    /// values clamp to 0. Emits one time update immediately.
    pub fn seek(&self, seconds: f64) {
        if self.is_disposed() || !seconds.is_finite() {
            return;
        }
        self.inner.media.set_current_time(seconds.max(0.0));
        self.emit_time_update();
    }

    /// Store a linear volume (clamped to 0..=1, NaN ignored).
    ///
    /// While playing the gain ramps to the new value; while paused (including
    /// the fade-out before a pending halt) it keeps heading to 0 and the new
    /// value applies on the next `play()`.
    pub fn set_volume(&self, volume: f64) {
        if self.is_disposed() || volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0) as f32;
        let media_paused = self.inner.media.is_paused();

        let mut core = self.core();
        let paused = media_paused || core.halt_pending;
        core.volume = volume;
        if let Some(graph) = core.graph.clone() {
            let target = if paused { 0.0 } else { volume };
            core.envelope
                .fade_to(graph.as_ref(), target, self.inner.config.volume_ramp);
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn current_time(&self) -> f64 {
        self.inner.media.current_time()
    }

    /// Duration in seconds, NaN while unknown
    pub fn duration(&self) -> f64 {
        self.inner.media.duration()
    }

    pub fn buffered(&self) -> f64 {
        self.inner.media.buffered_end()
    }

    pub fn time_snapshot(&self) -> TimeUpdate {
        TimeUpdate {
            current_time: self.current_time(),
            duration: self.duration(),
            buffered: self.buffered(),
        }
    }

    /// Whether media output is running (read from the media element)
    pub fn is_playing(&self) -> bool {
        !self.is_disposed() && self.has_source() && !self.inner.media.is_paused()
    }

    pub fn has_source(&self) -> bool {
        self.inner.media.source().is_some()
    }

    pub fn source(&self) -> Option<String> {
        self.inner.media.source()
    }

    pub fn metadata(&self) -> Option<TrackMetadata> {
        self.core().metadata.clone()
    }

    /// Stored linear volume
    pub fn volume(&self) -> f32 {
        self.core().volume
    }

    pub fn gain_envelope(&self) -> GainEnvelope {
        self.core().envelope
    }

    /// Context clock of the graph (0 before initialization)
    pub fn context_time(&self) -> f64 {
        self.core()
            .graph
            .as_ref()
            .map(|g| g.current_time())
            .unwrap_or(0.0)
    }

    pub fn loops_running(&self) -> bool {
        let core = self.core();
        core.time_loop.is_running() || core.spectrum_loop.is_running()
    }

    pub fn state(&self) -> EngineState {
        if self.is_disposed() {
            return EngineState::Disposed;
        }
        let (has_graph, started) = {
            let core = self.core();
            (core.graph.is_some(), core.started)
        };

        if !has_graph {
            EngineState::Uninitialized
        } else if !self.has_source() {
            EngineState::Ready
        } else if !started {
            EngineState::Loaded
        } else if self.inner.media.is_paused() {
            EngineState::Paused
        } else {
            EngineState::Playing
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Receive time updates. The new subscriber gets one update immediately.
    pub fn on_time_update(
        &self,
        callback: impl Fn(&TimeUpdate) + Send + Sync + 'static,
    ) -> Subscription {
        if self.is_disposed() {
            return Subscription::inert();
        }
        let snapshot = self.time_snapshot();
        self.inner
            .time_subscribers
            .subscribe_with(callback, &snapshot)
    }

    /// Receive byte frequency magnitudes (`fft_size / 2` bins) each frame
    /// while playing
    pub fn on_spectrum(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) -> Subscription {
        if self.is_disposed() {
            return Subscription::inert();
        }
        self.inner.spectrum_subscribers.subscribe(callback)
    }

    /// Notified once each time the stream plays to its end
    pub fn on_ended(&self, callback: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        if self.is_disposed() {
            return Subscription::inert();
        }
        self.inner.ended_subscribers.subscribe(callback)
    }

    fn emit_time_update(&self) {
        if self.inner.time_subscribers.is_empty() {
            return;
        }
        let update = self.time_snapshot();
        self.inner.time_subscribers.notify(&update);
    }

    fn emit_spectrum(&self) {
        if self.inner.spectrum_subscribers.is_empty() {
            return;
        }

        let (graph, mut bins) = {
            let mut core = self.core();
            let Some(graph) = core.graph.clone() else {
                return;
            };
            (graph, std::mem::take(&mut core.spectrum))
        };

        bins.resize(graph.frequency_bin_count(), 0);
        graph.byte_frequency_data(&mut bins);
        self.inner.spectrum_subscribers.notify(&bins[..]);

        let mut core = self.core();
        if core.graph.is_some() {
            core.spectrum = bins;
        }
    }

    // ========================================================================
    // Loops and media events
    // ========================================================================

    fn start_loops(&self) {
        let period = self.inner.config.frame_interval;
        let mut core = self.core();

        let weak = Arc::downgrade(&self.inner);
        core.time_loop.start(period, move || match upgrade(&weak) {
            Some(engine) => {
                engine.emit_time_update();
                true
            }
            None => false,
        });

        let weak = Arc::downgrade(&self.inner);
        core.spectrum_loop.start(period, move || match upgrade(&weak) {
            Some(engine) => {
                engine.emit_spectrum();
                true
            }
            None => false,
        });
    }

    fn stop_loops(&self) {
        let mut core = self.core();
        core.time_loop.stop();
        core.spectrum_loop.stop();
    }

    fn spawn_media_pump(
        &self,
        mut events: broadcast::Receiver<MediaEvent>,
    ) -> Option<CancellationToken> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime; media events will not be observed");
                return None;
            }
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(&self.inner);

        handle.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => match upgrade(&weak) {
                        Some(engine) => engine.handle_media_event(event),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Media event pump lagged, {} events dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Media event pump stopped");
        });

        Some(token)
    }

    fn handle_media_event(&self, event: MediaEvent) {
        if self.is_disposed() {
            return;
        }
        match event {
            MediaEvent::LoadedMetadata | MediaEvent::Progress => self.emit_time_update(),
            MediaEvent::Ended => {
                debug!("End of stream");
                self.stop_loops();
                self.emit_time_update();
                self.inner.ended_subscribers.notify(&());
            }
            MediaEvent::Error(message) => warn!("Media error: {}", message),
        }
    }
}

fn upgrade(weak: &Weak<EngineInner>) -> Option<AudioEngine> {
    weak.upgrade().map(|inner| AudioEngine { inner })
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state())
            .field("source", &self.source())
            .finish()
    }
}
