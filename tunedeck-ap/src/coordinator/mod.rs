//! Playback coordination
//!
//! Binds the player store (volume, current track, shuffle, repeat) to the
//! single [`AudioEngine`]: maps UI volume to gain, starts and stops tracks,
//! walks the queue and reacts to end of stream. Commands are serialized so
//! the engine sees them in call order.

pub mod catalog;
pub mod queue;
pub mod slot;
pub mod store;

pub use catalog::{StaticCatalog, TrackCatalog};
pub use queue::{QueueSnapshot, QueueState};
pub use slot::EngineSlot;
pub use store::{PlayerAction, PlayerState, PlayerStore};

use crate::engine::{AudioEngine, EngineState, Subscription, TrackMetadata};
use crate::error::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tunedeck_common::events::{EventBus, PlayerEvent};
use tunedeck_common::settings::SettingsStore;
use tunedeck_common::{RepeatMode, Track, TrackId};

/// Linear gain for a UI volume (0-100)
pub fn volume_to_gain(volume: u8) -> f64 {
    f64::from(volume.min(100)) / 100.0
}

/// Combined player and engine view
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    pub state: EngineState,
    pub is_playing: bool,
    pub current_track_id: Option<TrackId>,
    pub last_track_id: Option<TrackId>,
    pub volume: u8,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub buffered: f64,
    pub metadata: Option<TrackMetadata>,
    pub queue_length: usize,
    pub queue_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Previous,
}

pub struct PlaybackCoordinator {
    engine: AudioEngine,
    store: PlayerStore,
    queue: Mutex<QueueState>,
    catalog: Arc<dyn TrackCatalog>,
    events: EventBus,
    /// Latest analyzer frame
    spectrum: Arc<Mutex<Vec<u8>>>,
    commands: tokio::sync::Mutex<()>,
    subscriptions: Mutex<Vec<Subscription>>,
    ended_task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackCoordinator {
    /// Hydrate player state, apply the stored volume to the engine and
    /// subscribe to engine notifications. Must run inside a tokio runtime.
    pub async fn new(
        engine: AudioEngine,
        settings: Arc<dyn SettingsStore>,
        catalog: Arc<dyn TrackCatalog>,
        events: EventBus,
        progress_interval: Duration,
    ) -> Arc<Self> {
        let store = PlayerStore::hydrate(settings, events.clone()).await;
        let state = store.state();
        engine.set_volume(volume_to_gain(state.volume));

        // Nothing is loaded after a restart; resume navigation from the last track
        let mut queue = QueueState::new();
        let position = state
            .current_track_id
            .as_ref()
            .or(state.last_track_id.as_ref());
        queue.set_tracks(catalog.ids(), position);

        info!(
            "Coordinator ready (volume {}, shuffle {}, repeat {}, {} queued)",
            state.volume,
            state.shuffle,
            state.repeat,
            queue.len()
        );

        let coordinator = Arc::new(Self {
            engine,
            store,
            queue: Mutex::new(queue),
            catalog,
            events,
            spectrum: Arc::new(Mutex::new(Vec::new())),
            commands: tokio::sync::Mutex::new(()),
            subscriptions: Mutex::new(Vec::new()),
            ended_task: Mutex::new(None),
        });
        coordinator.wire(progress_interval);
        coordinator
    }

    fn wire(self: &Arc<Self>, progress_interval: Duration) {
        let mut subscriptions = Vec::with_capacity(3);

        let events = self.events.clone();
        let last_emit: Mutex<Option<Instant>> = Mutex::new(None);
        subscriptions.push(self.engine.on_time_update(move |update| {
            let now = Instant::now();
            if let Ok(mut last) = last_emit.lock() {
                if matches!(*last, Some(at) if now.duration_since(at) < progress_interval) {
                    return;
                }
                *last = Some(now);
            }
            events.emit_lossy(PlayerEvent::PlaybackProgress {
                current_time: update.current_time,
                duration: update.known_duration(),
                buffered: update.buffered,
                timestamp: Utc::now(),
            });
        }));

        let spectrum = Arc::clone(&self.spectrum);
        subscriptions.push(self.engine.on_spectrum(move |bins| {
            if let Ok(mut latest) = spectrum.lock() {
                latest.clear();
                latest.extend_from_slice(bins);
            }
        }));

        // End of stream is handled off the engine's notification path
        let (ended_tx, mut ended_rx) = mpsc::unbounded_channel::<()>();
        subscriptions.push(self.engine.on_ended(move |_| {
            let _ = ended_tx.send(());
        }));

        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while ended_rx.recv().await.is_some() {
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = coordinator.handle_stream_end().await {
                    warn!("Failed to continue after end of stream: {}", e);
                }
            }
            debug!("Stream end handler stopped");
        });

        *lock(&self.subscriptions) = subscriptions;
        *lock(&self.ended_task) = Some(task);
    }

    /// Drop engine subscriptions and stop background work. The engine itself
    /// is left to its owner.
    pub fn shutdown(&self) {
        for subscription in lock(&self.subscriptions).drain(..) {
            subscription.unsubscribe();
        }
        if let Some(task) = lock(&self.ended_task).take() {
            task.abort();
        }
        info!("Coordinator shut down");
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn player_state(&self) -> PlayerState {
        self.store.state()
    }

    /// Derived from the engine, not from the stored flag
    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn queue(&self) -> QueueSnapshot {
        lock(&self.queue).snapshot()
    }

    pub fn latest_spectrum(&self) -> Vec<u8> {
        lock(&self.spectrum).clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.store.state();
        let time = self.engine.time_snapshot();
        let (queue_length, queue_index) = {
            let queue = lock(&self.queue);
            (queue.len(), queue.index())
        };

        PlaybackSnapshot {
            state: self.engine.state(),
            is_playing: self.engine.is_playing(),
            current_track_id: state.current_track_id,
            last_track_id: state.last_track_id,
            volume: state.volume,
            shuffle: state.shuffle,
            repeat: state.repeat,
            current_time: time.current_time,
            duration: time.known_duration(),
            buffered: time.buffered,
            metadata: self.engine.metadata(),
            queue_length,
            queue_index,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Store a UI volume (0-100) and apply it to the engine when it changed.
    /// Returns the stored volume.
    pub async fn set_volume(&self, volume: f64) -> u8 {
        let _guard = self.commands.lock().await;
        let (before, after) = self.store.dispatch(PlayerAction::SetVolume(volume)).await;
        if before.volume != after.volume {
            self.engine.set_volume(volume_to_gain(after.volume));
        }
        after.volume
    }

    /// Pause when playing, otherwise play. Does nothing without a source.
    pub async fn toggle_play(&self) -> Result<()> {
        let _guard = self.commands.lock().await;
        if !self.engine.has_source() {
            debug!("Toggle ignored, nothing loaded");
            return Ok(());
        }

        if self.engine.is_playing() {
            self.engine.pause();
            self.store.dispatch(PlayerAction::Pause).await;
        } else {
            self.engine.play().await?;
            self.store.dispatch(PlayerAction::Play).await;
        }
        Ok(())
    }

    /// Load and start a track. A track without a stream URL is ignored.
    pub async fn play_track(&self, track: &Track) -> Result<()> {
        let _guard = self.commands.lock().await;
        self.play_track_locked(track).await
    }

    /// Resolve an id through the catalog and play it
    pub async fn play_track_id(&self, id: &TrackId) -> Result<()> {
        let track = self
            .catalog
            .resolve(id)
            .ok_or_else(|| Error::NotFound(format!("Unknown track: {}", id)))?;
        self.play_track(&track).await
    }

    async fn play_track_locked(&self, track: &Track) -> Result<()> {
        let Some(url) = track.stream_url() else {
            debug!("Track {} has no stream URL", track.id);
            return Ok(());
        };

        info!("Playing track {}", track.id);
        self.engine.load(url, Some(TrackMetadata::from(track)))?;
        self.store
            .dispatch(PlayerAction::SetTrack(Some(track.id.clone())))
            .await;

        {
            let mut queue = lock(&self.queue);
            if queue.select(&track.id).is_none() {
                queue.clear_position();
            }
        }
        self.emit_queue_changed();

        self.engine.play().await?;
        self.store.dispatch(PlayerAction::Play).await;
        Ok(())
    }

    /// Move to the next queue entry. Returns false at a boundary that does
    /// not wrap.
    pub async fn next(&self) -> Result<bool> {
        let _guard = self.commands.lock().await;
        self.navigate(Direction::Next, false).await
    }

    /// Move to the previous queue entry. Returns false at a boundary that
    /// does not wrap.
    pub async fn previous(&self) -> Result<bool> {
        let _guard = self.commands.lock().await;
        self.navigate(Direction::Previous, false).await
    }

    async fn navigate(&self, direction: Direction, from_stream_end: bool) -> Result<bool> {
        let state = self.store.state();
        let was_playing = self.engine.is_playing();

        let moved = {
            let mut queue = lock(&self.queue);
            match direction {
                Direction::Next => queue.next(state.repeat, state.shuffle),
                Direction::Previous => queue.previous(state.repeat, state.shuffle),
            }
        };
        let Some(id) = moved else {
            debug!("{:?} at queue boundary (repeat {})", direction, state.repeat);
            return Ok(false);
        };
        self.emit_queue_changed();

        let track = self.catalog.resolve(&id);
        let Some(url) = track.as_ref().and_then(Track::stream_url) else {
            info!("Selected {} (not playable from catalog)", id);
            self.store.dispatch(PlayerAction::SetTrack(Some(id))).await;
            return Ok(true);
        };

        info!("{:?} -> {}", direction, id);
        self.engine.load(url, track.as_ref().map(TrackMetadata::from))?;
        self.store.dispatch(PlayerAction::SetTrack(Some(id))).await;

        if was_playing || from_stream_end {
            self.engine.play().await?;
            self.store.dispatch(PlayerAction::Play).await;
        } else {
            self.store.dispatch(PlayerAction::Pause).await;
        }
        Ok(true)
    }

    /// Continue after the loaded stream played to its end
    async fn handle_stream_end(&self) -> Result<()> {
        let _guard = self.commands.lock().await;
        let repeat = self.store.state().repeat;

        if repeat == RepeatMode::One {
            debug!("Repeating current track");
            self.engine.seek(0.0);
            self.engine.play().await?;
            self.store.dispatch(PlayerAction::Play).await;
            return Ok(());
        }

        self.navigate(Direction::Next, true).await?;
        if !self.engine.is_playing() {
            self.store.dispatch(PlayerAction::Pause).await;
        }
        Ok(())
    }

    pub async fn seek(&self, seconds: f64) {
        let _guard = self.commands.lock().await;
        self.engine.seek(seconds);
    }

    /// Replace the queue; the pointer follows the current track if queued
    pub async fn set_queue(&self, tracks: Vec<TrackId>) {
        let _guard = self.commands.lock().await;
        let current = self.store.state().current_track_id;
        lock(&self.queue).set_tracks(tracks, current.as_ref());
        self.emit_queue_changed();
    }

    pub async fn toggle_shuffle(&self) -> bool {
        let _guard = self.commands.lock().await;
        let (_, after) = self.store.dispatch(PlayerAction::ToggleShuffle).await;
        lock(&self.queue).reset_shuffle();
        after.shuffle
    }

    /// Set the repeat mode from its string form; unknown modes are ignored
    /// and return false
    pub async fn set_repeat(&self, mode: &str) -> bool {
        let _guard = self.commands.lock().await;
        match mode.parse::<RepeatMode>() {
            Ok(mode) => {
                self.store.dispatch(PlayerAction::SetRepeat(mode)).await;
                true
            }
            Err(_) => {
                debug!("Ignoring unknown repeat mode '{}'", mode);
                false
            }
        }
    }

    fn emit_queue_changed(&self) {
        let (length, index) = {
            let queue = lock(&self.queue);
            (queue.len(), queue.index())
        };
        self.events.emit_lossy(PlayerEvent::QueueChanged {
            length,
            index,
            timestamp: Utc::now(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
