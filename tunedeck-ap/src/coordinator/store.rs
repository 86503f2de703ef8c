//! Player state store
//!
//! A pure reducer over [`PlayerAction`] plus a store that applies actions,
//! broadcasts what changed on the [`EventBus`] and writes changed persisted
//! fields to the settings store.

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;
use tunedeck_common::events::{EventBus, PlayerEvent};
use tunedeck_common::settings::{PlayerSettings, SettingsStore};
use tunedeck_common::{RepeatMode, TrackId};

/// Application-level player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    pub is_playing: bool,
    /// Currently selected track
    pub current_track_id: Option<TrackId>,
    /// Last selected track; survives `SetTrack(None)`
    pub last_track_id: Option<TrackId>,
    /// UI volume 0-100
    pub volume: u8,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::from_settings(PlayerSettings::default())
    }
}

impl PlayerState {
    pub fn from_settings(settings: PlayerSettings) -> Self {
        Self {
            is_playing: false,
            current_track_id: None,
            last_track_id: settings.last_track_id,
            volume: settings.volume,
            shuffle: settings.shuffle,
            repeat: settings.repeat,
        }
    }

    /// Persisted subset
    pub fn settings(&self) -> PlayerSettings {
        PlayerSettings {
            volume: self.volume,
            last_track_id: self.last_track_id.clone(),
            shuffle: self.shuffle,
            repeat: self.repeat,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    Play,
    Pause,
    /// Select a track (None clears the selection and stops the playing flag)
    SetTrack(Option<TrackId>),
    /// UI volume; NaN is ignored, other values clamp to 0-100
    SetVolume(f64),
    ToggleShuffle,
    SetRepeat(RepeatMode),
}

/// Apply one action
pub fn reduce(state: &PlayerState, action: &PlayerAction) -> PlayerState {
    let mut next = state.clone();
    match action {
        PlayerAction::Play => next.is_playing = true,
        PlayerAction::Pause => next.is_playing = false,
        PlayerAction::SetTrack(id) => {
            next.current_track_id = id.clone();
            if id.is_some() {
                next.last_track_id = id.clone();
            } else {
                next.is_playing = false;
            }
        }
        PlayerAction::SetVolume(volume) => {
            let volume = *volume;
            if !volume.is_nan() {
                next.volume = volume.clamp(0.0, 100.0).round() as u8;
            }
        }
        PlayerAction::ToggleShuffle => next.shuffle = !next.shuffle,
        PlayerAction::SetRepeat(mode) => next.repeat = *mode,
    }
    next
}

/// Events describing the difference between two states
pub fn change_events(before: &PlayerState, after: &PlayerState) -> Vec<PlayerEvent> {
    let timestamp = Utc::now();
    let mut events = Vec::new();

    if before.current_track_id != after.current_track_id {
        events.push(PlayerEvent::TrackChanged {
            track_id: after.current_track_id.clone(),
            timestamp,
        });
    }
    if before.is_playing != after.is_playing {
        events.push(PlayerEvent::PlaybackStateChanged {
            playing: after.is_playing,
            timestamp,
        });
    }
    if before.volume != after.volume {
        events.push(PlayerEvent::VolumeChanged {
            volume: after.volume,
            timestamp,
        });
    }
    if before.shuffle != after.shuffle {
        events.push(PlayerEvent::ShuffleChanged {
            shuffle: after.shuffle,
            timestamp,
        });
    }
    if before.repeat != after.repeat {
        events.push(PlayerEvent::RepeatChanged {
            repeat: after.repeat,
            timestamp,
        });
    }
    events
}

/// Shared player state with persistence and change broadcasting
pub struct PlayerStore {
    state: Mutex<PlayerState>,
    settings: Arc<dyn SettingsStore>,
    events: EventBus,
}

impl PlayerStore {
    /// Build the store from persisted settings
    pub async fn hydrate(settings: Arc<dyn SettingsStore>, events: EventBus) -> Self {
        let persisted = PlayerSettings::hydrate(settings.as_ref()).await;
        Self {
            state: Mutex::new(PlayerState::from_settings(persisted)),
            settings,
            events,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Apply an action; returns the state before and after
    pub async fn dispatch(&self, action: PlayerAction) -> (PlayerState, PlayerState) {
        let (before, after) = {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = state.clone();
            *state = reduce(&before, &action);
            (before, state.clone())
        };

        if before != after {
            debug!("{:?} applied", action);
            for event in change_events(&before, &after) {
                self.events.emit_lossy(event);
            }
            after
                .settings()
                .persist_changes(&before.settings(), self.settings.as_ref())
                .await;
        }

        (before, after)
    }
}
