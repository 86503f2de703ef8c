//! Event types for the Tunedeck event system
//!
//! One-to-many broadcasting of player events (state changes, track changes,
//! throttled progress) to any number of listeners, e.g. SSE clients.

use crate::track::{RepeatMode, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playing flag flipped
    PlaybackStateChanged {
        playing: bool,
        timestamp: DateTime<Utc>,
    },

    /// Current track identity changed (None = nothing selected)
    TrackChanged {
        track_id: Option<TrackId>,
        timestamp: DateTime<Utc>,
    },

    /// UI volume changed (0-100)
    VolumeChanged {
        volume: u8,
        timestamp: DateTime<Utc>,
    },

    /// Shuffle toggled
    ShuffleChanged {
        shuffle: bool,
        timestamp: DateTime<Utc>,
    },

    /// Repeat mode changed
    RepeatChanged {
        repeat: RepeatMode,
        timestamp: DateTime<Utc>,
    },

    /// Queue contents or pointer changed
    QueueChanged {
        length: usize,
        index: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// Playback position update (throttled)
    PlaybackProgress {
        current_time: f64,
        /// None while the duration is still unknown
        duration: Option<f64>,
        buffered: f64,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::TrackChanged { .. } => "TrackChanged",
            PlayerEvent::VolumeChanged { .. } => "VolumeChanged",
            PlayerEvent::ShuffleChanged { .. } => "ShuffleChanged",
            PlayerEvent::RepeatChanged { .. } => "RepeatChanged",
            PlayerEvent::QueueChanged { .. } => "QueueChanged",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
        }
    }
}

/// Broadcast bus for player events
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow receivers lag and lose
/// the oldest events rather than blocking emitters.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use tunedeck_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        let event = PlayerEvent::PlaybackStateChanged {
            playing: true,
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        // Lossy emit never fails
        bus.emit_lossy(event);
    }

    #[tokio::test]
    async fn test_eventbus_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(PlayerEvent::TrackChanged {
            track_id: Some(TrackId::from("t2")),
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            PlayerEvent::TrackChanged { track_id, .. } => {
                assert_eq!(track_id, Some(TrackId::from("t2")));
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PlayerEvent::RepeatChanged {
            repeat: RepeatMode::All,
            timestamp: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RepeatChanged");
        assert_eq!(json["repeat"], "all");
        assert_eq!(event.event_type(), "RepeatChanged");
    }

    #[test]
    fn test_progress_unknown_duration_is_null() {
        let event = PlayerEvent::PlaybackProgress {
            current_time: 0.0,
            duration: None,
            buffered: 0.0,
            timestamp: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert!(json["duration"].is_null());
    }
}
