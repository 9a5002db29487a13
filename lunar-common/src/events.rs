//! Event types and broadcast bus
//!
//! Every observable change in the player is published as a [`LunarEvent`] on
//! the [`EventBus`]. The HTTP layer forwards these to browsers over SSE; tests
//! subscribe to assert on side effects without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Desired transport state of the primary channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn from_playing(is_playing: bool) -> Self {
        if is_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Repeat policy for the primary playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Rotate OFF -> ALL -> ONE -> OFF
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

/// Why the playlist changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistChangeTrigger {
    Added,
    Removed,
    Replaced,
}

/// How a zen fade-out ramp finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZenOutcome {
    /// Ramp reached the floor and stopped playback
    Completed,
    /// User paused during the ramp; volume restored early
    Interrupted,
    /// User changed the volume during the ramp; their value stands
    Cancelled,
}

/// Lunar event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LunarEvent {
    /// Desired play/pause state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Selection moved to a different playlist position
    TrackChanged {
        index: usize,
        track_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A play attempt on the primary resource succeeded
    TrackStarted {
        track_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The primary resource reached the natural end of a track
    TrackEnded {
        track_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Play was refused (autoplay policy); a retry may succeed
    PlaybackBlocked {
        /// Track id, or ambience layer id for layer channels
        source_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Play failed for a non-policy reason (decode, missing source)
    PlaybackFailed {
        source_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The media resource reported an error while loaded
    MediaError {
        track_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Playlist contents changed
    PlaylistChanged {
        trigger: PlaylistChangeTrigger,
        length: usize,
        current_index: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// Primary desired volume changed (0.0-1.0)
    VolumeChanged {
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Shuffle or repeat policy changed
    ModeChanged {
        shuffle: bool,
        repeat: RepeatMode,
        timestamp: DateTime<Utc>,
    },

    /// Ambience layer toggled or re-levelled
    LayerChanged {
        layer_id: String,
        is_active: bool,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Zen fade-out ramp began
    ZenStarted {
        from_volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Zen fade-out ramp ended
    ZenFinished {
        outcome: ZenOutcome,
        volume: f32,
        timestamp: DateTime<Utc>,
    },
}

impl LunarEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LunarEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            LunarEvent::TrackChanged { .. } => "TrackChanged",
            LunarEvent::TrackStarted { .. } => "TrackStarted",
            LunarEvent::TrackEnded { .. } => "TrackEnded",
            LunarEvent::PlaybackBlocked { .. } => "PlaybackBlocked",
            LunarEvent::PlaybackFailed { .. } => "PlaybackFailed",
            LunarEvent::MediaError { .. } => "MediaError",
            LunarEvent::PlaylistChanged { .. } => "PlaylistChanged",
            LunarEvent::VolumeChanged { .. } => "VolumeChanged",
            LunarEvent::ModeChanged { .. } => "ModeChanged",
            LunarEvent::LayerChanged { .. } => "LayerChanged",
            LunarEvent::ZenStarted { .. } => "ZenStarted",
            LunarEvent::ZenFinished { .. } => "ZenFinished",
        }
    }
}

/// Broadcast bus for [`LunarEvent`]s
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and lose
/// the oldest events rather than blocking emitters.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LunarEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LunarEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LunarEvent,
    ) -> Result<usize, broadcast::error::SendError<LunarEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: LunarEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_cycle() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.capacity(), 16);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        let event = LunarEvent::VolumeChanged {
            volume: 0.3,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        // Lossy variant must not panic
        bus.emit_lossy(event);
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(LunarEvent::PlaybackStateChanged {
            old_state: PlaybackState::Paused,
            new_state: PlaybackState::Playing,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            LunarEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlaybackState::Paused);
                assert_eq!(new_state, PlaybackState::Playing);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LunarEvent::ModeChanged {
            shuffle: true,
            repeat: RepeatMode::One,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ModeChanged");
        assert_eq!(json["repeat"], "one");
        assert_eq!(event.event_type(), "ModeChanged");
    }
}
