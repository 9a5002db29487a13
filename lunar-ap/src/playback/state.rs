//! Intent and resource state
//!
//! The session owns [`Intent`]; facade calls mutate it and publish a
//! [`Desired`] snapshot. The reconciler owns the media resource and publishes
//! [`ResourceState`]. Nothing outside the reconciler writes `ResourceState`,
//! and nothing inside it writes `Intent`.

use crate::catalog::Track;
use lunar_common::TrackId;
use std::time::Duration;
use tokio::time::Instant;

/// What the user wants the primary channel to do
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub is_playing: bool,
    /// Desired volume, 0.0-1.0
    pub volume: f32,
    /// Bumped to request "seek to start" without changing selection
    pub restart_epoch: u64,
    /// Bumped by an explicit play/retry to re-arm a blocked start
    pub retry_epoch: u64,
    /// Current track was removed; nothing is targeted until the next selection
    pub detached: bool,
}

impl Intent {
    pub fn new(volume: f32) -> Self {
        Self {
            is_playing: false,
            volume,
            restart_epoch: 0,
            retry_epoch: 0,
            detached: false,
        }
    }
}

/// Intent resolved against the playlist, as handed to the reconciler
#[derive(Debug, Clone, PartialEq)]
pub struct Desired {
    /// Monotonic; every publish gets a new one
    pub revision: u64,
    pub track: Option<Track>,
    pub playing: bool,
    pub volume: f32,
    pub restart_epoch: u64,
    pub retry_epoch: u64,
}

impl Desired {
    pub fn initial(volume: f32) -> Self {
        Self {
            revision: 0,
            track: None,
            playing: false,
            volume,
            restart_epoch: 0,
            retry_epoch: 0,
        }
    }

    pub fn track_id(&self) -> Option<&TrackId> {
        self.track.as_ref().map(|t| &t.id)
    }
}

/// What the primary media resource is actually doing
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    /// Track identity currently loaded into the resource
    pub loaded: Option<TrackId>,
    pub duration: Option<Duration>,
    pub paused: bool,
    /// Position when sampled
    pub position: Duration,
    pub sampled_at: Instant,
    /// A play call is awaiting settlement
    pub play_pending: bool,
    /// Reason of the last refused/failed start, until re-armed
    pub blocked: Option<String>,
    /// Latest `Desired::revision` fully applied
    pub applied_revision: u64,
    pub volume: f32,
}

impl ResourceState {
    pub fn initial() -> Self {
        Self {
            loaded: None,
            duration: None,
            paused: true,
            position: Duration::ZERO,
            sampled_at: Instant::now(),
            play_pending: false,
            blocked: None,
            applied_revision: 0,
            volume: 0.0,
        }
    }

    /// Position extrapolated from the last sample
    pub fn position_now(&self) -> Duration {
        let position = if self.paused || self.play_pending {
            self.position
        } else {
            self.position + self.sampled_at.elapsed()
        };
        match self.duration {
            Some(d) => position.min(d),
            None => position,
        }
    }

    pub fn is_audible(&self) -> bool {
        self.loaded.is_some() && !self.paused && !self.play_pending
    }
}
