//! Media resource abstraction
//!
//! A [`MediaResource`] models one imperative audio element: `load`, `pause`,
//! `seek` and volume writes take effect immediately, while `play` returns a
//! [`PendingPlay`] that settles later and may fail (autoplay refusal, decode
//! failure, or interruption by a newer pause/load). Lifecycle notifications
//! arrive separately as [`MediaEvent`]s tagged with the load generation.

pub mod virtual_media;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use virtual_media::{
    MediaStats, VirtualMedia, VirtualMediaControl, VirtualMediaFactory, VirtualMediaOptions,
};

/// Why a play attempt did not start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Refused by playback policy (e.g. autoplay without a user gesture)
    #[error("playback blocked: {0}")]
    Blocked(String),

    /// Superseded by a pause or load before settling
    #[error("play request interrupted")]
    Interrupted,

    /// Source could not be decoded or fetched
    #[error("decode error: {0}")]
    Decode(String),

    /// Nothing is loaded
    #[error("no source loaded")]
    NoSource,
}

/// Settlement of one `play()` call
///
/// Dropping it is fine: the transport never depends on anyone awaiting it.
#[derive(Debug)]
pub struct PendingPlay {
    rx: oneshot::Receiver<Result<(), MediaError>>,
}

impl PendingPlay {
    pub fn new(rx: oneshot::Receiver<Result<(), MediaError>>) -> Self {
        Self { rx }
    }

    /// An already-settled attempt
    pub fn settled(result: Result<(), MediaError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for PendingPlay {
    type Output = Result<(), MediaError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the transport went away mid-attempt
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(MediaError::Interrupted)))
    }
}

/// Lifecycle notification from a resource
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Source for `generation` is ready to play
    CanPlay { generation: u64 },
    /// Playback of `generation` reached its natural end
    Ended { generation: u64 },
    /// Resource-level error while `generation` was loaded
    Error { generation: u64, message: String },
}

impl MediaEvent {
    pub fn generation(&self) -> u64 {
        match self {
            MediaEvent::CanPlay { generation }
            | MediaEvent::Ended { generation }
            | MediaEvent::Error { generation, .. } => *generation,
        }
    }
}

/// One imperative, promise-style audio output
pub trait MediaResource: Send {
    /// Replace the source; interrupts any pending play, resets position to 0
    /// and leaves the resource paused. Returns the new load generation.
    fn load(&mut self, source: &str, duration: Option<Duration>) -> u64;

    /// Drop the source entirely
    fn unload(&mut self);

    /// Start playback; settles once audio is actually running
    fn play(&mut self) -> PendingPlay;

    /// Stop playback immediately; always safe
    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn seek(&mut self, position: Duration);

    fn position(&self) -> Duration;

    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    fn set_looping(&mut self, looping: bool);
}

/// Creates media resources for the player
pub trait MediaFactory: Send + Sync {
    /// `label` names the channel ("primary" or a layer id) for logs and lookups
    fn create(&self, label: &str, events: mpsc::UnboundedSender<MediaEvent>)
        -> Box<dyn MediaResource>;
}
