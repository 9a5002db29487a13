//! Reconciler for the primary media resource
//!
//! Single task that exclusively owns the primary [`MediaResource`] and drives
//! it toward the latest [`Desired`] state. Invariants:
//!
//! - At most one play call is outstanding. A new play is only issued once the
//!   previous attempt has settled.
//! - Before loading a different track, any in-flight play is paused and its
//!   settlement awaited; interruption is expected and discarded.
//! - After every await the latest desired state is re-read, so a superseded
//!   intent never starts playback.
//! - Play failures are classified and reported; they never end the loop and
//!   never change the user's intent.

use super::session::SessionInner;
use super::state::{Desired, ResourceState};
use crate::catalog::Track;
use crate::media::{MediaError, MediaEvent, MediaResource, PendingPlay};
use chrono::Utc;
use lunar_common::{EventBus, LunarEvent, TrackId};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// A play call awaiting settlement
struct PendingAttempt {
    play: PendingPlay,
    track_id: TrackId,
    retry_epoch: u64,
}

/// A start that was refused; not retried until re-armed
struct BlockedStart {
    track_id: TrackId,
    retry_epoch: u64,
    reason: String,
}

pub(crate) struct Reconciler {
    resource: Box<dyn MediaResource>,
    desired_rx: watch::Receiver<Desired>,
    actual_tx: watch::Sender<ResourceState>,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
    session: Weak<SessionInner>,
    events: Arc<EventBus>,
    loaded: Option<Track>,
    generation: u64,
    pending: Option<PendingAttempt>,
    blocked: Option<BlockedStart>,
    restart_epoch: u64,
    applied_revision: u64,
}

/// Resolves when the outstanding attempt settles; never if there is none
async fn settle(pending: &mut Option<PendingAttempt>) -> Result<(), MediaError> {
    match pending {
        Some(attempt) => (&mut attempt.play).await,
        None => std::future::pending().await,
    }
}

impl Reconciler {
    pub(crate) fn new(
        resource: Box<dyn MediaResource>,
        desired_rx: watch::Receiver<Desired>,
        actual_tx: watch::Sender<ResourceState>,
        media_rx: mpsc::UnboundedReceiver<MediaEvent>,
        session: Weak<SessionInner>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            resource,
            desired_rx,
            actual_tx,
            media_rx,
            session,
            events,
            loaded: None,
            generation: 0,
            pending: None,
            blocked: None,
            restart_epoch: 0,
            applied_revision: 0,
        }
    }

    pub(crate) async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        debug!("Reconciler started");
        self.reconcile().await;
        self.publish();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = self.desired_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.reconcile().await;
                }
                result = settle(&mut self.pending) => {
                    self.on_play_settled(result);
                    self.reconcile().await;
                }
                Some(event) = self.media_rx.recv() => self.on_media_event(event),
            }
            self.publish();
        }

        self.dispose().await;
    }

    /// Drive the resource toward the latest desired state
    async fn reconcile(&mut self) {
        let desired = self.desired_rx.borrow_and_update().clone();
        let target = desired.track_id().cloned();
        let loaded = self.loaded.as_ref().map(|t| t.id.clone());

        if target != loaded {
            if !self.switch_track(desired.track.clone()).await {
                // Intent moved on while we waited; the next pass handles it
                return;
            }
            self.restart_epoch = desired.restart_epoch;
        } else if desired.restart_epoch != self.restart_epoch {
            self.restart_epoch = desired.restart_epoch;
            if self.loaded.is_some() {
                debug!("Restarting current track from the top");
                self.resource.seek(Duration::ZERO);
            }
        }

        if let Some(blocked) = &self.blocked {
            let still_blocked = desired.playing
                && blocked.retry_epoch == desired.retry_epoch
                && Some(&blocked.track_id) == target.as_ref();
            if !still_blocked {
                debug!("Blocked start for {} re-armed", blocked.track_id);
                self.blocked = None;
            }
        }

        if desired.playing {
            let idle = self.resource.is_paused() && self.pending.is_none();
            if idle && self.blocked.is_none() {
                if let Some(track) = &self.loaded {
                    let track_id = track.id.clone();
                    self.resource.set_volume(desired.volume);
                    self.start_play(track_id, desired.retry_epoch);
                }
            }
        } else if !self.resource.is_paused() || self.pending.is_some() {
            debug!("Pausing primary resource");
            self.resource.pause();
        }

        self.resource.set_volume(desired.volume);
        self.applied_revision = desired.revision;
        trace!("Applied desired revision {}", desired.revision);
    }

    /// Stop whatever is in flight, then load `target` (or unload)
    ///
    /// Returns `false` when the desired state changed during the wait.
    async fn switch_track(&mut self, target: Option<Track>) -> bool {
        self.resource.pause();
        if let Some(attempt) = self.pending.take() {
            match attempt.play.await {
                Ok(()) => debug!("Earlier play for {} settled before switch", attempt.track_id),
                Err(MediaError::Interrupted) => {
                    debug!("Play for {} superseded by track switch", attempt.track_id)
                }
                Err(e) => debug!("Earlier play for {} failed: {}", attempt.track_id, e),
            }
        }
        self.blocked = None;

        match target {
            Some(track) => {
                self.generation = self.resource.load(&track.source, track.duration());
                info!("Loaded track {} ({})", track.id, track.title);
                self.loaded = Some(track);
            }
            None => {
                if self.loaded.take().is_some() {
                    self.resource.unload();
                    info!("Primary resource detached");
                }
            }
        }

        !self.desired_rx.has_changed().unwrap_or(false)
    }

    fn start_play(&mut self, track_id: TrackId, retry_epoch: u64) {
        debug!("Issuing play for {}", track_id);
        let play = self.resource.play();
        self.pending = Some(PendingAttempt {
            play,
            track_id,
            retry_epoch,
        });
    }

    fn on_play_settled(&mut self, result: Result<(), MediaError>) {
        let Some(attempt) = self.pending.take() else {
            return;
        };
        let current = self.loaded.as_ref().map(|t| &t.id) == Some(&attempt.track_id);

        match result {
            Ok(()) => {
                if current {
                    info!("Playback started: {}", attempt.track_id);
                    self.emit(LunarEvent::TrackStarted {
                        track_id: attempt.track_id.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(MediaError::Interrupted) => {
                debug!("Play for {} interrupted; discarded", attempt.track_id);
            }
            Err(MediaError::Blocked(reason)) => {
                warn!("Playback blocked for {}: {}", attempt.track_id, reason);
                if current {
                    self.emit(LunarEvent::PlaybackBlocked {
                        source_id: attempt.track_id.to_string(),
                        reason: reason.clone(),
                        timestamp: Utc::now(),
                    });
                    self.blocked = Some(BlockedStart {
                        track_id: attempt.track_id,
                        retry_epoch: attempt.retry_epoch,
                        reason,
                    });
                }
            }
            Err(e) => {
                error!("Playback failed for {}: {}", attempt.track_id, e);
                if current {
                    let reason = e.to_string();
                    self.emit(LunarEvent::PlaybackFailed {
                        source_id: attempt.track_id.to_string(),
                        reason: reason.clone(),
                        timestamp: Utc::now(),
                    });
                    self.blocked = Some(BlockedStart {
                        track_id: attempt.track_id,
                        retry_epoch: attempt.retry_epoch,
                        reason,
                    });
                }
            }
        }
    }

    fn on_media_event(&mut self, event: MediaEvent) {
        if event.generation() != self.generation {
            trace!("Ignoring media event from superseded load: {:?}", event);
            return;
        }
        let Some(track_id) = self.loaded.as_ref().map(|t| t.id.clone()) else {
            return;
        };

        match event {
            MediaEvent::CanPlay { .. } => debug!("Track {} ready", track_id),
            MediaEvent::Ended { .. } => {
                info!("Track ended: {}", track_id);
                self.emit(LunarEvent::TrackEnded {
                    track_id: track_id.to_string(),
                    timestamp: Utc::now(),
                });
                if let Some(session) = self.session.upgrade() {
                    session.handle_track_ended(&track_id);
                }
            }
            MediaEvent::Error { message, .. } => {
                warn!("Media error on {}: {}", track_id, message);
                self.emit(LunarEvent::MediaError {
                    track_id: track_id.to_string(),
                    message,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn emit(&self, event: LunarEvent) {
        self.events.emit_lossy(event);
    }

    fn publish(&self) {
        self.actual_tx.send_replace(ResourceState {
            loaded: self.loaded.as_ref().map(|t| t.id.clone()),
            duration: self.loaded.as_ref().and_then(|t| t.duration()),
            paused: self.resource.is_paused(),
            position: self.resource.position(),
            sampled_at: Instant::now(),
            play_pending: self.pending.is_some(),
            blocked: self.blocked.as_ref().map(|b| b.reason.clone()),
            applied_revision: self.applied_revision,
            volume: self.resource.volume(),
        });
    }

    async fn dispose(mut self) {
        self.resource.pause();
        if let Some(attempt) = self.pending.take() {
            let _ = attempt.play.await;
        }
        self.publish();
        debug!("Reconciler stopped");
    }
}
