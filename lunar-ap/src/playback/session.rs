//! Playback session
//!
//! Owns the playlist, playback mode and [`Intent`] for the primary channel.
//! Every public method mutates intent under one lock, emits events, and
//! publishes a new [`Desired`] snapshot for the reconciler. None of them
//! touch the media resource, and none of them block on it.

use super::mode::PlaybackMode;
use super::reconciler::Reconciler;
use super::selection::{self, Advance, History, ShufflePreviousPolicy};
use super::state::{Desired, Intent, ResourceState};
use super::zen::{ZenRamp, ZenSettings};
use crate::catalog::{Playlist, Removal, Track};
use crate::config::TomlConfig;
use crate::media::{MediaEvent, MediaFactory, MediaResource};
use chrono::Utc;
use lunar_common::events::{PlaylistChangeTrigger, ZenOutcome};
use lunar_common::{EventBus, LunarEvent, PlaybackState, RepeatMode, TrackId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Label of the primary media resource
pub const PRIMARY_LABEL: &str = "primary";

/// Session tuning taken from the bootstrap config
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub initial_volume: f32,
    pub previous_restart_threshold: Duration,
    pub shuffle_previous: ShufflePreviousPolicy,
    pub shuffle_seed: Option<u64>,
    pub zen: ZenSettings,
}

impl SessionSettings {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            initial_volume: config.playback.initial_volume,
            previous_restart_threshold: config.previous_restart_threshold(),
            shuffle_previous: config.playback.shuffle_previous,
            shuffle_seed: config.playback.shuffle_seed,
            zen: ZenSettings::from(&config.zen),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

/// Serializable view of the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub volume: f32,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub loaded_track_id: Option<TrackId>,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub blocked: Option<String>,
    pub zen_active: bool,
    pub track_count: usize,
    pub uploaded_count: usize,
}

pub(crate) struct SessionState {
    pub(crate) playlist: Playlist,
    pub(crate) mode: PlaybackMode,
    pub(crate) intent: Intent,
    pub(crate) history: History,
    pub(crate) revision: u64,
    pub(crate) rng: StdRng,
    pub(crate) zen: Option<ZenRamp>,
    pub(crate) zen_seq: u64,
}

pub(crate) struct SessionInner {
    state: Mutex<SessionState>,
    desired_tx: watch::Sender<Desired>,
    actual_rx: watch::Receiver<ResourceState>,
    events: Arc<EventBus>,
    pub(crate) settings: SessionSettings,
    reconciler: Mutex<Option<(oneshot::Sender<()>, JoinHandle<()>)>>,
}

/// Handle to the primary playback session
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct PlaybackSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl PlaybackSession {
    /// Create the primary resource through `factory` and start the reconciler
    pub fn start(
        settings: SessionSettings,
        factory: &dyn MediaFactory,
        events: Arc<EventBus>,
    ) -> Self {
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let resource = factory.create(PRIMARY_LABEL, media_tx);
        Self::with_resource(settings, resource, media_rx, events)
    }

    /// Start a session around an existing resource and its event channel
    pub fn with_resource(
        settings: SessionSettings,
        resource: Box<dyn MediaResource>,
        media_rx: mpsc::UnboundedReceiver<MediaEvent>,
        events: Arc<EventBus>,
    ) -> Self {
        let (desired_tx, desired_rx) = watch::channel(Desired::initial(settings.initial_volume));
        let (actual_tx, actual_rx) = watch::channel(ResourceState::initial());
        let rng = match settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let state = SessionState {
            playlist: Playlist::default(),
            mode: PlaybackMode::default(),
            intent: Intent::new(settings.initial_volume),
            history: History::default(),
            revision: 0,
            rng,
            zen: None,
            zen_seq: 0,
        };

        let inner = Arc::new(SessionInner {
            state: Mutex::new(state),
            desired_tx,
            actual_rx,
            events: Arc::clone(&events),
            settings,
            reconciler: Mutex::new(None),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reconciler = Reconciler::new(
            resource,
            desired_rx,
            actual_tx,
            media_rx,
            Arc::downgrade(&inner),
            events,
        );
        let handle = tokio::spawn(reconciler.run(shutdown_rx));
        *inner
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((shutdown_tx, handle));

        info!("Playback session started");
        Self { inner }
    }

    /// Flip desired play/pause; `None` when there is no current track
    pub fn toggle_play(&self) -> Option<bool> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.playlist.current()?;

        state.intent.detached = false;
        let playing = !state.intent.is_playing;
        if playing {
            state.intent.retry_epoch += 1;
        }
        self.inner.set_playing(state, playing);
        self.inner.publish(state);
        info!("Toggle play -> {}", PlaybackState::from_playing(playing));
        Some(playing)
    }

    /// Desire playback; doubles as "tap to resume" after a blocked start
    pub fn play(&self) -> bool {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.playlist.current().is_none() {
            debug!("Play ignored: no current track");
            return false;
        }

        state.intent.detached = false;
        state.intent.retry_epoch += 1;
        self.inner.set_playing(state, true);
        self.inner.publish(state);
        info!("Play");
        true
    }

    pub fn pause(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        self.inner.set_playing(state, false);
        self.inner.publish(state);
        info!("Pause");
    }

    /// Re-arm a blocked start without changing intent
    pub fn retry(&self) -> bool {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if !state.intent.is_playing || state.playlist.current().is_none() {
            return false;
        }
        state.intent.retry_epoch += 1;
        self.inner.publish(state);
        info!("Retry playback");
        true
    }

    /// Advance the selection; `auto` marks a natural track end
    ///
    /// Returns the resulting index, `None` on an empty playlist.
    pub fn next(&self, auto: bool) -> Option<usize> {
        let mut guard = self.inner.lock();
        self.inner.advance(&mut guard, auto)
    }

    /// Restart the current track, or step back when near its start
    pub fn previous(&self) -> Option<usize> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let current = state.playlist.current_index()?;
        let position = self.inner.position_of_current(state);

        let advance = if position > self.inner.settings.previous_restart_threshold {
            Advance::Restart
        } else {
            selection::previous_target(
                current,
                state.playlist.len(),
                state.mode,
                self.inner.settings.shuffle_previous,
                &mut state.history,
                &mut state.rng,
            )?
        };

        let index = match advance {
            Advance::Move(index) => {
                self.inner.move_to(state, index, false);
                self.inner.set_playing(state, true);
                index
            }
            _ => {
                state.intent.restart_epoch += 1;
                state.intent.detached = false;
                current
            }
        };
        self.inner.publish(state);
        info!("Previous at {:?} -> index {}", position, index);
        Some(index)
    }

    /// Jump to `index` and desire playback; out-of-range is a no-op
    pub fn select_track(&self, index: usize) -> bool {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if index >= state.playlist.len() {
            warn!(
                "Select ignored: index {} out of range (len {})",
                index,
                state.playlist.len()
            );
            return false;
        }

        self.inner.move_to(state, index, true);
        state.intent.retry_epoch += 1;
        self.inner.set_playing(state, true);
        self.inner.publish(state);
        info!("Selected track {}", index);
        true
    }

    /// Set desired volume, clamped to 0.0-1.0; returns the applied value
    pub fn set_volume(&self, volume: f32) -> f32 {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return state.intent.volume;
        }

        let volume = volume.clamp(0.0, 1.0);
        state.intent.volume = volume;
        if state.zen.take().is_some() {
            info!("Zen fade-out cancelled by volume change");
            self.inner.emit(LunarEvent::ZenFinished {
                outcome: ZenOutcome::Cancelled,
                volume,
                timestamp: Utc::now(),
            });
        }
        self.inner.emit(LunarEvent::VolumeChanged {
            volume,
            timestamp: Utc::now(),
        });
        self.inner.publish(state);
        debug!("Volume -> {:.2}", volume);
        volume
    }

    pub fn toggle_shuffle(&self) -> bool {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let shuffle = state.mode.toggle_shuffle();
        self.inner.emit_mode(state);
        info!("Shuffle -> {}", shuffle);
        shuffle
    }

    pub fn cycle_repeat(&self) -> RepeatMode {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let repeat = state.mode.cycle_repeat();
        self.inner.emit_mode(state);
        info!("Repeat -> {:?}", repeat);
        repeat
    }

    /// Append tracks; filling an empty playlist selects and plays the first
    pub fn add_tracks(&self, tracks: Vec<Track>) -> usize {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if tracks.is_empty() {
            return state.playlist.len();
        }

        let added = tracks.len();
        if state.playlist.append(tracks) {
            state.intent.detached = false;
            state.history.clear();
            self.inner.emit_track_changed(state);
            self.inner.set_playing(state, true);
        }
        self.inner
            .emit_playlist_changed(state, PlaylistChangeTrigger::Added);
        self.inner.publish(state);
        info!(
            "Added {} track(s), playlist length {}",
            added,
            state.playlist.len()
        );
        state.playlist.len()
    }

    /// Remove a track by id
    ///
    /// Removing the current track stops playback and detaches the resource
    /// until something is selected again.
    pub fn remove_track(&self, id: &TrackId) -> Option<Track> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let removal = state.playlist.remove(id)?;
        state.history.clear();

        let track = match removal {
            Removal::Current(track) => {
                self.inner.set_playing(state, false);
                state.intent.detached = true;
                info!("Removed current track {}; playback stopped", track.id);
                track
            }
            Removal::BeforeCurrent(track) | Removal::AfterCurrent(track) => {
                info!("Removed track {}", track.id);
                track
            }
        };

        self.inner
            .emit_playlist_changed(state, PlaylistChangeTrigger::Removed);
        self.inner.publish(state);
        Some(track)
    }

    /// Swap the whole playlist (category switch); index resets to 0
    pub fn replace_playlist(&self, tracks: Vec<Track>, play: bool) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.playlist.replace(tracks);
        state.history.clear();
        state.intent.detached = false;
        state.intent.restart_epoch += 1;
        state.intent.retry_epoch += 1;

        if !state.playlist.is_empty() {
            self.inner.emit_track_changed(state);
        }
        let playing = play && !state.playlist.is_empty();
        self.inner.set_playing(state, playing);
        self.inner
            .emit_playlist_changed(state, PlaylistChangeTrigger::Replaced);
        self.inner.publish(state);
        info!(
            "Playlist replaced ({} tracks, playing: {})",
            state.playlist.len(),
            playing
        );
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().intent.is_playing
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().intent.volume
    }

    pub fn current_index(&self) -> Option<usize> {
        self.inner.lock().playlist.current_index()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.inner.lock().playlist.current().cloned()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.inner.lock().playlist.tracks().to_vec()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.inner.lock().mode
    }

    pub fn zen_active(&self) -> bool {
        self.inner.lock().zen.is_some()
    }

    /// Latest state published by the reconciler
    pub fn resource_state(&self) -> ResourceState {
        self.inner.actual_rx.borrow().clone()
    }

    /// Wait until the reconciler has applied the latest intent and no play
    /// attempt is outstanding
    pub async fn settled(&self) {
        let target = self.inner.lock().revision;
        let mut actual = self.inner.actual_rx.clone();
        let _ = actual
            .wait_for(|s| s.applied_revision >= target && !s.play_pending)
            .await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock();
        let actual = self.inner.actual_rx.borrow().clone();
        let current_track = guard.playlist.current().cloned();
        let position = if actual.loaded.is_some()
            && actual.loaded.as_ref() == current_track.as_ref().map(|t| &t.id)
        {
            actual.position_now()
        } else {
            Duration::ZERO
        };

        SessionSnapshot {
            tracks: guard.playlist.tracks().to_vec(),
            current_index: guard.playlist.current_index(),
            duration_ms: current_track.as_ref().and_then(|t| t.duration_ms),
            current_track,
            is_playing: guard.intent.is_playing,
            volume: guard.intent.volume,
            shuffle: guard.mode.shuffle,
            repeat: guard.mode.repeat,
            loaded_track_id: actual.loaded,
            position_ms: position.as_millis() as u64,
            blocked: actual.blocked,
            zen_active: guard.zen.is_some(),
            track_count: guard.playlist.len(),
            uploaded_count: guard.playlist.uploaded_count(),
        }
    }

    /// Pause the resource, settle any pending play and stop the reconciler
    pub async fn shutdown(&self) {
        {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            state.zen = None;
        }
        let reconciler = self
            .inner
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((shutdown_tx, handle)) = reconciler {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                warn!("Reconciler task ended abnormally: {}", e);
            }
            info!("Playback session stopped");
        }
    }
}

impl SessionInner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: LunarEvent) {
        self.events.emit_lossy(event);
    }

    /// Publish the intent as a new desired revision
    pub(crate) fn publish(&self, state: &mut SessionState) {
        state.revision += 1;
        let track = if state.intent.detached {
            None
        } else {
            state.playlist.current().cloned()
        };
        self.desired_tx.send_replace(Desired {
            revision: state.revision,
            track,
            playing: state.intent.is_playing,
            volume: state.intent.volume,
            restart_epoch: state.intent.restart_epoch,
            retry_epoch: state.intent.retry_epoch,
        });
    }

    /// Change desired play state; stopping mid-ramp ends the zen fade and
    /// restores the pre-ramp volume
    pub(crate) fn set_playing(&self, state: &mut SessionState, playing: bool) {
        let old = state.intent.is_playing;
        state.intent.is_playing = playing;

        if !playing {
            if let Some(ramp) = state.zen.take() {
                state.intent.volume = ramp.restore_volume;
                info!(
                    "Zen fade-out interrupted; volume restored to {:.2}",
                    ramp.restore_volume
                );
                self.emit(LunarEvent::VolumeChanged {
                    volume: ramp.restore_volume,
                    timestamp: Utc::now(),
                });
                self.emit(LunarEvent::ZenFinished {
                    outcome: ZenOutcome::Interrupted,
                    volume: ramp.restore_volume,
                    timestamp: Utc::now(),
                });
            }
        }

        if old != playing {
            self.emit(LunarEvent::PlaybackStateChanged {
                old_state: PlaybackState::from_playing(old),
                new_state: PlaybackState::from_playing(playing),
                timestamp: Utc::now(),
            });
        }
    }

    /// Move the selection; `record` keeps the old index for history-based previous
    fn move_to(&self, state: &mut SessionState, index: usize, record: bool) {
        if let Some(old) = state.playlist.current_index() {
            if record && old != index {
                state.history.push(old);
            }
        }
        state.playlist.set_current(index);
        state.intent.detached = false;
        self.emit_track_changed(state);
    }

    pub(crate) fn advance(&self, state: &mut SessionState, auto: bool) -> Option<usize> {
        let current = state.playlist.current_index()?;
        let advance = selection::next_target(
            current,
            state.playlist.len(),
            state.mode,
            auto,
            &mut state.rng,
        )?;

        let index = match advance {
            Advance::Move(index) => {
                self.move_to(state, index, true);
                self.set_playing(state, true);
                index
            }
            Advance::Restart => {
                state.intent.restart_epoch += 1;
                state.intent.detached = false;
                if !auto {
                    self.set_playing(state, true);
                }
                current
            }
            Advance::Stop => {
                info!("End of playlist reached; stopping");
                self.set_playing(state, false);
                current
            }
        };

        self.publish(state);
        info!("Next (auto: {}) -> index {}", auto, index);
        Some(index)
    }

    /// Natural end reported by the reconciler for `track_id`
    pub(crate) fn handle_track_ended(&self, track_id: &TrackId) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.intent.detached {
            return;
        }
        match state.playlist.current() {
            Some(track) if &track.id == track_id => {
                self.advance(state, true);
            }
            _ => debug!("Ignoring end of non-current track {}", track_id),
        }
    }

    fn position_of_current(&self, state: &SessionState) -> Duration {
        let actual = self.actual_rx.borrow();
        match (state.playlist.current(), actual.loaded.as_ref()) {
            (Some(track), Some(loaded)) if &track.id == loaded && !state.intent.detached => {
                actual.position_now()
            }
            _ => Duration::ZERO,
        }
    }

    fn emit_track_changed(&self, state: &SessionState) {
        if let (Some(index), Some(track)) =
            (state.playlist.current_index(), state.playlist.current())
        {
            self.emit(LunarEvent::TrackChanged {
                index,
                track_id: track.id.to_string(),
                title: track.title.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    fn emit_playlist_changed(&self, state: &SessionState, trigger: PlaylistChangeTrigger) {
        self.emit(LunarEvent::PlaylistChanged {
            trigger,
            length: state.playlist.len(),
            current_index: state.playlist.current_index(),
            timestamp: Utc::now(),
        });
    }

    fn emit_mode(&self, state: &SessionState) {
        self.emit(LunarEvent::ModeChanged {
            shuffle: state.mode.shuffle,
            repeat: state.mode.repeat,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::track;
    use crate::media::VirtualMediaFactory;

    fn session() -> (PlaybackSession, Arc<VirtualMediaFactory>) {
        let factory = Arc::new(VirtualMediaFactory::default());
        let settings = SessionSettings {
            shuffle_seed: Some(3),
            ..SessionSettings::default()
        };
        let session =
            PlaybackSession::start(settings, factory.as_ref(), Arc::new(EventBus::default()));
        (session, factory)
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_without_track_is_noop() {
        let (session, _) = session();
        assert_eq!(session.toggle_play(), None);
        assert!(!session.play());
        assert!(!session.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_clamped_and_nan_ignored() {
        let (session, _) = session();
        assert_eq!(session.set_volume(1.7), 1.0);
        assert_eq!(session.set_volume(-0.2), 0.0);
        assert_eq!(session.set_volume(f32::NAN), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_out_of_range_is_noop() {
        let (session, _) = session();
        session.add_tracks(vec![track("a"), track("b")]);
        assert!(!session.select_track(5));
        assert_eq!(session.current_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_reaches_resource() {
        let (session, factory) = session();
        session.add_tracks(vec![track("a")]);
        session.settled().await;

        let control = factory.control(PRIMARY_LABEL).unwrap();
        assert!(control.is_playing());
        assert_eq!(
            session.resource_state().loaded,
            Some(TrackId::new("a"))
        );
        assert_eq!(control.volume(), session.volume());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_with_empty_stops() {
        let (session, _) = session();
        session.add_tracks(vec![track("a")]);
        session.replace_playlist(Vec::new(), true);
        assert!(!session.is_playing());
        assert_eq!(session.current_index(), None);
        session.settled().await;
        assert!(session.resource_state().loaded.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_pauses_resource() {
        let (session, factory) = session();
        session.add_tracks(vec![track("a")]);
        session.settled().await;
        session.shutdown().await;
        assert!(factory.control(PRIMARY_LABEL).unwrap().is_paused());
    }
}
