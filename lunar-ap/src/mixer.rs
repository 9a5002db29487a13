//! Mixer facade
//!
//! Unified control surface over the playback session, the ambience bank and
//! the track catalog. Thin pass-through: playback rules live in
//! [`crate::playback`], layer rules in [`crate::ambience`].

use crate::ambience::{AmbienceBank, AmbienceLayer};
use crate::catalog::categories::CategorySummary;
use crate::catalog::{CategoryCatalog, ImportRequest, Track, TrackImporter};
use crate::config::TomlConfig;
use crate::error::{Error, Result};
use crate::media::MediaFactory;
use crate::playback::{PlaybackSession, SessionSettings, SessionSnapshot};
use lunar_common::{EventBus, LunarEvent, RepeatMode, TrackId, TrackIdGenerator};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// Read-only projection for the visualizer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizerProjection {
    /// Primary channel desired-playing, or any ambience layer on
    pub is_active: bool,
    pub accent_colors: Vec<String>,
}

/// Owns every player component for one process
pub struct Mixer {
    instance_id: Uuid,
    session: PlaybackSession,
    ambience: AmbienceBank,
    catalog: CategoryCatalog,
    importer: TrackImporter,
    events: Arc<EventBus>,
    accent_colors: Vec<String>,
}

impl Mixer {
    /// Build all components and seed the playlist from the initial category
    ///
    /// The seeded category is selected but not started; nothing plays until
    /// the user asks.
    pub fn start(
        config: &TomlConfig,
        factory: Arc<dyn MediaFactory>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let ids = Arc::new(TrackIdGenerator::new());
        let catalog = CategoryCatalog::from_config(&config.categories, &ids);
        let session = PlaybackSession::start(
            SessionSettings::from_config(config),
            factory.as_ref(),
            Arc::clone(&events),
        );
        let ambience = AmbienceBank::start(&config.layers, factory.as_ref(), Arc::clone(&events));

        let initial = config
            .initial_category
            .as_deref()
            .or_else(|| catalog.first_name());
        if let Some(name) = initial {
            session.replace_playlist(catalog.tracks(name)?, false);
            info!("Seeded playlist from category '{}'", name);
        }

        let instance_id = Uuid::new_v4();
        info!("Mixer started (instance {})", instance_id);
        Ok(Self {
            instance_id,
            session,
            ambience,
            catalog,
            importer: TrackImporter::new(ids),
            events,
            accent_colors: config.theme.accent_colors.clone(),
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Direct access to the session (tests, SSE snapshots)
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LunarEvent> {
        self.events.subscribe()
    }

    // Primary channel

    pub fn toggle_play(&self) -> Option<bool> {
        self.session.toggle_play()
    }

    pub fn play(&self) -> bool {
        self.session.play()
    }

    pub fn pause(&self) {
        self.session.pause()
    }

    pub fn retry(&self) -> bool {
        self.session.retry()
    }

    pub fn next(&self) -> Option<usize> {
        self.session.next(false)
    }

    pub fn previous(&self) -> Option<usize> {
        self.session.previous()
    }

    pub fn select_track(&self, index: usize) -> bool {
        self.session.select_track(index)
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.session.set_volume(volume)
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.session.toggle_shuffle()
    }

    pub fn cycle_repeat(&self) -> RepeatMode {
        self.session.cycle_repeat()
    }

    pub fn zen_fade_out(&self) -> bool {
        self.session.zen_fade_out()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // Catalog

    /// Upload local files; all-or-nothing
    pub async fn upload_files(&self, paths: Vec<PathBuf>) -> Result<Vec<Track>> {
        let importer = self.importer.clone();
        let tracks = tokio::task::spawn_blocking(move || importer.tracks_from_files(&paths))
            .await
            .map_err(|e| Error::Internal(format!("Upload task failed: {}", e)))??;
        self.session.add_tracks(tracks.clone());
        Ok(tracks)
    }

    pub fn import_url(&self, request: ImportRequest) -> Result<Track> {
        let track = self.importer.track_from_url(request)?;
        info!("Imported {} as {}", track.source, track.id);
        self.session.add_tracks(vec![track.clone()]);
        Ok(track)
    }

    pub fn remove_track(&self, id: &TrackId) -> Option<Track> {
        self.session.remove_track(id)
    }

    pub fn categories(&self) -> Vec<CategorySummary> {
        self.catalog.summaries()
    }

    /// Replace the playlist with a preset and start it
    pub fn switch_category(&self, name: &str) -> Result<usize> {
        let tracks = self.catalog.tracks(name)?;
        let count = tracks.len();
        self.session.replace_playlist(tracks, true);
        info!("Switched to category '{}'", name);
        Ok(count)
    }

    // Ambience

    pub fn layers(&self) -> Vec<AmbienceLayer> {
        self.ambience.layers()
    }

    pub fn toggle_layer(&self, id: &str) -> Option<AmbienceLayer> {
        self.ambience.toggle(id)
    }

    pub fn set_layer_volume(&self, id: &str, volume: f32) -> Option<AmbienceLayer> {
        self.ambience.set_volume(id, volume)
    }

    pub fn visualizer(&self) -> VisualizerProjection {
        VisualizerProjection {
            is_active: self.session.is_playing() || self.ambience.any_active(),
            accent_colors: self.accent_colors.clone(),
        }
    }

    /// Stop every channel; the session's reconciler task ends here
    pub async fn shutdown(&self) {
        self.ambience.shutdown();
        self.session.shutdown().await;
        info!("Mixer shut down");
    }
}
