//! HTTP request handlers
//!
//! Implements REST API endpoints for playback, playlist and ambience control.

use crate::ambience::AmbienceLayer;
use crate::api::server::AppContext;
use crate::catalog::categories::CategorySummary;
use crate::catalog::{ImportRequest, Track};
use crate::error::Error;
use crate::mixer::VisualizerProjection;
use crate::playback::SessionSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lunar_common::{PlaybackState, RepeatMode, TrackId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    instance_id: Uuid,
    port: u16,
}

#[derive(Debug, Serialize)]
pub struct BuildInfoResponse {
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

type ApiError = (StatusCode, Json<StatusResponse>);

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: i64, // 0-100 user-facing scale, clamped
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStateResponse {
    state: PlaybackState,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    current_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    index: usize,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    shuffle: bool,
    repeat: RepeatMode,
}

#[derive(Debug, Serialize)]
pub struct ZenResponse {
    started: bool,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    track_count: usize,
    uploaded_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    name: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    name: String,
    track_count: usize,
}

/// Map a lunar-ap error onto an HTTP status
fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Import(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (status, Json(StatusResponse::error(e.to_string())))
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(StatusResponse::error(message)))
}

fn not_found(message: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(StatusResponse::error(message)))
}

/// Convert user scale (0-100) to system scale (0.0-1.0), clamping out-of-range input
fn volume_from_user(volume: i64) -> f32 {
    volume.clamp(0, 100) as f32 / 100.0
}

fn volume_to_user(volume: f32) -> u8 {
    (volume * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Health / Build Info
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "lunar-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: ctx.mixer.instance_id(),
        port: ctx.port,
    })
}

/// GET /build_info - Build identification captured by build.rs
pub async fn get_build_info() -> Json<BuildInfoResponse> {
    Json(BuildInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// GET /playback/state - Full session snapshot
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<SessionSnapshot> {
    Json(ctx.mixer.snapshot())
}

pub async fn play(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    if ctx.mixer.play() {
        info!("Play command accepted");
        Ok(Json(StatusResponse::ok()))
    } else {
        Err(bad_request("No current track"))
    }
}

pub async fn pause(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.mixer.pause();
    info!("Pause command accepted");
    Json(StatusResponse::ok())
}

/// POST /playback/toggle - Flip desired play/pause
pub async fn toggle_play(
    State(ctx): State<AppContext>,
) -> Result<Json<PlaybackStateResponse>, ApiError> {
    match ctx.mixer.toggle_play() {
        Some(playing) => Ok(Json(PlaybackStateResponse {
            state: PlaybackState::from_playing(playing),
        })),
        None => Err(bad_request("No current track")),
    }
}

/// POST /playback/retry - Re-arm a blocked start ("tap to resume")
pub async fn retry(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    if ctx.mixer.retry() {
        Ok(Json(StatusResponse::ok()))
    } else {
        Err(bad_request("Nothing to retry: playback is not desired"))
    }
}

pub async fn skip_next(State(ctx): State<AppContext>) -> Result<Json<IndexResponse>, ApiError> {
    ctx.mixer
        .next()
        .map(|current_index| Json(IndexResponse { current_index }))
        .ok_or_else(|| bad_request("Playlist is empty"))
}

pub async fn skip_previous(
    State(ctx): State<AppContext>,
) -> Result<Json<IndexResponse>, ApiError> {
    ctx.mixer
        .previous()
        .map(|current_index| Json(IndexResponse { current_index }))
        .ok_or_else(|| bad_request("Playlist is empty"))
}

/// POST /playback/select - Jump to a playlist position and play
pub async fn select_track(
    State(ctx): State<AppContext>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    if ctx.mixer.select_track(req.index) {
        Ok(Json(IndexResponse {
            current_index: req.index,
        }))
    } else {
        Err(not_found(format!("No track at index {}", req.index)))
    }
}

/// POST /playback/volume - Set primary volume (0-100, clamped)
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let applied = ctx.mixer.set_volume(volume_from_user(req.volume));
    Json(VolumeResponse {
        volume: volume_to_user(applied),
    })
}

pub async fn toggle_shuffle(State(ctx): State<AppContext>) -> Json<ModeResponse> {
    ctx.mixer.toggle_shuffle();
    let mode = ctx.mixer.session().mode();
    Json(ModeResponse {
        shuffle: mode.shuffle,
        repeat: mode.repeat,
    })
}

pub async fn cycle_repeat(State(ctx): State<AppContext>) -> Json<ModeResponse> {
    ctx.mixer.cycle_repeat();
    let mode = ctx.mixer.session().mode();
    Json(ModeResponse {
        shuffle: mode.shuffle,
        repeat: mode.repeat,
    })
}

/// POST /playback/zen - Start the fade-out ramp (no-op while one is running)
pub async fn zen_fade_out(State(ctx): State<AppContext>) -> Json<ZenResponse> {
    Json(ZenResponse {
        started: ctx.mixer.zen_fade_out(),
    })
}

// ============================================================================
// Playlist Endpoints
// ============================================================================

pub async fn get_playlist(State(ctx): State<AppContext>) -> Json<PlaylistResponse> {
    let snapshot = ctx.mixer.snapshot();
    Json(PlaylistResponse {
        tracks: snapshot.tracks,
        current_index: snapshot.current_index,
        track_count: snapshot.track_count,
        uploaded_count: snapshot.uploaded_count,
    })
}

/// POST /playlist/upload - Add local files by path
pub async fn upload_files(
    State(ctx): State<AppContext>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    info!("Upload request for {} file(s)", req.paths.len());
    let tracks = ctx
        .mixer
        .upload_files(req.paths)
        .await
        .map_err(error_response)?;
    Ok(Json(UploadResponse { tracks }))
}

/// POST /playlist/import - Add a remote URI
pub async fn import_url(
    State(ctx): State<AppContext>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<Track>, ApiError> {
    ctx.mixer.import_url(req).map(Json).map_err(error_response)
}

/// DELETE /playlist/:track_id
pub async fn remove_track(
    State(ctx): State<AppContext>,
    Path(track_id): Path<String>,
) -> Result<Json<Track>, ApiError> {
    ctx.mixer
        .remove_track(&TrackId::new(track_id.as_str()))
        .map(Json)
        .ok_or_else(|| not_found(format!("Track not found: {}", track_id)))
}

pub async fn list_categories(State(ctx): State<AppContext>) -> Json<Vec<CategorySummary>> {
    Json(ctx.mixer.categories())
}

/// POST /playlist/category - Replace the playlist with a preset and start it
pub async fn switch_category(
    State(ctx): State<AppContext>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let track_count = ctx
        .mixer
        .switch_category(&req.name)
        .map_err(error_response)?;
    Ok(Json(CategoryResponse {
        name: req.name,
        track_count,
    }))
}

// ============================================================================
// Ambience Endpoints
// ============================================================================

pub async fn list_layers(State(ctx): State<AppContext>) -> Json<Vec<AmbienceLayer>> {
    Json(ctx.mixer.layers())
}

pub async fn toggle_layer(
    State(ctx): State<AppContext>,
    Path(layer_id): Path<String>,
) -> Result<Json<AmbienceLayer>, ApiError> {
    ctx.mixer
        .toggle_layer(&layer_id)
        .map(Json)
        .ok_or_else(|| not_found(format!("Unknown layer: {}", layer_id)))
}

/// POST /ambience/:layer_id/volume - Store layer volume (0-100, clamped)
pub async fn set_layer_volume(
    State(ctx): State<AppContext>,
    Path(layer_id): Path<String>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<AmbienceLayer>, ApiError> {
    let volume = volume_from_user(req.volume);
    ctx.mixer
        .set_layer_volume(&layer_id, volume)
        .map(Json)
        .ok_or_else(|| not_found(format!("Unknown layer: {}", layer_id)))
}

// ============================================================================
// Visualizer
// ============================================================================

pub async fn get_visualizer(State(ctx): State<AppContext>) -> Json<VisualizerProjection> {
    Json(ctx.mixer.visualizer())
}
