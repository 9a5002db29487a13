//! HTTP server setup and routing
//!
//! Sets up the Axum router for control endpoints and SSE.

use crate::error::{Error, Result};
use crate::mixer::Mixer;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{handlers, sse};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub mixer: Arc<Mixer>,
    pub port: u16,
}

/// Build the router with every route attached
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health and build identification
        .route("/health", get(handlers::health))
        .route("/build_info", get(handlers::get_build_info))
        // Primary channel
        .route("/playback/state", get(handlers::get_playback_state))
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/toggle", post(handlers::toggle_play))
        .route("/playback/retry", post(handlers::retry))
        .route("/playback/next", post(handlers::skip_next))
        .route("/playback/previous", post(handlers::skip_previous))
        .route("/playback/select", post(handlers::select_track))
        .route("/playback/volume", post(handlers::set_volume))
        .route("/playback/shuffle", post(handlers::toggle_shuffle))
        .route("/playback/repeat", post(handlers::cycle_repeat))
        .route("/playback/zen", post(handlers::zen_fade_out))
        // Playlist and catalog
        .route("/playlist", get(handlers::get_playlist))
        .route("/playlist/upload", post(handlers::upload_files))
        .route("/playlist/import", post(handlers::import_url))
        .route("/playlist/category", post(handlers::switch_category))
        .route("/playlist/:track_id", delete(handlers::remove_track))
        .route("/categories", get(handlers::list_categories))
        // Ambience layers
        .route("/ambience", get(handlers::list_layers))
        .route("/ambience/:layer_id/toggle", post(handlers::toggle_layer))
        .route("/ambience/:layer_id/volume", post(handlers::set_layer_volume))
        // Visualizer projection
        .route("/visualizer", get(handlers::get_visualizer))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run(ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
