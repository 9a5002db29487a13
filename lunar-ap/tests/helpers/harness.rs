//! Players and sessions on the virtual media backend

use axum::body::Body;
use axum::http::StatusCode;
use axum::Router;
use http::{Method, Request};
use lunar_ap::api::{create_router, AppContext};
use lunar_ap::catalog::Track;
use lunar_ap::config::TomlConfig;
use lunar_ap::media::{VirtualMediaControl, VirtualMediaFactory, VirtualMediaOptions};
use lunar_ap::playback::{PlaybackSession, SessionSettings, PRIMARY_LABEL};
use lunar_ap::Mixer;
use lunar_common::{EventBus, LunarEvent, TrackId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceExt;

/// Track with a known duration
pub fn track(id: &str, duration_ms: Option<u64>) -> Track {
    Track {
        id: TrackId::new(id),
        source: format!("mem://{}", id),
        title: id.to_uppercase(),
        artist: "Harness".to_string(),
        duration_ms,
    }
}

/// Tracks that never end on their own
pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id, None)).collect()
}

/// Everything received so far, without waiting
pub fn drain_events(rx: &mut broadcast::Receiver<LunarEvent>) -> Vec<LunarEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A bare playback session and its primary transport
pub struct SessionHarness {
    pub session: PlaybackSession,
    pub primary: VirtualMediaControl,
    pub events: Arc<EventBus>,
}

impl SessionHarness {
    pub fn new(start_latency_ms: u64) -> Self {
        Self::with_settings(start_latency_ms, SessionSettings::default())
    }

    pub fn with_settings(start_latency_ms: u64, settings: SessionSettings) -> Self {
        let factory = VirtualMediaFactory::new(VirtualMediaOptions {
            start_latency: Duration::from_millis(start_latency_ms),
            fallback_duration: None,
        });
        let events = Arc::new(EventBus::new(1024));
        let session = PlaybackSession::start(settings, &factory, Arc::clone(&events));
        let primary = factory
            .control(PRIMARY_LABEL)
            .expect("primary resource registered");
        Self {
            session,
            primary,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LunarEvent> {
        self.events.subscribe()
    }
}

/// A full mixer with its media factory
pub struct TestPlayer {
    pub mixer: Arc<Mixer>,
    pub factory: Arc<VirtualMediaFactory>,
}

impl TestPlayer {
    pub fn start() -> Self {
        Self::with_config(TomlConfig::default())
    }

    /// Mixer whose playlist starts empty
    pub fn empty() -> Self {
        let config = TomlConfig {
            categories: Vec::new(),
            ..TomlConfig::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: TomlConfig) -> Self {
        let factory = Arc::new(VirtualMediaFactory::from_config(&config.media));
        let mixer = Mixer::start(&config, factory.clone(), Arc::new(EventBus::default()))
            .expect("mixer starts");
        Self {
            mixer: Arc::new(mixer),
            factory,
        }
    }

    pub fn primary(&self) -> VirtualMediaControl {
        self.factory
            .control(PRIMARY_LABEL)
            .expect("primary resource registered")
    }

    pub fn layer(&self, id: &str) -> VirtualMediaControl {
        self.factory
            .control(&format!("layer:{}", id))
            .expect("layer resource registered")
    }

    pub fn router(&self) -> Router {
        create_router(AppContext {
            mixer: Arc::clone(&self.mixer),
            port: 5730,
        })
    }
}

/// Send one request through the router
pub async fn make_request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let mut request = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            Body::from(json_body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_body = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };

    (status, json_body)
}
