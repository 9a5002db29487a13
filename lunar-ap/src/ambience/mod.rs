//! Ambience layer bank
//!
//! A fixed set of looping background channels. Each layer owns one media
//! resource, created once at startup and kept until shutdown. Layers are
//! independent: each sits behind its own lock, and nothing here touches the
//! primary channel.
//!
//! Audible volume of a layer is always `is_active ? volume : 0`.

use crate::config::LayerConfig;
use crate::media::{MediaError, MediaEvent, MediaFactory, MediaResource};
use chrono::Utc;
use lunar_common::{EventBus, LunarEvent};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Media label prefix for layer resources
pub const LAYER_LABEL_PREFIX: &str = "layer:";

pub fn layer_label(id: &str) -> String {
    format!("{}{}", LAYER_LABEL_PREFIX, id)
}

/// Public view of one layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbienceLayer {
    pub id: String,
    pub name: String,
    /// Loop source shown to the user
    pub source: String,
    pub icon: String,
    /// Stored preference, 0.0-1.0
    pub volume: f32,
    pub is_active: bool,
}

impl AmbienceLayer {
    pub fn audible_volume(&self) -> f32 {
        if self.is_active {
            self.volume
        } else {
            0.0
        }
    }
}

struct LayerChannel {
    layer: AmbienceLayer,
    resource: Box<dyn MediaResource>,
}

struct LayerSlot {
    id: String,
    channel: Mutex<LayerChannel>,
}

impl LayerSlot {
    fn lock(&self) -> MutexGuard<'_, LayerChannel> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// All ambience layers
pub struct AmbienceBank {
    slots: Vec<LayerSlot>,
    events: Arc<EventBus>,
}

impl AmbienceBank {
    /// Create and prime one looping resource per configured layer
    pub fn start(configs: &[LayerConfig], factory: &dyn MediaFactory, events: Arc<EventBus>) -> Self {
        let slots = configs
            .iter()
            .map(|config| {
                let (tx, rx) = mpsc::unbounded_channel();
                let mut resource = factory.create(&layer_label(&config.id), tx);
                resource.set_looping(true);
                resource.set_volume(0.0);
                resource.load(&config.source, None);
                tokio::spawn(watch_layer_events(
                    config.id.clone(),
                    rx,
                    Arc::clone(&events),
                ));

                LayerSlot {
                    id: config.id.clone(),
                    channel: Mutex::new(LayerChannel {
                        layer: AmbienceLayer {
                            id: config.id.clone(),
                            name: config.name.clone(),
                            source: config.source.clone(),
                            icon: config.icon.clone(),
                            volume: config.volume.clamp(0.0, 1.0),
                            is_active: false,
                        },
                        resource,
                    }),
                }
            })
            .collect::<Vec<_>>();

        info!("Ambience bank ready with {} layer(s)", slots.len());
        Self { slots, events }
    }

    fn slot(&self, id: &str) -> Option<&LayerSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Flip a layer on or off; `None` for an unknown id
    ///
    /// Turning on starts the loop at the stored volume. Turning off pauses,
    /// rewinds and silences, so the next activation is a clean loop start.
    pub fn toggle(&self, id: &str) -> Option<AmbienceLayer> {
        let slot = self.slot(id)?;
        let mut channel = slot.lock();
        let channel = &mut *channel;
        channel.layer.is_active = !channel.layer.is_active;

        if channel.layer.is_active {
            channel.resource.set_volume(channel.layer.volume);
            let pending = channel.resource.play();
            let layer_id = channel.layer.id.clone();
            let events = Arc::clone(&self.events);
            tokio::spawn(async move {
                match pending.await {
                    Ok(()) => debug!("Layer {} looping", layer_id),
                    Err(MediaError::Interrupted) => {
                        debug!("Layer {} start interrupted", layer_id)
                    }
                    Err(MediaError::Blocked(reason)) => {
                        warn!("Layer {} blocked: {}", layer_id, reason);
                        events.emit_lossy(LunarEvent::PlaybackBlocked {
                            source_id: layer_id,
                            reason,
                            timestamp: Utc::now(),
                        });
                    }
                    Err(e) => {
                        warn!("Layer {} failed to start: {}", layer_id, e);
                        events.emit_lossy(LunarEvent::PlaybackFailed {
                            source_id: layer_id,
                            reason: e.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }
            });
        } else {
            channel.resource.pause();
            channel.resource.seek(Duration::ZERO);
            channel.resource.set_volume(0.0);
        }

        info!(
            "Layer {} {}",
            channel.layer.id,
            if channel.layer.is_active { "on" } else { "off" }
        );
        self.emit_layer(&channel.layer);
        Some(channel.layer.clone())
    }

    /// Store a layer volume; only an active layer hears it immediately
    pub fn set_volume(&self, id: &str, volume: f32) -> Option<AmbienceLayer> {
        let slot = self.slot(id)?;
        let mut channel = slot.lock();
        if volume.is_nan() {
            warn!("Ignoring NaN volume for layer {}", id);
            return Some(channel.layer.clone());
        }

        channel.layer.volume = volume.clamp(0.0, 1.0);
        if channel.layer.is_active {
            let volume = channel.layer.volume;
            channel.resource.set_volume(volume);
        }
        debug!("Layer {} volume -> {:.2}", id, channel.layer.volume);
        self.emit_layer(&channel.layer);
        Some(channel.layer.clone())
    }

    pub fn layer(&self, id: &str) -> Option<AmbienceLayer> {
        self.slot(id).map(|s| s.lock().layer.clone())
    }

    pub fn layers(&self) -> Vec<AmbienceLayer> {
        self.slots.iter().map(|s| s.lock().layer.clone()).collect()
    }

    pub fn any_active(&self) -> bool {
        self.slots.iter().any(|s| s.lock().layer.is_active)
    }

    /// Silence every layer; flags are left as they were
    pub fn shutdown(&self) {
        for slot in &self.slots {
            let mut channel = slot.lock();
            channel.resource.pause();
            channel.resource.set_volume(0.0);
        }
        debug!("Ambience bank silenced");
    }

    fn emit_layer(&self, layer: &AmbienceLayer) {
        self.events.emit_lossy(LunarEvent::LayerChanged {
            layer_id: layer.id.clone(),
            is_active: layer.is_active,
            volume: layer.volume,
            timestamp: Utc::now(),
        });
    }
}

/// Report resource-level errors for one layer
async fn watch_layer_events(
    layer_id: String,
    mut rx: mpsc::UnboundedReceiver<MediaEvent>,
    events: Arc<EventBus>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            MediaEvent::Error { message, .. } => {
                warn!("Layer {} media error: {}", layer_id, message);
                events.emit_lossy(LunarEvent::MediaError {
                    track_id: layer_id.clone(),
                    message,
                    timestamp: Utc::now(),
                });
            }
            other => debug!("Layer {} event: {:?}", layer_id, other),
        }
    }
}
