//! Configuration for the lunar-ap audio player
//!
//! Bootstrap configuration is a single TOML file resolved by
//! [`lunar_common::config::resolve_config_path`] (CLI > env > platform dir).
//! Every field has a built-in default, so a missing file yields a working
//! player with the stock ambience layers and the "Lunar Radio" station.

use crate::error::{Error, Result};
use crate::playback::selection::ShufflePreviousPolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    pub logging: LoggingConfig,
    pub playback: PlaybackConfig,
    pub zen: ZenConfig,
    pub media: MediaConfig,

    /// Ambience layer definitions (replaces the defaults when present)
    pub layers: Vec<LayerConfig>,

    /// Preset playlists selectable as categories
    pub categories: Vec<CategoryConfig>,

    /// Category loaded at startup (defaults to the first one)
    pub initial_category: Option<String>,

    pub theme: ThemeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    pub level: String,
}

/// Primary playback settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Starting desired volume (0.0-1.0)
    pub initial_volume: f32,

    /// Past this position, "previous" restarts the current track instead
    pub previous_restart_threshold_ms: u64,

    /// What "previous" does while shuffle is on
    pub shuffle_previous: ShufflePreviousPolicy,

    /// Fixed RNG seed for shuffle (reproducible sessions); entropy when unset
    pub shuffle_seed: Option<u64>,
}

/// Zen fade-out ramp
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZenConfig {
    /// Volume removed per tick
    pub step: f32,

    /// Tick period in milliseconds
    pub interval_ms: u64,

    /// Ramp stops playback once volume is at or below this
    pub floor: f32,
}

/// Simulated transport settings for the headless media backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Delay between a play call and its settlement
    pub start_latency_ms: u64,

    /// Length assumed for tracks without a probed duration; `None` plays forever
    pub fallback_duration_ms: Option<u64>,
}

/// One ambience layer definition
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    pub name: String,
    pub source: String,
    #[serde(default = "default_layer_volume")]
    pub volume: f32,
    #[serde(default)]
    pub icon: String,
}

/// A preset playlist
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub tracks: Vec<CategoryTrackConfig>,
}

/// A track inside a preset playlist
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryTrackConfig {
    pub title: String,
    pub artist: String,
    pub source: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Palette handed to the visualizer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub accent_colors: Vec<String>,
}

fn default_layer_volume() -> f32 {
    0.5
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5730,
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
            zen: ZenConfig::default(),
            media: MediaConfig::default(),
            layers: default_layers(),
            categories: default_categories(),
            initial_category: None,
            theme: ThemeConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.5,
            previous_restart_threshold_ms: 3000,
            shuffle_previous: ShufflePreviousPolicy::Random,
            shuffle_seed: None,
        }
    }
}

impl Default for ZenConfig {
    fn default() -> Self {
        Self {
            step: 0.05,
            interval_ms: 100,
            floor: 0.05,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            start_latency_ms: 20,
            fallback_duration_ms: None,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            accent_colors: vec![
                "#8b5cf6".to_string(),
                "#06b6d4".to_string(),
                "#6366f1".to_string(),
            ],
        }
    }
}

fn default_layers() -> Vec<LayerConfig> {
    let layer = |id: &str, name: &str, source: &str, volume: f32, icon: &str| LayerConfig {
        id: id.to_string(),
        name: name.to_string(),
        source: source.to_string(),
        volume,
        icon: icon.to_string(),
    };
    vec![
        layer(
            "rain",
            "Soft Rain",
            "https://cdn.pixabay.com/audio/2022/03/24/audio_03d6d53293.mp3",
            0.5,
            "CloudRain",
        ),
        layer(
            "wind",
            "Deep Wind",
            "https://cdn.pixabay.com/audio/2022/03/10/audio_c36b801454.mp3",
            0.4,
            "Wind",
        ),
        layer(
            "water",
            "River Flow",
            "https://cdn.pixabay.com/audio/2021/08/09/audio_0dcdd03d04.mp3",
            0.5,
            "Waves",
        ),
        layer(
            "forest",
            "Night Forest",
            "https://cdn.pixabay.com/audio/2021/09/06/audio_3659207909.mp3",
            0.3,
            "Trees",
        ),
    ]
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![CategoryConfig {
        name: "lunar-radio".to_string(),
        tracks: vec![CategoryTrackConfig {
            title: "Cosmic Chill".to_string(),
            artist: "Lunar Radio".to_string(),
            source: "https://cdn.pixabay.com/download/audio/2022/05/27/audio_1808fbf07a.mp3?filename=lofi-study-112191.mp3".to_string(),
            duration_ms: None,
        }],
    }]
}

impl TomlConfig {
    /// Resolve, read and validate the bootstrap config
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = lunar_common::config::resolve_config_path(
            cli_path,
            lunar_common::config::CONFIG_ENV_VAR,
        );
        let config: TomlConfig = lunar_common::config::load_toml_or_default(path.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the player cannot honour
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.playback.initial_volume) {
            return Err(Error::Config(format!(
                "playback.initial_volume must be within 0.0-1.0, got {}",
                self.playback.initial_volume
            )));
        }
        if !(self.zen.step > 0.0 && self.zen.step <= 1.0) {
            return Err(Error::Config(format!(
                "zen.step must be within (0.0, 1.0], got {}",
                self.zen.step
            )));
        }
        if self.zen.interval_ms == 0 {
            return Err(Error::Config("zen.interval_ms must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.zen.floor) {
            return Err(Error::Config(format!(
                "zen.floor must be within [0.0, 1.0), got {}",
                self.zen.floor
            )));
        }

        let mut layer_ids = HashSet::new();
        for layer in &self.layers {
            if layer.id.trim().is_empty() {
                return Err(Error::Config("layer id must not be empty".to_string()));
            }
            if !layer_ids.insert(layer.id.as_str()) {
                return Err(Error::Config(format!("duplicate layer id '{}'", layer.id)));
            }
            if !(0.0..=1.0).contains(&layer.volume) {
                return Err(Error::Config(format!(
                    "layer '{}' volume must be within 0.0-1.0",
                    layer.id
                )));
            }
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::Config("category name must not be empty".to_string()));
            }
            if !names.insert(category.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
        }

        if let Some(initial) = &self.initial_category {
            if !names.contains(initial.as_str()) {
                return Err(Error::Config(format!(
                    "initial_category '{}' is not a configured category",
                    initial
                )));
            }
        }

        Ok(())
    }

    pub fn previous_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.playback.previous_restart_threshold_ms)
    }
}
