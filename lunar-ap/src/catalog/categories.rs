//! Preset playlists ("categories")
//!
//! Tracks are minted once at startup, so a category keeps the same track
//! identities every time it is selected.

use super::Track;
use crate::config::CategoryConfig;
use crate::error::{Error, Result};
use lunar_common::{TrackIdGenerator, TrackOrigin};
use serde::Serialize;

/// Listing entry for `GET /categories`
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub track_count: usize,
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
    tracks: Vec<Track>,
}

/// Named preset playlists
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl CategoryCatalog {
    pub fn from_config(configs: &[CategoryConfig], ids: &TrackIdGenerator) -> Self {
        let categories = configs
            .iter()
            .map(|c| Category {
                name: c.name.clone(),
                tracks: c
                    .tracks
                    .iter()
                    .map(|t| Track {
                        id: ids.next_id(TrackOrigin::Catalog),
                        source: t.source.clone(),
                        title: t.title.clone(),
                        artist: t.artist.clone(),
                        duration_ms: t.duration_ms,
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    pub fn summaries(&self) -> Vec<CategorySummary> {
        self.categories
            .iter()
            .map(|c| CategorySummary {
                name: c.name.clone(),
                track_count: c.tracks.len(),
            })
            .collect()
    }

    pub fn tracks(&self, name: &str) -> Result<Vec<Track>> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.tracks.clone())
            .ok_or_else(|| Error::NotFound(format!("Unknown category '{}'", name)))
    }

    /// First configured category, used when no initial category is named
    pub fn first_name(&self) -> Option<&str> {
        self.categories.first().map(|c| c.name.as_str())
    }
}
