//! Opaque track identifiers
//!
//! Identity of a playlist entry is its id, never its source URI: two uploads
//! of the same file are distinct entries. Ids are `<origin>_<millis>_<seq>`,
//! where the sequence makes ids unique even within one millisecond.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a track entered the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOrigin {
    /// Uploaded local file
    Local,
    /// Imported remote URI
    Ext,
    /// Preset category playlist
    Catalog,
}

impl TrackOrigin {
    pub fn prefix(self) -> &'static str {
        match self {
            TrackOrigin::Local => "local",
            TrackOrigin::Ext => "ext",
            TrackOrigin::Catalog => "catalog",
        }
    }
}

/// Opaque track identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin encoded in the id prefix, if it carries one
    pub fn origin(&self) -> Option<TrackOrigin> {
        let prefix = self.0.split('_').next()?;
        [
            TrackOrigin::Local,
            TrackOrigin::Ext,
            TrackOrigin::Catalog,
        ]
        .into_iter()
        .find(|o| o.prefix() == prefix)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Generates unique, monotonically sequenced track ids
#[derive(Debug, Default)]
pub struct TrackIdGenerator {
    seq: AtomicU64,
}

impl TrackIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, origin: TrackOrigin) -> TrackId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        TrackId(format!(
            "{}_{}_{}",
            origin.prefix(),
            Utc::now().timestamp_millis(),
            seq
        ))
    }
}
