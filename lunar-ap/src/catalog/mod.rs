//! Track catalog
//!
//! Pure data: tracks and the ordered playlist with its current index. The
//! playlist maintains the index invariant (always valid when non-empty) across
//! every mutation; selection policy lives in [`crate::playback`].

pub mod categories;
pub mod import;

use lunar_common::{TrackId, TrackOrigin};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use categories::CategoryCatalog;
pub use import::{ImportRequest, TrackImporter};

/// A playable item
///
/// Immutable once created. Identity is `id`; two tracks may share a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub source: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Track {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
}

/// Outcome of removing a track, relative to the current selection
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    /// The selected track was removed
    Current(Track),
    /// A track before the selection was removed; index shifted down
    BeforeCurrent(Track),
    /// A track after the selection was removed; index unchanged
    AfterCurrent(Track),
}

/// Ordered playlist with a current position
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: usize,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            current_index: 0,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current index, `None` when the playlist is empty
    pub fn current_index(&self) -> Option<usize> {
        (!self.tracks.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    /// Move the selection; out-of-range indices are rejected
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// Append tracks, returning whether the playlist was empty beforehand
    pub fn append(&mut self, tracks: Vec<Track>) -> bool {
        let was_empty = self.tracks.is_empty();
        self.tracks.extend(tracks);
        if was_empty {
            self.current_index = 0;
        }
        was_empty
    }

    /// Remove one track by id, keeping the same logical track selected
    /// where possible
    pub fn remove(&mut self, id: &TrackId) -> Option<Removal> {
        let position = self.position_of(id)?;
        let track = self.tracks.remove(position);

        let removal = if position == self.current_index {
            // Whatever slid into this slot becomes current; clamp at the tail
            if self.current_index >= self.tracks.len() {
                self.current_index = self.tracks.len().saturating_sub(1);
            }
            Removal::Current(track)
        } else if position < self.current_index {
            self.current_index -= 1;
            Removal::BeforeCurrent(track)
        } else {
            Removal::AfterCurrent(track)
        };

        Some(removal)
    }

    /// Replace every track wholesale and reset the selection to the start
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = 0;
    }

    /// Number of locally uploaded tracks
    pub fn uploaded_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.id.origin() == Some(TrackOrigin::Local))
            .count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn track(id: &str) -> Track {
        Track {
            id: TrackId::new(id),
            source: format!("https://example.com/{}.mp3", id),
            title: id.to_uppercase(),
            artist: "Test".to_string(),
            duration_ms: Some(180_000),
        }
    }

    fn abc() -> Playlist {
        Playlist::new(vec![track("a"), track("b"), track("c")])
    }

    #[test]
    fn test_empty_playlist_has_no_index() {
        let playlist = Playlist::default();
        assert_eq!(playlist.current_index(), None);
        assert!(playlist.current().is_none());
    }

    #[test]
    fn test_append_to_empty_selects_first() {
        let mut playlist = Playlist::default();
        assert!(playlist.append(vec![track("a")]));
        assert_eq!(playlist.current_index(), Some(0));
        assert!(!playlist.append(vec![track("b")]));
        assert_eq!(playlist.current_index(), Some(0));
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn test_set_current_bounds() {
        let mut playlist = abc();
        assert!(playlist.set_current(2));
        assert!(!playlist.set_current(3));
        assert_eq!(playlist.current_index(), Some(2));
    }

    #[test]
    fn test_remove_before_current_shifts_index() {
        let mut playlist = abc();
        playlist.set_current(2);
        let removal = playlist.remove(&TrackId::new("a")).unwrap();
        assert!(matches!(removal, Removal::BeforeCurrent(_)));
        assert_eq!(playlist.current_index(), Some(1));
        assert_eq!(playlist.current().unwrap().id, TrackId::new("c"));
    }

    #[test]
    fn test_remove_after_current_keeps_index() {
        let mut playlist = abc();
        let removal = playlist.remove(&TrackId::new("c")).unwrap();
        assert!(matches!(removal, Removal::AfterCurrent(_)));
        assert_eq!(playlist.current_index(), Some(0));
    }

    #[test]
    fn test_remove_current_at_tail_clamps() {
        let mut playlist = abc();
        playlist.set_current(2);
        let removal = playlist.remove(&TrackId::new("c")).unwrap();
        assert!(matches!(removal, Removal::Current(_)));
        assert_eq!(playlist.current_index(), Some(1));
    }

    #[test]
    fn test_remove_last_track_empties() {
        let mut playlist = Playlist::new(vec![track("a")]);
        playlist.remove(&TrackId::new("a")).unwrap();
        assert!(playlist.is_empty());
        assert_eq!(playlist.current_index(), None);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut playlist = abc();
        assert!(playlist.remove(&TrackId::new("zzz")).is_none());
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn test_shared_source_distinct_identity() {
        let mut a = track("a");
        let mut b = track("b");
        a.source = "file:///same.mp3".to_string();
        b.source = "file:///same.mp3".to_string();
        let mut playlist = Playlist::new(vec![a, b]);
        playlist.remove(&TrackId::new("b")).unwrap();
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.tracks()[0].id, TrackId::new("a"));
    }

    #[test]
    fn test_replace_resets_index() {
        let mut playlist = abc();
        playlist.set_current(2);
        playlist.replace(vec![track("x"), track("y")]);
        assert_eq!(playlist.current_index(), Some(0));
        assert_eq!(playlist.current().unwrap().id, TrackId::new("x"));
    }

    #[test]
    fn test_uploaded_count() {
        let playlist = Playlist::new(vec![track("local_1_0"), track("ext_1_1"), track("local_1_2")]);
        assert_eq!(playlist.uploaded_count(), 2);
    }
}
