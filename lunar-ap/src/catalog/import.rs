//! Upload/import collaborator
//!
//! Turns local files and remote URIs into [`Track`] records with fresh ids.
//! Local files get their duration probed with symphonia so the transport
//! knows when they end; a probe failure only loses the duration.

use super::Track;
use crate::error::{Error, Result};
use lunar_common::{TrackIdGenerator, TrackOrigin};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

const LOCAL_ARTIST: &str = "Local Upload";
const IMPORTED_ARTIST: &str = "Imported Source";
const UNKNOWN_TITLE: &str = "Unknown Track";
const DRIVE_TITLE: &str = "Drive Audio Import";

const DRIVE_FILE_MARKER: &str = "/file/d/";
const DRIVE_DIRECT_PREFIX: &str = "https://drive.google.com/uc?export=download&id=";

/// Remote import request
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

/// Builds tracks for uploads and imports
#[derive(Debug, Clone)]
pub struct TrackImporter {
    ids: Arc<TrackIdGenerator>,
}

impl TrackImporter {
    pub fn new(ids: Arc<TrackIdGenerator>) -> Self {
        Self { ids }
    }

    /// Build tracks for local files
    ///
    /// All-or-nothing: a single missing file rejects the whole batch.
    /// Blocking (file I/O + probing); call from `spawn_blocking` in async code.
    pub fn tracks_from_files(&self, paths: &[PathBuf]) -> Result<Vec<Track>> {
        if paths.is_empty() {
            return Err(Error::BadRequest("No files to upload".to_string()));
        }

        let mut resolved = Vec::with_capacity(paths.len());
        for path in paths {
            let canonical = path
                .canonicalize()
                .map_err(|_| Error::NotFound(format!("File not found: {}", path.display())))?;
            if !canonical.is_file() {
                return Err(Error::BadRequest(format!(
                    "Not a regular file: {}",
                    path.display()
                )));
            }
            resolved.push(canonical);
        }

        let tracks = resolved
            .into_iter()
            .map(|path| {
                let duration = match probe_duration(&path) {
                    Ok(duration) => duration,
                    Err(e) => {
                        warn!("Could not probe {}: {}", path.display(), e);
                        None
                    }
                };
                let title = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

                Track {
                    id: self.ids.next_id(TrackOrigin::Local),
                    source: file_uri(&path),
                    title,
                    artist: LOCAL_ARTIST.to_string(),
                    duration_ms: duration.map(|d| d.as_millis() as u64),
                }
            })
            .collect::<Vec<_>>();

        info!("Prepared {} uploaded track(s)", tracks.len());
        Ok(tracks)
    }

    /// Build a track for a remote URI, rewriting share links to direct fetches
    pub fn track_from_url(&self, request: ImportRequest) -> Result<Track> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(Error::BadRequest("Import URL must not be empty".to_string()));
        }

        let title = request.title.filter(|t| !t.trim().is_empty());
        let artist = request.artist.filter(|a| !a.trim().is_empty());

        let (source, default_title) = match rewrite_share_link(url) {
            Some(direct) => {
                debug!("Rewrote share link to {}", direct);
                (direct, DRIVE_TITLE)
            }
            None => (url.to_string(), UNKNOWN_TITLE),
        };

        Ok(Track {
            id: self.ids.next_id(TrackOrigin::Ext),
            source,
            title: title.unwrap_or_else(|| default_title.to_string()),
            artist: artist.unwrap_or_else(|| IMPORTED_ARTIST.to_string()),
            duration_ms: None,
        })
    }
}

/// Rewrite a Drive share link (`.../file/d/<ID>/view`) to its direct-download form
pub fn rewrite_share_link(url: &str) -> Option<String> {
    let start = url.find(DRIVE_FILE_MARKER)? + DRIVE_FILE_MARKER.len();
    let file_id: String = url[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if file_id.is_empty() {
        None
    } else {
        Some(format!("{}{}", DRIVE_DIRECT_PREFIX, file_id))
    }
}

/// `file://` URI for an absolute path, each segment percent-encoded
pub fn file_uri(path: &Path) -> String {
    let segments = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => {
                Some(urlencoding::encode(&part.to_string_lossy()).into_owned())
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    format!("file:///{}", segments.join("/"))
}

/// Probe an audio file's duration without decoding it
pub fn probe_duration(path: &Path) -> Result<Option<Duration>> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Import(format!("Failed to probe format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Import("No audio track found".to_string()))?;

    let params = &track.codec_params;
    match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Ok(Some(Duration::from_secs_f64(frames as f64 / rate as f64)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer() -> TrackImporter {
        TrackImporter::new(Arc::new(TrackIdGenerator::new()))
    }

    #[test]
    fn test_drive_link_rewritten() {
        let url = "https://drive.google.com/file/d/1AbC-d_9/view?usp=sharing";
        assert_eq!(
            rewrite_share_link(url).as_deref(),
            Some("https://drive.google.com/uc?export=download&id=1AbC-d_9")
        );
    }

    #[test]
    fn test_plain_url_untouched() {
        assert!(rewrite_share_link("https://example.com/song.mp3").is_none());
        assert!(rewrite_share_link("https://drive.google.com/file/d/").is_none());
    }

    #[test]
    fn test_import_defaults() {
        let track = importer()
            .track_from_url(ImportRequest {
                url: "https://example.com/song.mp3".to_string(),
                title: None,
                artist: Some("  ".to_string()),
            })
            .unwrap();
        assert_eq!(track.title, "Unknown Track");
        assert_eq!(track.artist, "Imported Source");
        assert_eq!(track.id.origin(), Some(TrackOrigin::Ext));
        assert!(track.duration_ms.is_none());
    }

    #[test]
    fn test_import_drive_default_title() {
        let track = importer()
            .track_from_url(ImportRequest {
                url: "https://drive.google.com/file/d/XYZ/view".to_string(),
                title: None,
                artist: None,
            })
            .unwrap();
        assert_eq!(track.title, "Drive Audio Import");
        assert!(track.source.ends_with("id=XYZ"));
    }

    #[test]
    fn test_import_keeps_given_metadata() {
        let track = importer()
            .track_from_url(ImportRequest {
                url: "https://drive.google.com/file/d/XYZ/view".to_string(),
                title: Some("Night Drive".to_string()),
                artist: Some("Me".to_string()),
            })
            .unwrap();
        assert_eq!(track.title, "Night Drive");
        assert_eq!(track.artist, "Me");
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = importer().track_from_url(ImportRequest {
            url: "   ".to_string(),
            title: None,
            artist: None,
        });
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_missing_file_rejects_batch() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.mp3");
        std::fs::write(&present, b"not really audio").unwrap();
        let missing = dir.path().join("missing.mp3");

        let result = importer().tracks_from_files(&[present, missing]);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unprobeable_file_still_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Morning Focus.mp3");
        std::fs::write(&path, b"garbage bytes").unwrap();

        let tracks = importer().tracks_from_files(&[path]).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Morning Focus");
        assert_eq!(tracks[0].artist, "Local Upload");
        assert!(tracks[0].source.starts_with("file://"));
        assert!(tracks[0].duration_ms.is_none());
    }

    #[test]
    fn test_identical_uploads_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("same.mp3");
        std::fs::write(&path, b"x").unwrap();

        let tracks = importer()
            .tracks_from_files(&[path.clone(), path])
            .unwrap();
        assert_eq!(tracks[0].source, tracks[1].source);
        assert_ne!(tracks[0].id, tracks[1].id);
    }

    #[test]
    fn test_file_uri_encodes_segments() {
        assert_eq!(
            file_uri(Path::new("/music/late night/my song #1?.wav")),
            "file:///music/late%20night/my%20song%20%231%3F.wav"
        );
        assert_eq!(file_uri(Path::new("/a/plain.mp3")), "file:///a/plain.mp3");
    }

    #[test]
    fn test_upload_source_is_encoded_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rainy day #2.mp3");
        std::fs::write(&path, b"x").unwrap();

        let tracks = importer().tracks_from_files(&[path]).unwrap();
        assert!(tracks[0].source.starts_with("file:///"));
        assert!(tracks[0].source.ends_with("/rainy%20day%20%232.mp3"));
        assert!(!tracks[0].source.contains(' '));
        assert_eq!(tracks[0].title, "rainy day #2");
    }
}
