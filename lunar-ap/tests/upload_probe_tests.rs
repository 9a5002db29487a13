//! Uploading local files: duration probing and playlist effects

mod helpers;

use axum::http::StatusCode;
use helpers::{generate_silent_wav, make_request, TestPlayer};
use http::Method;
use lunar_ap::catalog::import::probe_duration;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_probe_duration_of_generated_wav() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("one_second.wav");
    generate_silent_wav(&path, 1000).unwrap();

    let duration = probe_duration(&path).unwrap().expect("wav carries a frame count");
    let ms = duration.as_millis() as i64;
    assert!((ms - 1000).abs() <= 5, "probed {}ms", ms);
}

#[test]
fn test_probe_rejects_non_audio() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not audio at all").unwrap();

    assert!(probe_duration(&path).is_err());
}

#[tokio::test]
async fn test_upload_into_empty_playlist_starts_playback() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("morning.wav");
    generate_silent_wav(&path, 500).unwrap();

    let player = TestPlayer::empty();
    let tracks = player.mixer.upload_files(vec![path]).await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].title, "morning");
    assert!(tracks[0].source.starts_with("file://"));
    let ms = tracks[0].duration_ms.unwrap() as i64;
    assert!((ms - 500).abs() <= 5);

    let snapshot = player.mixer.snapshot();
    assert_eq!(snapshot.track_count, 1);
    assert_eq!(snapshot.uploaded_count, 1);
    assert_eq!(snapshot.current_index, Some(0));
    assert!(snapshot.is_playing);
}

#[tokio::test]
async fn test_upload_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.wav");
    generate_silent_wav(&good, 200).unwrap();

    let player = TestPlayer::empty();
    let result = player
        .mixer
        .upload_files(vec![good, dir.path().join("missing.wav")])
        .await;
    assert!(result.is_err());
    assert_eq!(player.mixer.snapshot().track_count, 0);
}

#[tokio::test]
async fn test_upload_appends_without_interrupting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("later.wav");
    generate_silent_wav(&path, 200).unwrap();

    let player = TestPlayer::start();
    let tracks = player.mixer.upload_files(vec![path]).await.unwrap();

    let snapshot = player.mixer.snapshot();
    assert_eq!(snapshot.track_count, 2);
    assert_eq!(snapshot.current_index, Some(0));
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.tracks[1].id, tracks[0].id);
}

#[tokio::test]
async fn test_upload_endpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("evening.wav");
    generate_silent_wav(&path, 300).unwrap();

    let player = TestPlayer::empty();
    let app = player.router();
    let (status, body) = make_request(
        &app,
        Method::POST,
        "/playlist/upload",
        Some(json!({"paths": [path]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tracks = body.unwrap()["tracks"].clone();
    assert_eq!(tracks.as_array().unwrap().len(), 1);
    assert_eq!(tracks[0]["title"], "evening");

    let (_, body) = make_request(&app, Method::GET, "/playback/state", None).await;
    let state = body.unwrap();
    assert_eq!(state["is_playing"], true);
    assert_eq!(state["uploaded_count"], 1);
}

#[tokio::test]
async fn test_upload_endpoint_rejects_empty_list() {
    let app = TestPlayer::empty().router();
    let (status, _) = make_request(
        &app,
        Method::POST,
        "/playlist/upload",
        Some(json!({"paths": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
