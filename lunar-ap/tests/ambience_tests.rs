//! Ambience layer independence and isolation

mod helpers;

use helpers::{drain_events, TestPlayer};
use lunar_common::LunarEvent;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_layers_start_silent_and_looping() {
    let player = TestPlayer::start();
    let layers = player.mixer.layers();
    assert_eq!(layers.len(), 4);

    for layer in layers {
        assert!(!layer.is_active);
        let control = player.layer(&layer.id);
        assert!(control.is_looping());
        assert!(control.is_paused());
        assert_eq!(control.volume(), 0.0);
        assert_eq!(control.source(), Some(layer.source));
    }
}

#[tokio::test(start_paused = true)]
async fn test_toggling_one_layer_leaves_others_alone() {
    let player = TestPlayer::start();
    let wind_before = player.mixer.layers().into_iter().find(|l| l.id == "wind").unwrap();

    let rain = player.mixer.toggle_layer("rain").unwrap();
    assert!(rain.is_active);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(player.layer("rain").is_playing());
    assert_eq!(player.layer("rain").volume(), 0.5);

    let wind_after = player.mixer.layers().into_iter().find(|l| l.id == "wind").unwrap();
    assert_eq!(wind_after, wind_before);
    assert!(player.layer("wind").is_paused());
    assert_eq!(player.layer("wind").volume(), 0.0);

    // Primary channel untouched too
    assert!(!player.mixer.snapshot().is_playing);
    assert_eq!(player.primary().stats().play_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_inactive_layer_volume_is_stored_not_applied() {
    let player = TestPlayer::start();

    let forest = player.mixer.set_layer_volume("forest", 0.8).unwrap();
    assert_eq!(forest.volume, 0.8);
    assert!(!forest.is_active);
    assert_eq!(forest.audible_volume(), 0.0);
    assert_eq!(player.layer("forest").volume(), 0.0);

    // Activation picks up the stored value
    player.mixer.toggle_layer("forest");
    assert_eq!(player.layer("forest").volume(), 0.8);

    // Active layers hear changes immediately
    player.mixer.set_layer_volume("forest", 0.2);
    assert_eq!(player.layer("forest").volume(), 0.2);
}

#[tokio::test(start_paused = true)]
async fn test_layer_volume_clamped() {
    let player = TestPlayer::start();
    let water = player.mixer.set_layer_volume("water", 1.7).unwrap();
    assert_eq!(water.volume, 1.0);
    let water = player.mixer.set_layer_volume("water", -0.5).unwrap();
    assert_eq!(water.volume, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_reactivated_layer_restarts_from_beginning() {
    let player = TestPlayer::start();
    player.mixer.toggle_layer("rain");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(player.layer("rain").position() >= Duration::from_secs(4));

    let rain = player.mixer.toggle_layer("rain").unwrap();
    assert!(!rain.is_active);
    assert!(player.layer("rain").is_paused());
    assert_eq!(player.layer("rain").position(), Duration::ZERO);
    assert_eq!(player.layer("rain").volume(), 0.0);

    player.mixer.toggle_layer("rain");
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert!(player.layer("rain").is_playing());
    assert!(player.layer("rain").position() < Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_blocked_layer_does_not_affect_others() {
    let player = TestPlayer::start();
    let mut rx = player.mixer.subscribe();
    player.layer("wind").refuse_next_plays(1);

    player.mixer.toggle_layer("wind");
    player.mixer.toggle_layer("water");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let events = drain_events(&mut rx);
    let blocked: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LunarEvent::PlaybackBlocked { source_id, .. } => Some(source_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(blocked, vec!["wind"]);

    assert!(player.layer("water").is_playing());
    assert!(player.layer("wind").is_paused());
    // Flag still reflects the user's choice
    assert!(player.mixer.layers().iter().any(|l| l.id == "wind" && l.is_active));
}

#[tokio::test(start_paused = true)]
async fn test_failed_layer_reports_layer_id() {
    let player = TestPlayer::start();
    let mut rx = player.mixer.subscribe();
    player.layer("forest").fail_next_plays(1);

    player.mixer.toggle_layer("forest");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(drain_events(&mut rx).iter().any(|e| matches!(
        e,
        LunarEvent::PlaybackFailed { source_id, .. } if source_id == "forest"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_layer_is_none() {
    let player = TestPlayer::start();
    assert!(player.mixer.toggle_layer("thunder").is_none());
    assert!(player.mixer.set_layer_volume("thunder", 0.5).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_visualizer_active_with_layer_only() {
    let player = TestPlayer::start();
    assert!(!player.mixer.visualizer().is_active);

    player.mixer.toggle_layer("rain");
    let projection = player.mixer.visualizer();
    assert!(projection.is_active);
    assert_eq!(projection.accent_colors.len(), 3);

    player.mixer.toggle_layer("rain");
    assert!(!player.mixer.visualizer().is_active);
}
