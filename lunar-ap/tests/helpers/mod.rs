//! Test helper modules for lunar-ap integration tests
//!
//! - `harness`: players and sessions wired to the virtual media backend
//! - `audio_generator`: deterministic WAV files for upload probing

#![allow(dead_code)]

pub mod audio_generator;
pub mod harness;

pub use audio_generator::generate_silent_wav;
pub use harness::{drain_events, make_request, track, tracks, SessionHarness, TestPlayer};
