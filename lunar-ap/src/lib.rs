//! # Lunar Waves Audio Player Library (lunar-ap)
//!
//! Playback core for the Lunar Waves focus app: one primary track channel with
//! shuffle/repeat semantics, a bank of looping ambience layers, and a zen
//! fade-out, all exposed through the [`mixer::Mixer`] facade and an HTTP/SSE
//! control API.
//!
//! **Architecture:** facade calls mutate *intent* only. A single reconciler
//! task owns the primary media resource and drives it toward the latest
//! intent, serializing play attempts so they never overlap.

pub mod ambience;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod mixer;
pub mod playback;

pub use error::{Error, Result};
pub use mixer::Mixer;
