//! # Lunar Common Library
//!
//! Shared code for the Lunar Waves services including:
//! - Event types (LunarEvent enum) and the broadcast EventBus
//! - Configuration file resolution
//! - Opaque track identifiers
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod track_id;

pub use error::{Error, Result};
pub use events::{EventBus, LunarEvent, PlaybackState, RepeatMode};
pub use track_id::{TrackId, TrackIdGenerator, TrackOrigin};
