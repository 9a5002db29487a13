//! Primary playback channel
//!
//! **Structure:**
//! - `session` - intent owner and public contract (toggle, next, previous, ...)
//! - `reconciler` - task owning the primary media resource
//! - `state` - `Intent`, `Desired` and `ResourceState`
//! - `selection` - next/previous target policy
//! - `mode` - shuffle/repeat flags
//! - `zen` - fade-out ramp

pub mod mode;
mod reconciler;
pub mod selection;
pub mod session;
pub mod state;
pub mod zen;

pub use mode::PlaybackMode;
pub use selection::ShufflePreviousPolicy;
pub use session::{PlaybackSession, SessionSettings, SessionSnapshot, PRIMARY_LABEL};
pub use state::{Intent, ResourceState};
pub use zen::ZenSettings;
