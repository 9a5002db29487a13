//! HTTP control API
//!
//! REST endpoints over the [`crate::mixer::Mixer`] facade plus an SSE event
//! stream. Volumes are 0-100 on the wire and 0.0-1.0 internally.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
