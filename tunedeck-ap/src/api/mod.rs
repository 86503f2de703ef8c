//! HTTP control API
//!
//! JSON endpoints driving the playback coordinator plus an SSE stream of
//! player events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
