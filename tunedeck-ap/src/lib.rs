//! # Tunedeck Audio Player Library (tunedeck-ap)
//!
//! Single-stream playback engine with click-free gain ramps, a spectrum
//! analyzer tap and observer registries, driven by a playback coordinator
//! (queue, repeat, shuffle, persisted player settings) and an HTTP/SSE
//! control interface.
//!
//! **Architecture:** host capabilities (media element, processing graph) sit
//! behind traits; the local host decodes with symphonia, resamples with
//! rubato and renders through a software graph to cpal or a null sink.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod host;

pub use error::{Error, Result};
