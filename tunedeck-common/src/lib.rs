//! # Tunedeck Common Library
//!
//! Shared code for the Tunedeck player crates including:
//! - Error types
//! - Player event types (PlayerEvent enum) and the EventBus
//! - Configuration loading
//! - Key-value settings persistence
//! - Track and repeat mode definitions

pub mod config;
pub mod error;
pub mod events;
pub mod settings;
pub mod track;

pub use error::{Error, Result};
pub use track::{RepeatMode, Track, TrackId};
