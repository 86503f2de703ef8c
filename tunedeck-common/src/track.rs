//! Track identity, metadata, and repeat mode definitions
//!
//! Tracks are referenced by opaque string identifiers. The playable stream
//! location is optional: catalog entries without a URL are listed but cannot be
//! played.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Opaque track identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A playable track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Stream location (file path, `file://` URL, or remote URL)
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Catalog-declared duration; the engine reports the decoded duration
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(url.into()),
            title: None,
            artist: None,
            album: None,
            duration_secs: None,
        }
    }

    /// Stream location if it is present and non-blank
    pub fn stream_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Queue repeat behavior
///
/// String forms are exactly `off`, `one`, `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the queue
    #[default]
    Off,
    /// Loop the current track
    One,
    /// Wrap the queue at either end
    All,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "one" => Ok(RepeatMode::One),
            "all" => Ok(RepeatMode::All),
            other => Err(Error::InvalidInput(format!("unknown repeat mode: {}", other))),
        }
    }
}

/// On-disk track library format
#[derive(Debug, Default, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// In-memory track library, keyed by id, preserving file order
#[derive(Debug, Clone, Default)]
pub struct TrackLibrary {
    order: Vec<TrackId>,
    tracks: HashMap<TrackId, Track>,
}

impl TrackLibrary {
    pub fn new(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut library = Self::default();
        for track in tracks {
            if library.tracks.contains_key(&track.id) {
                tracing::warn!("Duplicate track id '{}' in library, keeping first", track.id);
                continue;
            }
            library.order.push(track.id.clone());
            library.tracks.insert(track.id.clone(), track);
        }
        library
    }

    /// Parse a library from TOML text (`[[tracks]]` tables)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: LibraryFile = toml::from_str(content)?;
        Ok(Self::new(file.tracks))
    }

    /// Load a library file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let library = Self::from_toml_str(&content)?;
        tracing::info!("Loaded {} tracks from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Track ids in library order
    pub fn ids(&self) -> &[TrackId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
