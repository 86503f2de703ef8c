//! Track lookup for queue navigation

use tunedeck_common::track::TrackLibrary;
use tunedeck_common::{Track, TrackId};

/// Resolves track ids to playable tracks
pub trait TrackCatalog: Send + Sync {
    fn resolve(&self, id: &TrackId) -> Option<Track>;

    /// Default queue order
    fn ids(&self) -> Vec<TrackId>;
}

/// Catalog backed by a fixed library
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    library: TrackLibrary,
}

impl StaticCatalog {
    pub fn new(library: TrackLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &TrackLibrary {
        &self.library
    }
}

impl TrackCatalog for StaticCatalog {
    fn resolve(&self, id: &TrackId) -> Option<Track> {
        self.library.get(id).cloned()
    }

    fn ids(&self) -> Vec<TrackId> {
        self.library.ids().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog_resolves_in_library_order() {
        let catalog = StaticCatalog::new(TrackLibrary::new([
            Track::new("b", "/music/b.flac"),
            Track::new("a", "/music/a.flac"),
        ]));

        assert_eq!(catalog.ids(), vec![TrackId::from("b"), TrackId::from("a")]);
        assert_eq!(
            catalog.resolve(&TrackId::from("a")).and_then(|t| t.url),
            Some("/music/a.flac".to_string())
        );
        assert!(catalog.resolve(&TrackId::from("zz")).is_none());
    }
}
