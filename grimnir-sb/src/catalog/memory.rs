//! In-memory catalog
//!
//! Serves tracks and smart blocks from a [`Library`] held in memory, usually
//! loaded from a JSON file. Used by the CLI when no database is configured
//! and throughout the tests.

use super::{Catalog, RuleSetResolver, SmartBlockDefinition, StationScope, TrackFilter};
use async_trait::async_trait;
use grimnir_common::{Error, Result, Track};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// A station's media item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub station_id: String,
    /// Offered to other stations through the public archive
    #[serde(default)]
    pub show_in_archive: bool,
    #[serde(flatten)]
    pub track: Track,
}

/// Everything an [`InMemoryCatalog`] serves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub items: Vec<LibraryItem>,
    /// Playlist id → member track ids
    pub playlists: BTreeMap<String, Vec<String>>,
    /// Stations that are active, public and approved
    pub public_stations: Vec<String>,
    pub smart_blocks: Vec<SmartBlockDefinition>,
}

impl Library {
    /// Load a library from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let library: Library = serde_json::from_str(&content).map_err(|e| {
            Error::MalformedData(format!("Parse library failed ({}): {}", path.display(), e))
        })?;
        info!(
            "Loaded library from {}: {} items, {} playlists, {} smart blocks",
            path.display(),
            library.items.len(),
            library.playlists.len(),
            library.smart_blocks.len()
        );
        Ok(library)
    }

    fn in_scope(&self, item: &LibraryItem, scope: &StationScope) -> bool {
        item.station_id == scope.station_id
            || (scope.include_public_archive
                && item.show_in_archive
                && self.public_stations.contains(&item.station_id))
    }

    fn in_playlists(&self, track_id: &str, playlists: &[String]) -> bool {
        playlists.iter().any(|playlist| {
            self.playlists
                .get(playlist)
                .is_some_and(|members| members.iter().any(|m| m == track_id))
        })
    }
}

/// Order in which query results are returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultOrdering {
    /// Shuffled from thread-local entropy
    #[default]
    Random,
    /// Shuffled deterministically; the same seed gives the same order
    Seeded(u64),
    /// Library order
    Insertion,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    library: Library,
    ordering: ResultOrdering,
}

impl InMemoryCatalog {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            ordering: ResultOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: ResultOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn query_tracks(&self, scope: &StationScope, filter: &TrackFilter) -> Result<Vec<Track>> {
        let mut tracks: Vec<Track> = self
            .library
            .items
            .iter()
            .filter(|item| self.library.in_scope(item, scope))
            .filter(|item| {
                filter.source_playlists.is_empty()
                    || self.library.in_playlists(&item.track.id, &filter.source_playlists)
            })
            .filter(|item| filter.matches_metadata(&item.track))
            .map(|item| item.track.clone())
            .collect();

        match self.ordering {
            ResultOrdering::Random => tracks.shuffle(&mut rand::thread_rng()),
            ResultOrdering::Seeded(seed) => tracks.shuffle(&mut StdRng::seed_from_u64(seed)),
            ResultOrdering::Insertion => {}
        }

        debug!(station_id = %scope.station_id, count = tracks.len(), "In-memory query");
        Ok(tracks)
    }
}

#[async_trait]
impl RuleSetResolver for InMemoryCatalog {
    async fn resolve_block(&self, block_id: &str) -> Result<Option<SmartBlockDefinition>> {
        Ok(self
            .library
            .smart_blocks
            .iter()
            .find(|block| block.id == block_id)
            .cloned())
    }
}
