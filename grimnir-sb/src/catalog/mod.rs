//! Catalog seams consumed by the pool builder
//!
//! Two collaborators feed the engine:
//! - [`Catalog`] answers filtered track queries for a station scope
//! - [`RuleSetResolver`] looks up other smart blocks (fallback references)
//!
//! Both are async traits so adapters can sit on a database pool. The
//! reference adapters are [`InMemoryCatalog`] and [`SqliteCatalog`].

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryCatalog, Library, LibraryItem, ResultOrdering};
pub use sqlite::SqliteCatalog;

use crate::normalize::TrackField;
use crate::rules::{RuleDocument, SequenceDocument};
use async_trait::async_trait;
use grimnir_common::{Result, Track};
use serde::{Deserialize, Serialize};

/// Track query interface
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Return every track in scope matching the filter
    ///
    /// # Returns
    /// * `Ok(tracks)` - Matching tracks, in an order chosen by the catalog
    ///   (production catalogs randomize)
    /// * `Err(_)` - Query failed; the engine propagates this unchanged
    async fn query_tracks(&self, scope: &StationScope, filter: &TrackFilter) -> Result<Vec<Track>>;
}

/// Smart block lookup for fallback references
#[async_trait]
pub trait RuleSetResolver: Send + Sync {
    /// Resolve a block id to its definition
    ///
    /// `Ok(None)` means the block does not exist.
    async fn resolve_block(&self, block_id: &str) -> Result<Option<SmartBlockDefinition>>;
}

/// Stored smart block: identity plus its two documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartBlockDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: RuleDocument,
    #[serde(default)]
    pub sequence: SequenceDocument,
}

/// Which stations' media a query may return
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationScope {
    pub station_id: String,
    /// Also include items other public, approved, active stations have
    /// flagged for the public archive
    pub include_public_archive: bool,
}

impl StationScope {
    pub fn station(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            include_public_archive: false,
        }
    }
}

/// Normalized substring search across a set of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    pub text: String,
    pub fields: Vec<TrackField>,
}

impl TextSearch {
    /// Search over title, artist and album (music pools)
    pub fn music(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: vec![TrackField::Title, TrackField::Artist, TrackField::Album],
        }
    }

    /// Search over artist, title and label (interstitial pools)
    pub fn interstitial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: vec![TrackField::Artist, TrackField::Title, TrackField::Label],
        }
    }

    /// True when any searched field contains the normalized text
    pub fn matches(&self, track: &Track) -> bool {
        let needle = normalize_match_text(&self.text);
        if needle.is_empty() {
            return true;
        }
        self.fields
            .iter()
            .any(|field| normalize_match_text(field.value_of(track)).contains(&needle))
    }
}

/// Filters pushed down to the catalog
///
/// All present filters must match. Text comparisons ignore case; artist
/// and free-text comparisons also ignore punctuation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFilter {
    pub genre: Option<String>,
    pub artist: Option<String>,
    pub mood: Option<String>,
    pub language: Option<String>,
    pub text_search: Option<TextSearch>,
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
    /// Restrict to members of any of these playlists
    pub source_playlists: Vec<String>,
}

impl TrackFilter {
    /// Evaluate every filter except playlist membership
    ///
    /// Playlist membership lives outside the track snapshot, so adapters
    /// check it themselves.
    pub fn matches_metadata(&self, track: &Track) -> bool {
        if !equals_ignoring_case(self.genre.as_deref(), &track.genre)
            || !equals_ignoring_case(self.mood.as_deref(), &track.mood)
            || !equals_ignoring_case(self.language.as_deref(), &track.language)
        {
            return false;
        }

        if let Some(artist) = &self.artist {
            if normalize_match_text(artist) != normalize_match_text(&track.artist) {
                return false;
            }
        }

        if let Some(search) = &self.text_search {
            if !search.matches(track) {
                return false;
            }
        }

        if let Some(min) = self.bpm_min {
            if track.bpm < min {
                return false;
            }
        }
        if let Some(max) = self.bpm_max {
            if track.bpm > max {
                return false;
            }
        }

        true
    }
}

fn equals_ignoring_case(wanted: Option<&str>, actual: &str) -> bool {
    match wanted {
        Some(wanted) => wanted.trim().to_lowercase() == actual.trim().to_lowercase(),
        None => true,
    }
}

/// Characters dropped by [`normalize_match_text`], whitespace included
///
/// Adapters that normalize inside the database strip the same set.
pub const MATCH_PUNCTUATION: &[char] = &[
    ' ', '\'', '"', '.', ',', '!', '?', '-', '_', '&', '/', '\\', ':', ';', '(', ')', '[', ']',
];

/// Lowercase, trim and strip punctuation for fuzzy equality/substring tests
///
/// # Examples
///
/// ```
/// use grimnir_sb::catalog::normalize_match_text;
///
/// assert_eq!(normalize_match_text("  Guns N' Roses "), "gunsnroses");
/// assert_eq!(normalize_match_text("AC/DC"), "acdc");
/// ```
pub fn normalize_match_text(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !MATCH_PUNCTUATION.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artist: &str, genre: &str, bpm: f64) -> Track {
        Track {
            id: title.to_lowercase(),
            title: title.to_string(),
            artist: artist.to_string(),
            genre: genre.to_string(),
            bpm,
            duration_ms: 180_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_match_text() {
        assert_eq!(normalize_match_text("Mr. Brightside!"), "mrbrightside");
        assert_eq!(normalize_match_text(""), "");
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(TrackFilter::default().matches_metadata(&track("A", "B", "", 0.0)));
    }

    #[test]
    fn test_genre_is_case_insensitive() {
        let filter = TrackFilter {
            genre: Some("rock".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&track("A", "B", " Rock", 0.0)));
        assert!(!filter.matches_metadata(&track("A", "B", "Jazz", 0.0)));
    }

    #[test]
    fn test_artist_ignores_punctuation() {
        let filter = TrackFilter {
            artist: Some("acdc".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&track("Thunderstruck", "AC/DC", "Rock", 0.0)));
        assert!(filter.matches_metadata(&track("Thunderstruck", "AC DC", "Rock", 0.0)));
        assert!(filter.matches_metadata(&track("Thunderstruck", "AC\\DC", "Rock", 0.0)));
        assert!(!filter.matches_metadata(&track("Thunderstruck", "AC DC Tribute", "Rock", 0.0)));
    }

    #[test]
    fn test_text_search_fields() {
        let mut ad = track("Spring Sale", "Announcer", "Ads", 0.0);
        ad.label = "Mattress World".to_string();

        assert!(TextSearch::interstitial("mattress").matches(&ad));
        assert!(!TextSearch::music("mattress").matches(&ad));
        assert!(TextSearch::music("spring").matches(&ad));
    }

    #[test]
    fn test_bpm_range() {
        let filter = TrackFilter {
            bpm_min: Some(100.0),
            bpm_max: Some(130.0),
            ..Default::default()
        };
        assert!(filter.matches_metadata(&track("A", "B", "", 120.0)));
        assert!(!filter.matches_metadata(&track("A", "B", "", 90.0)));
        assert!(!filter.matches_metadata(&track("A", "B", "", 140.0)));
    }
}
