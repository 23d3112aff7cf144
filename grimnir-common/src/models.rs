//! Catalog models

use serde::{Deserialize, Serialize};

/// Audio track snapshot as returned by a catalog query
///
/// Consumers treat this as immutable. Metadata fields that the library has
/// no value for are empty strings; `bpm == 0.0` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub label: String,
    pub genre: String,
    pub mood: String,
    pub language: String,
    /// Release year as tagged; may be partial ("1987-05") or empty
    #[serde(alias = "year")]
    pub release_year: String,
    pub bpm: f64,
    pub explicit: bool,
    pub duration_ms: i64,
}

impl Track {
    /// Parse the leading four-digit year out of `release_year`
    ///
    /// Returns `None` for empty or non-numeric values.
    pub fn year(&self) -> Option<i32> {
        let digits: String = self
            .release_year
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.len() < 4 {
            return None;
        }
        digits[..4].parse().ok()
    }
}
