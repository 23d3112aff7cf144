//! Test Helper Utilities
//!
//! Shared library builders for grimnir-sb integration tests

#![allow(dead_code)]

use grimnir_common::Track;
use grimnir_sb::catalog::{InMemoryCatalog, Library, LibraryItem, ResultOrdering, SmartBlockDefinition};
use grimnir_sb::{PreviewRequest, PreviewService, RuleDocument, SequenceDocument};
use serde_json::Value;
use std::sync::Arc;

pub const STATION: &str = "station-1";
pub const MINUTE: i64 = 60_000;

/// Track with the given id, artist, genre and duration
pub fn track(id: &str, artist: &str, genre: &str, duration_ms: i64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Song {}", id),
        artist: artist.to_string(),
        album: format!("Album {}", id),
        genre: genre.to_string(),
        duration_ms,
        ..Default::default()
    }
}

/// Library item owned by the test station
pub fn owned(track: Track) -> LibraryItem {
    LibraryItem {
        station_id: STATION.to_string(),
        show_in_archive: false,
        track,
    }
}

pub fn block(id: &str, rules: Value) -> SmartBlockDefinition {
    SmartBlockDefinition {
        id: id.to_string(),
        name: id.to_string(),
        rules: RuleDocument::from_value(rules),
        ..Default::default()
    }
}

/// Preview service over an in-memory library with a fixed result order
pub fn service(library: Library) -> PreviewService {
    let catalog = Arc::new(InMemoryCatalog::new(library).with_ordering(ResultOrdering::Seeded(11)));
    PreviewService::new(catalog.clone(), catalog).with_current_year(2026)
}

pub fn request(rules: Value, seed: u64) -> PreviewRequest {
    PreviewRequest {
        block_id: Some("under-test".to_string()),
        station_id: STATION.to_string(),
        rules: RuleDocument::from_value(rules),
        sequence: SequenceDocument::new(),
        seed,
    }
}

pub fn request_with_sequence(rules: Value, sequence: Value, seed: u64) -> PreviewRequest {
    PreviewRequest {
        sequence: SequenceDocument::from_value(sequence),
        ..request(rules, seed)
    }
}
