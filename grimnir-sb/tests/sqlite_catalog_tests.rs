//! Full preview pipeline over the SQLite catalog
//!
//! Uses a single-connection in-memory database with the catalog schema.

use grimnir_common::db::open_in_memory;
use grimnir_sb::catalog::SqliteCatalog;
use grimnir_sb::{materialize_slot, render_preview, PreviewService, SequenceWarning};
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

async fn seed_catalog() -> SqlitePool {
    let pool = open_in_memory().await.expect("Should open in-memory db");

    sqlx::query("INSERT INTO stations (id, name, active, public, approved) VALUES ('s1', 'Main', 1, 1, 1)")
        .execute(&pool)
        .await
        .unwrap();

    for i in 0..12 {
        let genre = if i < 8 { "Rock" } else { "Oldies" };
        sqlx::query(
            "INSERT INTO media_items (id, station_id, title, artist, genre, year, bpm, duration_ms) \
             VALUES (?, 's1', ?, ?, ?, ?, ?, ?)",
        )
        .bind(format!("m{}", i))
        .bind(format!("Song {}", i))
        .bind(format!("Artist {}", i % 4))
        .bind(genre)
        .bind(if i % 2 == 0 { "1984" } else { "1996-04-01" })
        .bind(90.0 + i as f64 * 5.0)
        .bind(180_000_i64)
        .execute(&pool)
        .await
        .unwrap();
    }

    sqlx::query(
        "INSERT INTO media_items (id, station_id, title, artist, label, genre, duration_ms) VALUES \
         ('ad1', 's1', 'Spring Sale', 'Announcer', 'Mattress World', 'Ads', 30000), \
         ('bad', 's1', 'Broken Import', 'Nobody', '', 'Rock', 'n/a')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO smart_blocks (id, station_id, name, rules, sequence) VALUES \
         ('rock', 's1', 'Rock Block', ?, '{}'), \
         ('oldies', 's1', 'Oldies', '{\"genre\": \"Oldies\"}', '{}')",
    )
    .bind(
        serde_json::json!({
            "genre": "Rock",
            "targetMinutes": 15,
            "separationEnabled": true,
            "separation": {"artist": 9},
            "interstitials": {"enabled": true, "sourceType": "query", "query": "mattress", "every": 2},
            "fallbacksEnabled": true,
            "fallbacks": [{"blockID": "oldies", "limit": 2}, {"blockID": "rock"}]
        })
        .to_string(),
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

fn service(pool: SqlitePool) -> PreviewService {
    let catalog = Arc::new(SqliteCatalog::new(pool));
    PreviewService::new(catalog.clone(), catalog).with_current_year(2026)
}

#[tokio::test]
async fn test_stored_block_preview() {
    let service = service(seed_catalog().await);

    let result = service.preview_block("rock", "s1", 21).await.unwrap();

    // Malformed duration decodes as zero and never enters the pool
    assert!(result.placements.iter().all(|p| p.track.id != "bad"));
    assert!(result.total_ms <= 15 * 60_000 + 2_000);

    let mut music_seen = 0;
    for placement in &result.placements {
        if placement.is_ad {
            assert_eq!(placement.track.id, "ad1");
            assert_eq!(music_seen % 2, 0);
        } else {
            assert!(placement.track.genre == "Rock" || placement.from_fallback);
            music_seen += 1;
        }
    }

    let text = render_preview(&result);
    assert!(text.contains("Total: "));
}

#[tokio::test]
async fn test_fallback_from_database_block() {
    let pool = seed_catalog().await;
    sqlx::query(
        "INSERT INTO smart_blocks (id, station_id, name, rules) VALUES \
         ('tiny', 's1', 'Tiny', '{\"genre\": \"Jazz\", \"targetMinutes\": 6, \"fallbacksEnabled\": true, \"fallbacks\": [{\"blockID\": \"oldies\", \"limit\": 2}]}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = service(pool).preview_block("tiny", "s1", 2).await.unwrap();

    assert_eq!(result.placements.len(), 2);
    assert!(result.placements.iter().all(|p| p.from_fallback && p.track.genre == "Oldies"));
    assert_eq!(result.total_ms, 6 * 60_000);
    assert!(result.has_warning(|w| *w == SequenceWarning::UsedFallback));
}

#[tokio::test]
async fn test_era_post_filter() {
    let pool = seed_catalog().await;
    sqlx::query(
        "INSERT INTO smart_blocks (id, station_id, name, rules) VALUES \
         ('eighties', 's1', 'Eighties', '{\"era\": \"80s\", \"targetMinutes\": 60}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let result = service(pool).preview_block("eighties", "s1", 8).await.unwrap();

    assert_eq!(result.placements.len(), 6);
    assert!(result
        .placements
        .iter()
        .all(|p| p.track.release_year == "1984"));
}

#[tokio::test]
async fn test_materialize_database_preview() {
    let service = service(seed_catalog().await);
    let result = service.preview_block("oldies", "s1", 1).await.unwrap();
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();

    let items = materialize_slot(&result, start);
    assert_eq!(items.len(), result.placements.len());
    assert_eq!(items[0].starts_at, start);
    for pair in items.windows(2) {
        assert_eq!(pair[0].ends_at, pair[1].starts_at);
    }
}
