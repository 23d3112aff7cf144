//! SQLite catalog
//!
//! Reads `media_items`, `playlist_items`, `stations` and `smart_blocks`
//! through a read-only pool. Filters are pushed into SQL; normalized
//! matching strips the same punctuation as
//! [`normalize_match_text`](super::normalize_match_text) using nested
//! `REPLACE` calls.

use super::{
    normalize_match_text, Catalog, RuleSetResolver, SmartBlockDefinition, StationScope,
    TrackFilter, MATCH_PUNCTUATION,
};
use crate::rules::{RuleDocument, SequenceDocument};
use async_trait::async_trait;
use grimnir_common::{Error, Result, Track};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use tracing::debug;

/// Columns read for every track; malformed numerics decode as zero
const TRACK_COLUMNS: &str = "\
    id, \
    COALESCE(title, '') AS title, \
    COALESCE(artist, '') AS artist, \
    COALESCE(album, '') AS album, \
    COALESCE(label, '') AS label, \
    COALESCE(genre, '') AS genre, \
    COALESCE(mood, '') AS mood, \
    COALESCE(language, '') AS language, \
    COALESCE(CAST(year AS TEXT), '') AS year, \
    COALESCE(CAST(bpm AS REAL), 0.0) AS bpm, \
    COALESCE(CAST(explicit AS INTEGER), 0) AS explicit, \
    COALESCE(CAST(duration_ms AS INTEGER), 0) AS duration_ms";

/// BPM as decoded into `Track::bpm`; filters compare this, not the raw column
const BPM_EXPR: &str = "COALESCE(CAST(bpm AS REAL), 0.0)";

#[derive(Debug, FromRow)]
struct MediaRow {
    id: String,
    title: String,
    artist: String,
    album: String,
    label: String,
    genre: String,
    mood: String,
    language: String,
    year: String,
    bpm: f64,
    explicit: i64,
    duration_ms: i64,
}

impl From<MediaRow> for Track {
    fn from(row: MediaRow) -> Self {
        Track {
            id: row.id,
            title: row.title,
            artist: row.artist,
            album: row.album,
            label: row.label,
            genre: row.genre,
            mood: row.mood,
            language: row.language,
            release_year: row.year,
            bpm: row.bpm,
            explicit: row.explicit != 0,
            duration_ms: row.duration_ms,
        }
    }
}

#[derive(Debug, FromRow)]
struct SmartBlockRow {
    id: String,
    name: String,
    description: String,
    rules: String,
    sequence: String,
}

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing catalog database read-only
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(grimnir_common::db::connect_readonly(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// SQL expression equivalent to `normalize_match_text(column)`
fn normalized_column(column: &str) -> String {
    MATCH_PUNCTUATION
        .iter()
        .fold(format!("LOWER(TRIM({}))", column), |expr, c| {
            let literal = if *c == '\'' { "''".to_string() } else { c.to_string() };
            format!("REPLACE({}, '{}', '')", expr, literal)
        })
}

fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &StationScope) {
    qb.push("(station_id = ");
    qb.push_bind(scope.station_id.clone());
    if scope.include_public_archive {
        qb.push(
            " OR (show_in_archive = 1 AND station_id IN \
             (SELECT id FROM stations WHERE active = 1 AND public = 1 AND approved = 1))",
        );
    }
    qb.push(")");
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TrackFilter) {
    for (column, value) in [
        ("genre", &filter.genre),
        ("mood", &filter.mood),
        ("language", &filter.language),
    ] {
        if let Some(value) = value {
            qb.push(format!(" AND LOWER(TRIM({})) = ", column));
            qb.push_bind(value.trim().to_lowercase());
        }
    }

    if let Some(artist) = &filter.artist {
        qb.push(format!(" AND {} = ", normalized_column("artist")));
        qb.push_bind(normalize_match_text(artist));
    }

    if let Some(search) = &filter.text_search {
        let needle = normalize_match_text(&search.text);
        if !needle.is_empty() && !search.fields.is_empty() {
            qb.push(" AND (");
            {
                let mut separated = qb.separated(" OR ");
                for field in &search.fields {
                    separated.push(format!("INSTR({}, ", normalized_column(field.as_str())));
                    separated.push_bind_unseparated(needle.clone());
                    separated.push_unseparated(") > 0");
                }
            }
            qb.push(")");
        }
    }

    if let Some(min) = filter.bpm_min {
        qb.push(format!(" AND {} >= ", BPM_EXPR));
        qb.push_bind(min);
    }
    if let Some(max) = filter.bpm_max {
        qb.push(format!(" AND {} <= ", BPM_EXPR));
        qb.push_bind(max);
    }

    if !filter.source_playlists.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM playlist_items pi \
             WHERE pi.media_id = media_items.id AND pi.playlist_id IN (",
        );
        {
            let mut separated = qb.separated(", ");
            for playlist in &filter.source_playlists {
                separated.push_bind(playlist.clone());
            }
        }
        qb.push("))");
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn query_tracks(&self, scope: &StationScope, filter: &TrackFilter) -> Result<Vec<Track>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM media_items WHERE ", TRACK_COLUMNS));
        push_scope(&mut qb, scope);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY RANDOM()");

        let rows: Vec<MediaRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        debug!(station_id = %scope.station_id, count = rows.len(), "Catalog query");
        Ok(rows.into_iter().map(Track::from).collect())
    }
}

#[async_trait]
impl RuleSetResolver for SqliteCatalog {
    async fn resolve_block(&self, block_id: &str) -> Result<Option<SmartBlockDefinition>> {
        let row: Option<SmartBlockRow> = sqlx::query_as(
            r#"
            SELECT id, name, COALESCE(description, '') AS description,
                   COALESCE(rules, '') AS rules, COALESCE(sequence, '') AS sequence
            FROM smart_blocks
            WHERE id = ?
            "#,
        )
        .bind(block_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rules = RuleDocument::from_json(&row.rules)
            .map_err(|e| Error::MalformedData(format!("Smart block {} rules: {}", row.id, e)))?;
        let sequence = SequenceDocument::from_json(&row.sequence)
            .map_err(|e| Error::MalformedData(format!("Smart block {} sequence: {}", row.id, e)))?;

        Ok(Some(SmartBlockDefinition {
            id: row.id,
            name: row.name,
            description: row.description,
            rules,
            sequence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TextSearch;
    use crate::rules::DocumentFields;
    use grimnir_common::db::open_in_memory;

    async fn seeded_catalog() -> SqliteCatalog {
        let pool = open_in_memory().await.unwrap();

        sqlx::query(
            "INSERT INTO stations (id, name, active, public, approved) VALUES \
             ('s1', 'One', 1, 0, 0), ('s2', 'Two', 1, 1, 1), ('s3', 'Three', 1, 1, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO media_items \
             (id, station_id, title, artist, album, label, genre, bpm, duration_ms, show_in_archive) VALUES \
             ('t1', 's1', 'Back in Black', 'AC/DC', 'Back in Black', 'Atlantic', 'Rock', 94, 255000, 0), \
             ('t2', 's1', 'So What', 'Miles Davis', 'Kind of Blue', 'Columbia', 'Jazz', 136, 562000, 0), \
             ('t3', 's2', 'Shared Song', 'Guest', 'Guest Album', 'Indie', 'rock', 120, 200000, 1), \
             ('t4', 's3', 'Hidden Song', 'Ghost', '', '', 'Rock', 120, 200000, 1), \
             ('ad1', 's1', 'Spring Sale', 'Announcer', '', 'Mattress World', 'Ads', 0, 30000, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("INSERT INTO playlist_items (playlist_id, media_id, position) VALUES ('ads', 'ad1', 0)")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO smart_blocks (id, station_id, name, rules, sequence) VALUES \
             ('b1', 's1', 'Rock Hour', '{\"genre\":\"Rock\",\"targetMinutes\":60}', '{\"mode\":\"balanced\"}'), \
             ('broken', 's1', 'Broken', '[1,2]', '')",
        )
        .execute(&pool)
        .await
        .unwrap();

        SqliteCatalog::new(pool)
    }

    async fn query_ids(catalog: &SqliteCatalog, scope: &StationScope, filter: &TrackFilter) -> Vec<String> {
        let mut ids: Vec<String> = catalog
            .query_tracks(scope, filter)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_normalized_column_strips_quote() {
        let expr = normalized_column("artist");
        assert!(expr.starts_with("REPLACE("));
        assert!(expr.contains("LOWER(TRIM(artist))"));
        assert!(expr.contains("'''', ''"));
    }

    #[tokio::test]
    async fn test_station_scope() {
        let catalog = seeded_catalog().await;
        let ids = query_ids(&catalog, &StationScope::station("s1"), &TrackFilter::default()).await;
        assert_eq!(ids, vec!["ad1", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_public_archive_requires_approved_station() {
        let catalog = seeded_catalog().await;
        let scope = StationScope {
            station_id: "s1".to_string(),
            include_public_archive: true,
        };
        let filter = TrackFilter {
            genre: Some("ROCK".to_string()),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &filter).await, vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn test_normalized_artist_and_text_search() {
        let catalog = seeded_catalog().await;
        let scope = StationScope::station("s1");

        let by_artist = TrackFilter {
            artist: Some("acdc".to_string()),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &by_artist).await, vec!["t1"]);

        sqlx::query(
            "INSERT INTO media_items (id, station_id, title, artist, duration_ms) VALUES \
             ('t5', 's1', 'Live Wire', 'AC DC', 200000), ('t6', 's1', 'Jailbreak', 'ac\\dc', 200000)",
        )
        .execute(catalog.pool())
        .await
        .unwrap();
        assert_eq!(query_ids(&catalog, &scope, &by_artist).await, vec!["t1", "t5", "t6"]);

        let by_text = TrackFilter {
            text_search: Some(TextSearch::music("kind of")),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &by_text).await, vec!["t2"]);

        let by_label = TrackFilter {
            text_search: Some(TextSearch::interstitial("mattress")),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &by_label).await, vec!["ad1"]);
    }

    #[tokio::test]
    async fn test_bpm_and_playlist_filters() {
        let catalog = seeded_catalog().await;
        let scope = StationScope::station("s1");

        let fast = TrackFilter {
            bpm_min: Some(100.0),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &fast).await, vec!["t2"]);

        // Text BPM decodes as 0 and is filtered as 0
        sqlx::query(
            "INSERT INTO media_items (id, station_id, title, bpm, duration_ms) \
             VALUES ('t7', 's1', 'Mistagged', 'abc', 200000)",
        )
        .execute(catalog.pool())
        .await
        .unwrap();
        assert_eq!(query_ids(&catalog, &scope, &fast).await, vec!["t2"]);

        let slow = TrackFilter {
            bpm_max: Some(100.0),
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &slow).await, vec!["ad1", "t1", "t7"]);

        let ads = TrackFilter {
            source_playlists: vec!["ads".to_string(), "other".to_string()],
            ..Default::default()
        };
        assert_eq!(query_ids(&catalog, &scope, &ads).await, vec!["ad1"]);
    }

    #[tokio::test]
    async fn test_track_fields_decode() {
        let catalog = seeded_catalog().await;
        let filter = TrackFilter {
            artist: Some("Miles Davis".to_string()),
            ..Default::default()
        };
        let tracks = catalog
            .query_tracks(&StationScope::station("s1"), &filter)
            .await
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].album, "Kind of Blue");
        assert_eq!(tracks[0].bpm, 136.0);
        assert_eq!(tracks[0].duration_ms, 562_000);
        assert!(!tracks[0].explicit);
    }

    #[tokio::test]
    async fn test_resolve_block() {
        let catalog = seeded_catalog().await;

        let block = catalog.resolve_block("b1").await.unwrap().unwrap();
        assert_eq!(block.name, "Rock Hour");
        assert_eq!(block.rules.string_field("genre").as_deref(), Some("Rock"));
        assert_eq!(block.sequence.string_field("mode").as_deref(), Some("balanced"));

        assert!(catalog.resolve_block("missing").await.unwrap().is_none());
        assert!(matches!(
            catalog.resolve_block("broken").await,
            Err(Error::MalformedData(_))
        ));
    }
}
