//! SQLite access helpers for the media catalog
//!
//! The smart-block engine only ever reads the catalog; writers (the
//! dashboard, importers) own the schema. `create_catalog_schema` exists so
//! tools and tests can stand up a compatible database.

use crate::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Connect to an existing catalog database in read-only mode
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::MissingDatabase(db_path.to_path_buf()));
    }

    // mode=ro: no writes through this pool
    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    info!("Connected to catalog database (read-only): {}", db_path.display());
    Ok(pool)
}

/// Open a private in-memory database with the catalog schema
///
/// Limited to a single connection: every SQLite `:memory:` connection is a
/// separate database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_catalog_schema(&pool).await?;
    Ok(pool)
}

/// Create catalog tables if they do not exist (idempotent)
pub async fn create_catalog_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            active INTEGER NOT NULL DEFAULT 1,
            public INTEGER NOT NULL DEFAULT 0,
            approved INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_items (
            id TEXT PRIMARY KEY,
            station_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            artist TEXT NOT NULL DEFAULT '',
            album TEXT NOT NULL DEFAULT '',
            label TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            mood TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            year TEXT NOT NULL DEFAULT '',
            bpm REAL NOT NULL DEFAULT 0,
            explicit INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            show_in_archive INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_media_items_station ON media_items(station_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_items (
            playlist_id TEXT NOT NULL,
            media_id TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (playlist_id, media_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS smart_blocks (
            id TEXT PRIMARY KEY,
            station_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            rules TEXT NOT NULL DEFAULT '{}',
            sequence TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
