//! Catalog and configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading the catalog or loading configuration
#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Catalog database not found: {}", .0.display())]
    MissingDatabase(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file present but not valid TOML for [`crate::config::TomlConfig`]
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data (library file, block documents) that cannot be decoded
    #[error("Malformed catalog data: {0}")]
    MalformedData(String),
}
