//! # Grimnir Common Library
//!
//! Shared code for the Grimnir radio-automation crates including:
//! - Catalog track model
//! - Bootstrap configuration loading (TOML)
//! - SQLite connection and schema helpers
//! - Duration formatting utilities

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::Track;
