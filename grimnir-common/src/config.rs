//! Bootstrap configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `GRIMNIR_CONFIG` environment variable
//! 3. `<config_dir>/grimnir/<module>.toml`
//! 4. Built-in defaults (no file)
//!
//! A missing or unreadable file is never fatal: a warning is logged and
//! defaults are used. A file that exists but does not parse is a
//! configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GRIMNIR_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// SQLite catalog database (opened read-only)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// JSON library file used when no database is configured
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Station whose media is in scope
    #[serde(default)]
    pub station_id: Option<String>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Preview generation defaults (optional)
    #[serde(default)]
    pub preview: PreviewDefaults,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Defaults applied to preview runs when the CLI does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewDefaults {
    /// Fixed random seed; wall-clock seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of variants generated per preview
    #[serde(default = "default_variants")]
    pub variants: usize,
}

impl Default for PreviewDefaults {
    fn default() -> Self {
        Self {
            seed: None,
            variants: default_variants(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_variants() -> usize {
    1
}

/// Resolves which config file a module should read
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    module_name: String,
}

impl ConfigResolver {
    /// Create a resolver for the given module (used as the file stem)
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Resolve the config file path following the priority order
    ///
    /// Returns `None` when no explicit path was given and the platform
    /// default file does not exist.
    pub fn resolve_path(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config directory
        default_config_path(&self.module_name).filter(|path| path.exists())
    }

    /// Resolve and load the configuration
    pub fn load(&self, cli_arg: Option<&Path>) -> Result<TomlConfig> {
        match self.resolve_path(cli_arg) {
            Some(path) => load_toml_config(&path),
            None => {
                warn!(
                    "No config file found for {}, using built-in defaults",
                    self.module_name
                );
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Platform default config file path for a module
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("grimnir").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file
///
/// Missing or unreadable files fall back to defaults with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Config file unreadable: {} ({}), using defaults",
                path.display(),
                e
            );
            return Ok(TomlConfig::default());
        }
    };

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}
