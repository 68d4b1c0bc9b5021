//! Bootstrap configuration loading and config file resolution
//!
//! Configuration is a single TOML file read once at startup. Each component
//! defines its own top-level struct and deserializes it through [`load_toml`];
//! this module only knows how to find the file and how to parse it.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the per-user / system config subdirectory
pub const CONFIG_DIR_NAME: &str = "mirror";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging configuration (`[logging]` section)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. Per-user config file (`~/.config/mirror/config.toml`)
/// 4. System config file (`/etc/mirror/config.toml`, unix only)
///
/// Returns `None` when nothing applies; callers then run on built-in defaults.
/// Explicit paths (1 and 2) are returned even if the file is missing so that
/// loading reports the error instead of silently falling back.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML file into `T`.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let parsed = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(parsed)
}

/// Load `T` from `path` if given, otherwise return `T::default()`.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load_toml(path),
        None => {
            debug!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
