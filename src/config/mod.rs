//! Application configuration loaded from a TOML file.

use std::path::{Path, PathBuf};

use rowboat_common::{Error, FlushMode, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file; in-memory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Log every statement the layer executes.
    #[serde(default)]
    pub show_sql: bool,

    /// Flush policy for request scopes.
    #[serde(default)]
    pub flush: FlushMode,
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load configuration from `path`, or fall back to defaults when no path is
/// given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}
