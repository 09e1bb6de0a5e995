//! Error types for deckwatch.

use thiserror::Error;

/// Deckwatch error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Config not found: {0}")]
    ConfigNotFound(std::path::PathBuf),

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    #[error("Game log directory not found. Pass --log-dir or set [logs] dir in the config.")]
    LogDirNotFound,

    #[error("Log file not found: {0}")]
    LogFileNotFound(std::path::PathBuf),
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
