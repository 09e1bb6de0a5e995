//! Configuration loaded from `~/.deckwatch/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logs: LogsConfig,
    pub watch: WatchConfig,
    pub tail: TailConfig,
    pub anchor: AnchorConfig,
    pub session: SessionConfig,
    pub zones: ZoneConfig,
}

/// Where the game writes its logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Log directory. Probed automatically when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Bounds for the per-file carry buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// Carry size that triggers trimming.
    pub carry_limit_bytes: usize,
    /// Bytes kept (newest) after trimming.
    pub carry_keep_bytes: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            carry_limit_bytes: 2_000_000,
            carry_keep_bytes: 200_000,
        }
    }
}

/// Startup scan for the most recent session boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// How many trailing bytes of each file are scanned.
    pub max_scan_bytes: u64,
    /// Marker searched for in Power.log.
    pub power_marker: String,
    /// Marker searched for in LoadingScreen.log.
    pub loading_marker: String,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_scan_bytes: 4 * 1024 * 1024,
            power_marker: "CREATE_GAME".to_string(),
            loading_marker: "Gameplay.Start".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Substring in LoadingScreen.log that starts a new session.
    pub start_marker: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_marker: "Gameplay.Start".to_string(),
        }
    }
}

/// Entity/zone tracking rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Zone whose entry and exit are reported.
    pub tracked_zone: String,
    pub zone_tag: String,
    pub controller_tag: String,
    /// Only entities controlled by this player raise events. Unset disables the filter.
    pub controller_id: Option<u32>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            tracked_zone: "DECK".to_string(),
            zone_tag: "ZONE".to_string(),
            controller_tag: "CONTROLLER".to_string(),
            controller_id: None,
        }
    }
}

impl Config {
    /// Default config location (`~/.deckwatch/config.toml`).
    pub fn default_path() -> Result<PathBuf, Error> {
        let home = dirs::home_dir().ok_or(Error::HomeDirNotFound)?;
        Ok(home.join(".deckwatch").join("config.toml"))
    }

    /// Load config from an explicit path, or from the default path if present.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.watch.poll_interval_ms == 0 {
            return Err(invalid("watch.poll_interval_ms must be greater than 0"));
        }
        if self.anchor.max_scan_bytes == 0 {
            return Err(invalid("anchor.max_scan_bytes must be greater than 0"));
        }
        if self.tail.carry_keep_bytes > self.tail.carry_limit_bytes {
            return Err(invalid(
                "tail.carry_keep_bytes must not exceed tail.carry_limit_bytes",
            ));
        }

        let required = [
            ("anchor.power_marker", &self.anchor.power_marker),
            ("anchor.loading_marker", &self.anchor.loading_marker),
            ("session.start_marker", &self.session.start_marker),
            ("zones.tracked_zone", &self.zones.tracked_zone),
            ("zones.zone_tag", &self.zones.zone_tag),
            ("zones.controller_tag", &self.zones.controller_tag),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(&format!("{name} must not be empty")));
            }
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::ConfigInvalid(msg.to_string())
}
