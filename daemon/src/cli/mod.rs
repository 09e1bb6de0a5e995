//! CLI commands.

pub mod anchor;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use deckwatch::paths::{self, LogPaths};
use deckwatch::{Config, Error};

/// Where to find the logs and the config file. Shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Directory holding Power.log and LoadingScreen.log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Explicit Power.log path (overrides --log-dir)
    #[arg(long, value_name = "FILE", requires = "loading")]
    pub power: Option<PathBuf>,

    /// Explicit LoadingScreen.log path (overrides --log-dir)
    #[arg(long, value_name = "FILE", requires = "power")]
    pub loading: Option<PathBuf>,

    /// Config file (default: ~/.deckwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl SourceArgs {
    pub fn load_config(&self) -> Result<Config, Error> {
        Config::load(self.config.as_deref())
    }

    /// Log paths by precedence: explicit files, `--log-dir`, `[logs] dir`,
    /// then the usual install locations.
    pub fn resolve_paths(&self, config: &Config) -> Result<LogPaths, Error> {
        if let (Some(power), Some(loading)) = (&self.power, &self.loading) {
            return Ok(LogPaths::new(power, loading));
        }

        let explicit = self.log_dir.as_deref().or(config.logs.dir.as_deref());
        let dir = paths::resolve_log_dir(explicit)?;
        debug!(dir = %dir.display(), "Resolved log directory");
        Ok(LogPaths::in_dir(&dir))
    }

    /// Human-readable origin of the active config.
    pub fn config_source(&self) -> String {
        if let Some(path) = &self.config {
            return path.display().to_string();
        }
        match Config::default_path() {
            Ok(path) if path.exists() => path.display().to_string(),
            _ => "built-in defaults".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_files_win() {
        let args = SourceArgs {
            log_dir: Some(PathBuf::from("/nowhere")),
            power: Some(PathBuf::from("/a/Power.log")),
            loading: Some(PathBuf::from("/b/LoadingScreen.log")),
            config: None,
        };
        let paths = args.resolve_paths(&Config::default()).unwrap();
        assert_eq!(paths.power, PathBuf::from("/a/Power.log"));
        assert_eq!(paths.loading, PathBuf::from("/b/LoadingScreen.log"));
    }

    #[test]
    fn test_config_dir_used_without_flag() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(paths::POWER_LOG), "").unwrap();
        fs::write(dir.path().join(paths::LOADING_SCREEN_LOG), "").unwrap();

        let mut config = Config::default();
        config.logs.dir = Some(dir.path().to_path_buf());

        let paths = SourceArgs::default().resolve_paths(&config).unwrap();
        assert_eq!(paths, LogPaths::in_dir(dir.path()));
    }

    #[test]
    fn test_log_dir_without_logs_fails() {
        let dir = TempDir::new().unwrap();
        let args = SourceArgs {
            log_dir: Some(dir.path().to_path_buf()),
            ..SourceArgs::default()
        };
        assert!(matches!(
            args.resolve_paths(&Config::default()),
            Err(Error::LogDirNotFound)
        ));
    }
}
