//! Locating the game's log files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::Error;

pub const POWER_LOG: &str = "Power.log";
pub const LOADING_SCREEN_LOG: &str = "LoadingScreen.log";

/// The two files the pipeline tails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    /// Entity/tag change log.
    pub power: PathBuf,
    /// Scene transition log (session starts).
    pub loading: PathBuf,
}

impl LogPaths {
    pub fn new(power: impl Into<PathBuf>, loading: impl Into<PathBuf>) -> Self {
        Self {
            power: power.into(),
            loading: loading.into(),
        }
    }

    /// Standard file names inside a log directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(POWER_LOG), dir.join(LOADING_SCREEN_LOG))
    }

    /// Fail with the first path that does not exist.
    pub fn ensure_exist(&self) -> Result<(), Error> {
        for path in [&self.power, &self.loading] {
            if !path.is_file() {
                return Err(Error::LogFileNotFound(path.clone()));
            }
        }
        Ok(())
    }
}

fn has_logs(dir: &Path) -> bool {
    dir.join(POWER_LOG).is_file() && dir.join(LOADING_SCREEN_LOG).is_file()
}

/// Resolve the log directory: an explicit one must contain both logs,
/// otherwise the usual install locations are probed.
pub fn resolve_log_dir(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(dir) = explicit {
        if has_logs(dir) {
            return Ok(dir.to_path_buf());
        }
        // Allow pointing at the parent holding Hearthstone_* session folders.
        return latest_session_dir(dir).ok_or(Error::LogDirNotFound);
    }

    for root in candidate_roots() {
        if !root.is_dir() {
            continue;
        }
        debug!(root = %root.display(), "Probing log root");
        if has_logs(&root) {
            info!(dir = %root.display(), "Found log directory");
            return Ok(root);
        }
        if let Some(dir) = latest_session_dir(&root) {
            info!(dir = %dir.display(), "Found log directory");
            return Ok(dir);
        }
    }

    Err(Error::LogDirNotFound)
}

/// Newest `Hearthstone_*` subdirectory of `root` that holds both logs.
fn latest_session_dir(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("Hearthstone_"))
        })
        .map(|entry| entry.path())
        .filter(|path| has_logs(path))
        .max_by_key(|path| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}

fn candidate_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(local) = dirs::data_local_dir() {
        roots.push(local.join("Blizzard").join("Hearthstone").join("Logs"));
    }
    for var in ["ProgramFiles(x86)", "ProgramFiles"] {
        if let Some(base) = std::env::var_os(var) {
            roots.push(PathBuf::from(base).join("Hearthstone").join("Logs"));
        }
    }
    roots.push(PathBuf::from("/Applications/Hearthstone/Logs"));

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch_logs(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(POWER_LOG), "").unwrap();
        fs::write(dir.join(LOADING_SCREEN_LOG), "").unwrap();
    }

    #[test]
    fn test_explicit_dir_with_logs() {
        let tmp = TempDir::new().unwrap();
        touch_logs(tmp.path());
        assert_eq!(resolve_log_dir(Some(tmp.path())).unwrap(), tmp.path());
    }

    #[test]
    fn test_explicit_parent_picks_newest_session_folder() {
        let tmp = TempDir::new().unwrap();
        let older = tmp.path().join("Hearthstone_2026_01_01");
        let newer = tmp.path().join("Hearthstone_2026_02_01");
        touch_logs(&older);
        thread::sleep(Duration::from_millis(1100));
        touch_logs(&newer);
        // Folder without both logs is ignored.
        fs::create_dir_all(tmp.path().join("Hearthstone_2026_03_01")).unwrap();

        assert_eq!(resolve_log_dir(Some(tmp.path())).unwrap(), newer);
    }

    #[test]
    fn test_explicit_dir_without_logs_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            resolve_log_dir(Some(tmp.path())),
            Err(Error::LogDirNotFound)
        ));
    }

    #[test]
    fn test_ensure_exist_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        let paths = LogPaths::in_dir(tmp.path());
        fs::write(&paths.power, "").unwrap();

        match paths.ensure_exist() {
            Err(Error::LogFileNotFound(path)) => assert_eq!(path, paths.loading),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
