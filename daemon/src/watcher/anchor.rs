//! Session starting point.
//!
//! At startup the tail of both logs is scanned for the last session marker
//! in each. Lines older than the later of the two are stale history from a
//! previous session and are never replayed.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};
use tracing::{debug, info};

use crate::config::{AnchorConfig, TailConfig};
use crate::error::Error;
use crate::paths::LogPaths;
use crate::watcher::tailer::LineTailer;
use crate::watcher::timestamp::SourceClock;

/// How far past the file's modification time a parsed timestamp may lie
/// before the base date is moved back a day.
const FUTURE_TOLERANCE_SECS: i64 = 60;

/// Scan result for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAnchor {
    /// Byte offset the scan (and later tailing) starts from.
    pub window_start: u64,
    /// Calendar day the first line in the window belongs to.
    pub base_date: NaiveDate,
    /// Timestamp of the last marker line, if any.
    pub marker: Option<NaiveDateTime>,
}

/// Cutoff below which lines from either source are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAnchor {
    pub cutoff: NaiveDateTime,
    pub loading: SourceAnchor,
    pub power: SourceAnchor,
}

impl SessionAnchor {
    /// Whether a line stamped `ts` belongs to the current session.
    pub fn admits(&self, ts: NaiveDateTime) -> bool {
        ts >= self.cutoff
    }

    /// True when neither file had a marker and everything is processed.
    pub fn is_open(&self) -> bool {
        self.cutoff == NaiveDateTime::MIN
    }
}

/// Compute the anchor using the current local time.
pub fn find_anchor(
    paths: &LogPaths,
    anchor: &AnchorConfig,
    tail: &TailConfig,
) -> Result<SessionAnchor, Error> {
    find_anchor_at(paths, anchor, tail, Local::now().naive_local())
}

/// Compute the anchor, treating `now` as the latest possible time.
pub fn find_anchor_at(
    paths: &LogPaths,
    anchor: &AnchorConfig,
    tail: &TailConfig,
    now: NaiveDateTime,
) -> Result<SessionAnchor, Error> {
    let loading = scan_source(&paths.loading, &anchor.loading_marker, anchor, tail, now)?;
    let power = scan_source(&paths.power, &anchor.power_marker, anchor, tail, now)?;

    // Fail open: with no marker anywhere, process everything in the window.
    let cutoff = match (loading.marker, power.marker) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => NaiveDateTime::MIN,
    };

    if cutoff == NaiveDateTime::MIN {
        info!("No session marker found, processing all recent lines");
    } else {
        info!(%cutoff, "Session anchor found");
    }

    Ok(SessionAnchor {
        cutoff,
        loading,
        power,
    })
}

/// Scan the last `max_scan_bytes` of `path`, keeping the last line containing `marker`.
fn scan_source(
    path: &Path,
    marker: &str,
    anchor: &AnchorConfig,
    tail: &TailConfig,
    now: NaiveDateTime,
) -> Result<SourceAnchor, Error> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::LogFileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let len = metadata.len();
    let window_start = len.saturating_sub(anchor.max_scan_bytes);

    let reference = metadata
        .modified()
        .ok()
        .map(|t| DateTime::<Local>::from(t).naive_local())
        .map_or(now, |modified| modified.min(now));

    let mut tailer = LineTailer::new(path, tail.clone()).starting_at(window_start);
    let lines = tailer.read_new_lines();

    let mut base_date = reference.date();
    let mut clock = SourceClock::new(base_date);
    let mut marker_ts = None;
    for line in &lines {
        let Some(ts) = clock.stamp(line) else {
            continue;
        };
        if line.contains(marker) {
            marker_ts = Some(ts);
        }
    }

    // A chain ending in the future started on the wrong day.
    if let Some(last) = clock.last() {
        let ahead = last - reference;
        if ahead > TimeDelta::seconds(FUTURE_TOLERANCE_SECS) {
            let days = ahead.num_days() + 1;
            base_date -= TimeDelta::days(days);
            marker_ts = marker_ts.map(|ts| ts - TimeDelta::days(days));
            debug!(path = %path.display(), days, "Shifted log base date back");
        }
    }

    debug!(
        path = %path.display(),
        window_start,
        lines = lines.len(),
        marker = ?marker_ts,
        "Scanned log tail"
    );

    Ok(SourceAnchor {
        window_start,
        base_date,
        marker: marker_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::merge::MergeScheduler;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn now() -> NaiveDateTime {
        day().and_hms_opt(23, 0, 0).unwrap()
    }

    fn write_logs(dir: &TempDir, loading: &str, power: &str) -> LogPaths {
        let paths = LogPaths::in_dir(dir.path());
        fs::write(&paths.loading, loading).unwrap();
        fs::write(&paths.power, power).unwrap();
        paths
    }

    fn scan(paths: &LogPaths) -> SessionAnchor {
        find_anchor_at(paths, &AnchorConfig::default(), &TailConfig::default(), now()).unwrap()
    }

    #[test]
    fn test_later_marker_wins() {
        let dir = TempDir::new().unwrap();
        let paths = write_logs(
            &dir,
            "D 10:00:00.000 LoadingScreen.OnSceneLoaded() Gameplay.Start\n",
            "D 09:00:00.000 GameState.DebugPrintPower() - CREATE_GAME\n\
             D 09:30:00.000 GameState.DebugPrintPower() - TAG_CHANGE Entity=5 tag=ZONE value=HAND\n",
        );

        let anchor = scan(&paths);
        assert_eq!(anchor.cutoff, day().and_hms_opt(10, 0, 0).unwrap());
        assert_eq!(
            anchor.power.marker,
            Some(day().and_hms_opt(9, 0, 0).unwrap())
        );
        assert!(!anchor.admits(day().and_hms_opt(9, 59, 59).unwrap()));
        assert!(anchor.admits(anchor.cutoff));
    }

    #[test]
    fn test_last_marker_in_file_is_used() {
        let dir = TempDir::new().unwrap();
        let paths = write_logs(
            &dir,
            "D 08:00:00.000 Gameplay.Start\nD 08:30:00.000 other\nD 09:00:00.000 Gameplay.Start\n",
            "",
        );

        let anchor = scan(&paths);
        assert_eq!(anchor.cutoff, day().and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(anchor.power.marker, None);
    }

    #[test]
    fn test_no_markers_fails_open() {
        let dir = TempDir::new().unwrap();
        let paths = write_logs(&dir, "D 08:00:00.000 hello\n", "D 08:00:01.000 world\n");

        let anchor = scan(&paths);
        assert!(anchor.is_open());
        assert!(anchor.admits(day().and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let paths = LogPaths::in_dir(dir.path());
        fs::write(&paths.loading, "").unwrap();

        let result = find_anchor_at(
            &paths,
            &AnchorConfig::default(),
            &TailConfig::default(),
            now(),
        );
        assert!(matches!(result, Err(Error::LogFileNotFound(p)) if p == paths.power));
    }

    #[test]
    fn test_scan_window_is_bounded() {
        let dir = TempDir::new().unwrap();
        let old = "D 07:00:00.000 Gameplay.Start\n";
        let filler = "D 07:30:00.000 filler line padding\n".repeat(10);
        let paths = write_logs(&dir, &format!("{old}{filler}"), "");

        let config = AnchorConfig {
            max_scan_bytes: filler.len() as u64,
            ..AnchorConfig::default()
        };
        let anchor =
            find_anchor_at(&paths, &config, &TailConfig::default(), now()).unwrap();

        assert_eq!(anchor.loading.window_start, old.len() as u64);
        assert!(anchor.is_open());
    }

    #[test]
    fn test_marker_at_window_start_is_found() {
        let dir = TempDir::new().unwrap();
        let filler = "D 07:00:00.000 filler\n";
        let marker = "D 08:00:00.000 Gameplay.Start\n";
        let paths = write_logs(&dir, &format!("{filler}{marker}"), "");

        let config = AnchorConfig {
            max_scan_bytes: marker.len() as u64,
            ..AnchorConfig::default()
        };
        let anchor =
            find_anchor_at(&paths, &config, &TailConfig::default(), now()).unwrap();

        assert_eq!(anchor.loading.window_start, filler.len() as u64);
        assert_eq!(
            anchor.loading.marker,
            Some(day().and_hms_opt(8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_history_before_later_marker_is_not_replayed() {
        let dir = TempDir::new().unwrap();
        let paths = write_logs(
            &dir,
            "D 08:00:00.000 Gameplay.Start\n\
             D 08:45:00.000 LoadingScreen old menu\n\
             D 09:00:00.000 Gameplay.Start\n\
             D 09:20:00.000 LoadingScreen current\n",
            "D 08:00:00.000 GameState.DebugPrintPower() - CREATE_GAME\n\
             D 08:30:00.000 GameState.DebugPrintPower() - old game\n\
             D 08:59:59.999 GameState.DebugPrintPower() - just before\n\
             D 09:00:00.000 GameState.DebugPrintPower() - at cutoff\n\
             D 09:10:00.000 GameState.DebugPrintPower() - current game\n",
        );

        let anchor = scan(&paths);
        assert_eq!(anchor.power.marker, Some(day().and_hms_opt(8, 0, 0).unwrap()));
        assert_eq!(anchor.cutoff, day().and_hms_opt(9, 0, 0).unwrap());

        let mut merge = MergeScheduler::new(&paths, &anchor, &TailConfig::default());
        let raw: Vec<_> = merge.poll().into_iter().map(|l| l.raw).collect();
        assert_eq!(
            raw,
            vec![
                "D 09:00:00.000 Gameplay.Start",
                "D 09:00:00.000 GameState.DebugPrintPower() - at cutoff",
                "D 09:10:00.000 GameState.DebugPrintPower() - current game",
                "D 09:20:00.000 LoadingScreen current",
            ]
        );
    }

    #[test]
    fn test_chain_past_reference_moves_to_previous_day() {
        let dir = TempDir::new().unwrap();
        let paths = write_logs(
            &dir,
            "D 23:50:00.000 Gameplay.Start\nD 00:05:00.000 still playing\n",
            "",
        );

        // Just after midnight: the marker belongs to yesterday.
        let early = day().and_hms_opt(0, 10, 0).unwrap();
        let anchor = find_anchor_at(
            &paths,
            &AnchorConfig::default(),
            &TailConfig::default(),
            early,
        )
        .unwrap();

        let yesterday = day().pred_opt().unwrap();
        assert_eq!(anchor.loading.base_date, yesterday);
        assert_eq!(anchor.cutoff, yesterday.and_hms_opt(23, 50, 0).unwrap());
    }
}
