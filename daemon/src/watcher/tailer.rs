//! Offset-based tailing of one append-only log file.
//!
//! Each call to [`LineTailer::read_new_lines`] returns the complete lines
//! appended since the previous call. An unterminated trailing fragment is
//! carried over to the next call. A shrinking file is treated as rotation
//! and read again from the start.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::TailConfig;
use crate::watcher::timestamp::has_line_header;

/// Incremental reader for a single log file.
#[derive(Debug)]
pub struct LineTailer {
    path: PathBuf,
    offset: u64,
    /// Size seen on the last successful read.
    last_size: Option<u64>,
    /// Bytes after the last newline.
    carry: Vec<u8>,
    /// Drop everything up to the first newline (started mid-file).
    skip_partial: bool,
    /// Set when offset was reset; cleared by [`LineTailer::take_reset`].
    reset: bool,
    config: TailConfig,
}

impl LineTailer {
    pub fn new(path: impl Into<PathBuf>, config: TailConfig) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            last_size: None,
            carry: Vec::new(),
            skip_partial: false,
            reset: false,
            config,
        }
    }

    /// Start reading at the first line that begins at or after `offset`.
    ///
    /// Reading starts one byte early and drops everything up to the first
    /// newline: an empty segment when `offset` is a line start, otherwise the
    /// tail of the line it cuts through.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.offset = offset.saturating_sub(1);
        self.skip_partial = offset > 0;
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Forget position and buffered data.
    pub fn reset_offset(&mut self) {
        self.offset = 0;
        self.last_size = None;
        self.carry.clear();
        self.skip_partial = false;
        self.reset = true;
    }

    /// Returns true once after each reset.
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset)
    }

    /// Read newly appended complete lines.
    ///
    /// Never fails: a missing file resets state and yields nothing, other I/O
    /// errors are logged and retried on the next call.
    pub fn read_new_lines(&mut self) -> Vec<String> {
        match self.try_read() {
            Ok(lines) => lines,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.offset > 0 || self.last_size.is_some() {
                    debug!(path = %self.path.display(), "Log file disappeared");
                    self.reset_offset();
                }
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read log file");
                Vec::new()
            }
        }
    }

    fn try_read(&mut self) -> io::Result<Vec<String>> {
        let mut file = open_shared(&self.path)?;
        let size = file.metadata()?.len();

        let shrunk = self.last_size.is_some_and(|last| size < last);
        if shrunk || self.offset > size {
            info!(
                path = %self.path.display(),
                size,
                offset = self.offset,
                "Log file truncated or rotated, reading from start"
            );
            self.reset_offset();
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk)?;
        self.offset += read as u64;
        self.last_size = Some(size.max(self.offset));

        if read == 0 {
            return Ok(Vec::new());
        }

        self.carry.extend_from_slice(&chunk);
        Ok(self.drain_lines())
    }

    /// Split complete lines out of the carry buffer.
    fn drain_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.carry.iter().rposition(|&b| b == b'\n') else {
            self.bound_carry();
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        let mut segments = complete.split(|&b| b == b'\n');
        if self.skip_partial {
            segments.next();
            self.skip_partial = false;
        }

        let lines = segments
            .filter_map(|segment| {
                let segment = segment.strip_suffix(b"\r").unwrap_or(segment);
                let line = String::from_utf8_lossy(segment);
                if line.trim().is_empty() || !has_line_header(&line) {
                    return None;
                }
                Some(line.into_owned())
            })
            .collect();

        self.bound_carry();
        lines
    }

    fn bound_carry(&mut self) {
        if self.carry.len() <= self.config.carry_limit_bytes {
            return;
        }
        let drop = self.carry.len() - self.config.carry_keep_bytes;
        warn!(
            path = %self.path.display(),
            dropped = drop,
            "Unterminated line exceeded carry limit, trimming"
        );
        self.carry.drain(..drop);
    }
}

/// Open read-only while the game keeps writing (and may delete) the file.
fn open_shared(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);

    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        const FILE_SHARE_READ: u32 = 0x1;
        const FILE_SHARE_WRITE: u32 = 0x2;
        const FILE_SHARE_DELETE: u32 = 0x4;
        options.share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE);
    }

    options.open(path)
}
