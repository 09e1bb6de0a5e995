//! Chronological merge of both logs.
//!
//! Each poll reads new lines from both tailers, timestamps them with the
//! source's own clock, drops anything older than the session anchor and
//! hands one time-ordered batch to the consumer.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::config::TailConfig;
use crate::paths::LogPaths;
use crate::watcher::anchor::{SessionAnchor, SourceAnchor};
use crate::watcher::tailer::LineTailer;
use crate::watcher::timestamp::SourceClock;

/// Which log a line came from. Declaration order breaks timestamp ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSource {
    LoadingScreen,
    Power,
}

/// One timestamped line from either source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub source: LogSource,
    pub timestamp: NaiveDateTime,
    pub raw: String,
    /// First line after the source's file was truncated, rotated or recreated.
    pub reset: bool,
}

/// Tailer plus rollover clock for one file.
#[derive(Debug)]
struct SourceReader {
    source: LogSource,
    tailer: LineTailer,
    clock: SourceClock,
    /// A reset not yet attached to an emitted line.
    pending_reset: bool,
}

impl SourceReader {
    fn new(source: LogSource, tailer: LineTailer, anchor: &SourceAnchor) -> Self {
        Self {
            source,
            tailer: tailer.starting_at(anchor.window_start),
            clock: SourceClock::new(anchor.base_date),
            pending_reset: false,
        }
    }

    /// Read, stamp and filter new lines, appending them to `out`.
    fn read_into(&mut self, cutoff: NaiveDateTime, out: &mut Vec<LogLine>) {
        let raw_lines = self.tailer.read_new_lines();
        let mut reset = self.tailer.take_reset() || self.pending_reset;

        for raw in raw_lines {
            let Some(timestamp) = self.clock.stamp(&raw) else {
                trace!(source = ?self.source, "Skipping line without timestamp");
                continue;
            };
            if timestamp < cutoff {
                continue;
            }
            out.push(LogLine {
                source: self.source,
                timestamp,
                raw,
                reset: std::mem::take(&mut reset),
            });
        }

        self.pending_reset = reset;
    }
}

/// Polls both logs and merges them by time.
#[derive(Debug)]
pub struct MergeScheduler {
    loading: SourceReader,
    power: SourceReader,
    cutoff: NaiveDateTime,
}

impl MergeScheduler {
    pub fn new(paths: &LogPaths, anchor: &SessionAnchor, tail: &TailConfig) -> Self {
        Self {
            loading: SourceReader::new(
                LogSource::LoadingScreen,
                LineTailer::new(&paths.loading, tail.clone()),
                &anchor.loading,
            ),
            power: SourceReader::new(
                LogSource::Power,
                LineTailer::new(&paths.power, tail.clone()),
                &anchor.power,
            ),
            cutoff: anchor.cutoff,
        }
    }

    /// One poll: new lines from both files, ordered by timestamp.
    ///
    /// The sort is stable and sources are read in [`LogSource`] order, so
    /// ties keep source-then-arrival order.
    pub fn poll(&mut self) -> Vec<LogLine> {
        let mut batch = Vec::new();
        self.loading.read_into(self.cutoff, &mut batch);
        self.power.read_into(self.cutoff, &mut batch);
        batch.sort_by_key(|line| line.timestamp);
        batch
    }

    /// Run the poll loop on a background task, calling `on_batch` for every
    /// non-empty batch.
    ///
    /// File reads and `on_batch` run on the blocking pool, one iteration at a
    /// time, so a slow consumer never stalls the runtime's workers.
    pub fn spawn<F>(self, interval: Duration, on_batch: F) -> WatchHandle
    where
        F: FnMut(Vec<LogLine>) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Log watch loop started");
            let mut polls: u64 = 0;
            let mut worker = (self, on_batch);

            while !*shutdown_rx.borrow() {
                polls += 1;
                let iteration = tokio::task::spawn_blocking(move || {
                    let (mut merge, mut on_batch) = worker;
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        let batch = merge.poll();
                        if !batch.is_empty() {
                            debug!(lines = batch.len(), "Dispatching merged batch");
                            on_batch(batch);
                        }
                    }));
                    (merge, on_batch, outcome.is_ok())
                })
                .await;

                worker = match iteration {
                    Ok((merge, on_batch, completed)) => {
                        if !completed {
                            error!(poll = polls, "Poll iteration panicked, continuing");
                        }
                        (merge, on_batch)
                    }
                    Err(e) => {
                        error!(error = %e, "Poll worker lost, stopping");
                        break;
                    }
                };

                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // Handle dropped without stop().
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            info!(polls, "Log watch loop stopped");
        });

        WatchHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop polling and wait for the in-flight iteration. No batch is
    /// delivered after this returns.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Log watch task failed");
        }
    }
}
