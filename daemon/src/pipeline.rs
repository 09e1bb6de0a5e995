//! Log pipeline: wires tailing, session detection and zone tracking together.
//!
//! LoadingScreen.log lines go to the [`SessionTracker`]; a session start
//! resets the [`ZoneTracker`], which consumes Power.log lines. Everything
//! runs on the poll task, and events are handed to an [`EventSink`]
//! synchronously.

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::paths::LogPaths;
use crate::watcher::{
    find_anchor, LogLine, LogSource, MergeScheduler, SessionAnchor, SessionTracker, WatchHandle,
    ZoneEvent, ZoneTracker, ZoneTransition,
};

/// Events raised to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    SessionStarted { at: NaiveDateTime },
    EntityAddedToZone { card_id: String, entity_id: u32 },
    EntityRemovedFromZone { card_id: String, entity_id: u32 },
}

impl From<ZoneEvent> for PipelineEvent {
    fn from(event: ZoneEvent) -> Self {
        let ZoneEvent {
            transition,
            card_id,
            entity_id,
        } = event;
        match transition {
            ZoneTransition::Added => Self::EntityAddedToZone { card_id, entity_id },
            ZoneTransition::Removed => Self::EntityRemovedFromZone { card_id, entity_id },
        }
    }
}

/// Receiver of pipeline events.
///
/// Called on the poll task; a sink that needs another thread must hand the
/// event over itself.
pub trait EventSink: Send + 'static {
    fn dispatch(&mut self, event: PipelineEvent);
}

impl<F> EventSink for F
where
    F: FnMut(PipelineEvent) + Send + 'static,
{
    fn dispatch(&mut self, event: PipelineEvent) {
        self(event)
    }
}

impl EventSink for mpsc::UnboundedSender<PipelineEvent> {
    fn dispatch(&mut self, event: PipelineEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Routes merged lines to the parsers. Owned by the poll task.
pub struct LineRouter<S> {
    session: SessionTracker,
    zones: ZoneTracker,
    sink: S,
}

impl<S: EventSink> LineRouter<S> {
    pub fn new(config: &Config, sink: S) -> Self {
        Self {
            session: SessionTracker::new(config.session.start_marker.clone()),
            zones: ZoneTracker::new(config.zones.clone()),
            sink,
        }
    }

    pub fn route_batch(&mut self, batch: Vec<LogLine>) {
        for line in batch {
            self.route(line);
        }
    }

    pub fn route(&mut self, line: LogLine) {
        match line.source {
            LogSource::LoadingScreen => {
                if let Some(at) = self.session.feed(line.timestamp, &line.raw) {
                    self.zones.reset();
                    info!(%at, "Session started");
                    self.sink.dispatch(PipelineEvent::SessionStarted { at });
                }
            }
            LogSource::Power => {
                if line.reset {
                    // Entity ids from before the rotation mean nothing now.
                    self.zones.reset();
                }
                for event in self.zones.feed_line(&line.raw) {
                    self.sink.dispatch(event.into());
                }
            }
        }
    }

    pub fn zones(&self) -> &ZoneTracker {
        &self.zones
    }
}

/// Lifecycle of a [`LogPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
}

/// Tails both logs and raises [`PipelineEvent`]s.
pub struct LogPipeline {
    paths: LogPaths,
    config: Config,
    state: PipelineState,
    handle: Option<WatchHandle>,
    anchor: Option<SessionAnchor>,
}

impl LogPipeline {
    pub fn new(paths: LogPaths, config: Config) -> Self {
        Self {
            paths,
            config,
            state: PipelineState::Idle,
            handle: None,
            anchor: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Running
    }

    /// Anchor computed by the last `start`.
    pub fn anchor(&self) -> Option<&SessionAnchor> {
        self.anchor.as_ref()
    }

    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    /// Compute the session anchor and start polling.
    ///
    /// Fails if either log file is missing. Starting a running pipeline does nothing.
    pub async fn start<S: EventSink>(&mut self, sink: S) -> Result<(), Error> {
        if self.state != PipelineState::Idle {
            warn!(state = ?self.state, "Pipeline already started");
            return Ok(());
        }

        self.config.validate()?;
        self.paths.ensure_exist()?;

        let anchor = find_anchor(&self.paths, &self.config.anchor, &self.config.tail)?;
        let scheduler = MergeScheduler::new(&self.paths, &anchor, &self.config.tail);

        let mut router = LineRouter::new(&self.config, sink);
        let handle = scheduler.spawn(self.config.watch.poll_interval(), move |batch| {
            router.route_batch(batch)
        });

        info!(
            power = %self.paths.power.display(),
            loading = %self.paths.loading.display(),
            "Log pipeline started"
        );
        self.anchor = Some(anchor);
        self.handle = Some(handle);
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Stop polling. Returns once no further events can be delivered.
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.state = PipelineState::Stopping;
        handle.stop().await;
        self.state = PipelineState::Idle;
        info!("Log pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn line(source: LogSource, ts: NaiveDateTime, raw: &str) -> LogLine {
        LogLine {
            source,
            timestamp: ts,
            raw: raw.to_string(),
            reset: false,
        }
    }

    fn router() -> (LineRouter<impl EventSink>, std::sync::mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = move |event: PipelineEvent| {
            let _ = tx.send(event);
        };
        (LineRouter::new(&Config::default(), sink), rx)
    }

    const CREATE: &str = "D 10:00:00.000 GameState.DebugPrintPower() - FULL_ENTITY - Creating ID=5 CardID=CS2_029";
    const IN_DECK: &str = "D 10:00:00.000 GameState.DebugPrintPower() -     tag=ZONE value=DECK";
    const DRAW: &str = "D 10:01:00.000 GameState.DebugPrintPower() - TAG_CHANGE Entity=5 tag=ZONE value=HAND";

    #[test]
    fn test_power_lines_raise_zone_events() {
        let (mut router, rx) = router();
        router.route_batch(vec![
            line(LogSource::Power, at(10, 0), CREATE),
            line(LogSource::Power, at(10, 0), IN_DECK),
            line(LogSource::Power, at(10, 1), DRAW),
        ]);

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![PipelineEvent::EntityRemovedFromZone {
                card_id: "CS2_029".to_string(),
                entity_id: 5
            }]
        );
    }

    #[test]
    fn test_session_start_resets_zone_state() {
        let (mut router, rx) = router();
        router.route(line(LogSource::Power, at(10, 0), CREATE));
        router.route(line(LogSource::Power, at(10, 0), IN_DECK));
        router.route(line(
            LogSource::LoadingScreen,
            at(10, 0),
            "D 10:00:30.000 LoadingScreen Gameplay.Start",
        ));
        router.route(line(LogSource::Power, at(10, 1), DRAW));

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![PipelineEvent::SessionStarted { at: at(10, 0) }]
        );
        assert!(router.zones().entity(5).unwrap().card_id.is_none());
    }

    #[test]
    fn test_rotated_power_log_resets_zone_state() {
        let (mut router, rx) = router();
        router.route(line(LogSource::Power, at(10, 0), CREATE));
        router.route(line(LogSource::Power, at(10, 0), IN_DECK));

        let mut rotated = line(LogSource::Power, at(10, 1), DRAW);
        rotated.reset = true;
        router.route(rotated);

        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let event = PipelineEvent::EntityAddedToZone {
            card_id: "EX1_001".to_string(),
            entity_id: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "entity_added_to_zone");
        assert_eq!(json["card_id"], "EX1_001");
        assert_eq!(json["entity_id"], 3);
    }

    #[tokio::test]
    async fn test_start_fails_when_logs_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut pipeline = LogPipeline::new(LogPaths::in_dir(dir.path()), Config::default());

        let result = pipeline.start(|_event: PipelineEvent| {}).await;
        assert!(matches!(result, Err(Error::LogFileNotFound(_))));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
