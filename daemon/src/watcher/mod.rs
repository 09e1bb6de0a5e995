//! Log tailing and parsing.

pub mod anchor;
pub mod merge;
pub mod session_tracker;
pub mod tailer;
pub mod timestamp;
pub mod zone_tracker;

pub use anchor::{find_anchor, find_anchor_at, SessionAnchor, SourceAnchor};
pub use merge::{LogLine, LogSource, MergeScheduler, WatchHandle};
pub use session_tracker::SessionTracker;
pub use tailer::LineTailer;
pub use timestamp::{parse_timestamp, SourceClock};
pub use zone_tracker::{EntityRecord, ZoneEvent, ZoneTracker, ZoneTransition};
