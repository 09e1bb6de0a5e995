//! deckwatch - live game-log tailer that reports cards entering and leaving the deck.
//!
//! Tails `Power.log` and `LoadingScreen.log`, merges them chronologically
//! from the start of the current session and raises [`PipelineEvent`]s.

pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
pub use paths::LogPaths;
pub use pipeline::{EventSink, LogPipeline, PipelineEvent, PipelineState};
