//! Run the pipeline in the foreground and print events.

use deckwatch::{Error, LogPipeline, PipelineEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::SourceArgs;

/// Options for `deckwatch watch`.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub sources: SourceArgs,
    pub controller: Option<u32>,
    pub json: bool,
}

/// Run until Ctrl+C.
pub fn run(opts: WatchOptions) -> Result<(), Error> {
    let mut config = opts.sources.load_config()?;
    if opts.controller.is_some() {
        config.zones.controller_id = opts.controller;
    }
    let paths = opts.sources.resolve_paths(&config)?;
    let tracked_zone = config.zones.tracked_zone.clone();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = LogPipeline::new(paths, config);
        pipeline.start(tx).await?;

        if let Some(anchor) = pipeline.anchor() {
            if anchor.is_open() {
                info!("No session marker found, reading from the scan window start");
            } else {
                info!(cutoff = %anchor.cutoff, "Resuming current session");
            }
        }

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => print_event(&event, &tracked_zone, opts.json)?,
                    None => break,
                },
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "Failed to listen for Ctrl+C");
                    }
                    break;
                }
            }
        }

        pipeline.stop().await;
        // Events raised by the last batch before the loop stopped.
        while let Ok(event) = rx.try_recv() {
            print_event(&event, &tracked_zone, opts.json)?;
        }
        Ok(())
    })
}

fn print_event(event: &PipelineEvent, tracked_zone: &str, json: bool) -> Result<(), Error> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{}", describe(event, tracked_zone));
    }
    Ok(())
}

fn describe(event: &PipelineEvent, tracked_zone: &str) -> String {
    match event {
        PipelineEvent::SessionStarted { at } => format!("== session started {at}"),
        PipelineEvent::EntityAddedToZone { card_id, entity_id } => {
            format!("+ {card_id} (entity {entity_id}) entered {tracked_zone}")
        }
        PipelineEvent::EntityRemovedFromZone { card_id, entity_id } => {
            format!("- {card_id} (entity {entity_id}) left {tracked_zone}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_events() {
        let removed = PipelineEvent::EntityRemovedFromZone {
            card_id: "CS2_029".to_string(),
            entity_id: 12,
        };
        assert_eq!(describe(&removed, "DECK"), "- CS2_029 (entity 12) left DECK");

        let added = PipelineEvent::EntityAddedToZone {
            card_id: "CS2_029".to_string(),
            entity_id: 12,
        };
        assert_eq!(describe(&added, "DECK"), "+ CS2_029 (entity 12) entered DECK");
    }
}
