//! Print the session anchor the pipeline would start from.

use deckwatch::watcher::{find_anchor, SourceAnchor};
use deckwatch::Error;

use crate::cli::SourceArgs;

pub fn run(sources: SourceArgs) -> Result<(), Error> {
    let config = sources.load_config()?;
    let paths = sources.resolve_paths(&config)?;
    paths.ensure_exist()?;

    let anchor = find_anchor(&paths, &config.anchor, &config.tail)?;

    println!("Session anchor");
    if anchor.is_open() {
        println!("  Cutoff: none (no session marker in scan window)");
    } else {
        println!("  Cutoff: {}", anchor.cutoff);
    }
    print_source("Power", &paths.power.display().to_string(), &anchor.power);
    print_source(
        "LoadingScreen",
        &paths.loading.display().to_string(),
        &anchor.loading,
    );

    Ok(())
}

fn print_source(name: &str, path: &str, source: &SourceAnchor) {
    println!("  {name}: {path}");
    match source.marker {
        Some(marker) => println!("    Marker: {marker}"),
        None => println!("    Marker: not found"),
    }
    println!("    Scan from byte: {}", source.window_start);
    println!("    Base date: {}", source.base_date);
}
