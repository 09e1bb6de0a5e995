//! Show where the logs are and which config is active.

use std::path::Path;

use deckwatch::Error;

use crate::cli::SourceArgs;

/// Exit codes for status command.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const LOGS_NOT_FOUND: i32 = 1;
}

/// Run the status command.
pub fn run(sources: SourceArgs) -> Result<i32, Error> {
    let config = sources.load_config()?;

    println!("deckwatch status");
    println!("  Config: {}", sources.config_source());
    println!(
        "  Controller filter: {}",
        config
            .zones
            .controller_id
            .map_or_else(|| "off".to_string(), |id| format!("player {id}"))
    );

    let paths = match sources.resolve_paths(&config) {
        Ok(paths) => paths,
        Err(Error::LogDirNotFound) => {
            println!("  Logs: not found");
            println!();
            println!("Pass --log-dir or set [logs] dir in the config file.");
            return Ok(exit_code::LOGS_NOT_FOUND);
        }
        Err(e) => return Err(e),
    };

    let power = print_file("Power.log", &paths.power);
    let loading = print_file("LoadingScreen.log", &paths.loading);
    if !(power && loading) {
        println!();
        println!("Enable game logging or check the paths above.");
        return Ok(exit_code::LOGS_NOT_FOUND);
    }

    Ok(exit_code::OK)
}

/// Print one file line; returns whether the file exists.
fn print_file(label: &str, path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => {
            println!("  {label}: {} ({})", path.display(), human_size(meta.len()));
            true
        }
        Err(_) => {
            println!("  {label}: {} (missing)", path.display());
            false
        }
    }
}

fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    }
}
