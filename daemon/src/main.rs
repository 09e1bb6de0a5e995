//! deckwatch - follow the game's logs and report deck changes as they happen.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deckwatch::Error;

mod cli;

use cli::SourceArgs;

#[derive(Parser)]
#[command(name = "deckwatch")]
#[command(about = "Live deck tracker for Hearthstone log files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the logs and print deck events until Ctrl+C
    Watch {
        #[command(flatten)]
        sources: SourceArgs,

        /// Only report cards controlled by this player id
        #[arg(long, value_name = "ID")]
        controller: Option<u32>,

        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },

    /// Show where the current session starts in each log
    Anchor {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Show resolved log paths and config
    Status {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

fn main() -> Result<(), Error> {
    // Logs go to stderr so --json output stays clean.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("deckwatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Watch {
            sources,
            controller,
            json,
        }) => {
            cli::watch::run(cli::watch::WatchOptions {
                sources,
                controller,
                json,
            })?;
        }
        Some(Commands::Anchor { sources }) => {
            cli::anchor::run(sources)?;
        }
        Some(Commands::Status { sources }) => {
            let exit_code = cli::status::run(sources)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
