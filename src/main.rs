use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tidyfold::cli::{OrganizeCommand, run_cli_with_config};
use tidyfold::logging::init_logging;
use tidyfold::output::OutputFormatter;
use tidyfold::watch::DEFAULT_SETTLE_DELAY;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Sort a directory into category folders, watch it for new files, and undo the last run",
    long_about = None
)]
struct Args {
    /// Directory to organize
    dir: PathBuf,

    /// Report what would happen without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Keep running and organize files as they arrive
    #[arg(long, conflicts_with = "undo")]
    watch: bool,

    /// Reverse the most recent organize session
    #[arg(long)]
    undo: bool,

    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Milliseconds a new file must sit before it is moved in watch mode
    #[arg(long, value_name = "N", requires = "watch")]
    settle_ms: Option<u64>,
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let command = if args.undo {
        OrganizeCommand::Undo {
            dry_run: args.dry_run,
        }
    } else if args.watch {
        OrganizeCommand::Watch {
            dry_run: args.dry_run,
            settle_delay: args
                .settle_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SETTLE_DELAY),
        }
    } else {
        OrganizeCommand::Organize {
            dry_run: args.dry_run,
        }
    };

    match run_cli_with_config(command, &args.dir, args.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
