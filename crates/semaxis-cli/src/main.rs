//! Semaxis CLI
//!
//! Turns a CSV of short texts plus their embeddings into semantic axes and a
//! cluster assignment that stays comparable across runs.
//!
//! # Modes
//!
//! - first run: explore candidates and create baseline `v001`
//! - `--show-candidates`: first run that only writes the candidate tables
//! - later runs: lock to the latest baseline (default)
//! - `--unlock`: add clusters for novel rows and save a new baseline version
//!
//! Exit codes: 0 success, 2 configuration error, 1 any other failure.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;
mod export;
mod input;

pub use error::{exit_code_for_error, CliExitCode};

use commands::run::{handle_run, RunArgs};

/// Semaxis - semantic axes with a versioned cluster baseline
#[derive(Parser)]
#[command(name = "semaxis")]
#[command(version)]
#[command(about = "Semantic axes and stable clusters for short texts")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    run: RunArgs,
}

fn init_logging(verbose: u8, configured_level: &str, include_target: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_level)),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(include_target)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = cli.run.load_config();
    let (level, include_target) = config
        .as_ref()
        .map(|c| (c.logging.level.clone(), c.logging.include_target))
        .unwrap_or_else(|_| ("info".to_string(), true));
    init_logging(cli.verbose, &level, include_target);

    let result = config.and_then(|config| {
        let cwd = std::env::current_dir()?;
        handle_run(&cli.run, config, &cwd)
    });

    let code = match result {
        Ok(dir) => {
            println!("{}", dir.display());
            CliExitCode::Success
        }
        Err(e) => {
            error!(target: "semaxis::cli", "{:#}", e);
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code.into());
}
