//! MicroAdapt CLI - drive the adaptive forecaster from the terminal
//!
//! - `simulate`: run the engine over a seeded synthetic regime-switching stream
//! - `replay`: feed recorded rows from a file or stdin and emit JSON forecasts
//! - `inspect`: summarize a persisted engine snapshot

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
pub mod config_file;
pub mod input;
pub mod workload;

use commands::{inspect, replay, simulate};

/// MicroAdapt CLI application
#[derive(Parser)]
#[command(name = "microadapt")]
#[command(about = "MicroAdapt Edge - adaptive streaming forecaster", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine over a synthetic sine → cosine → ramp stream
    Simulate(simulate::SimulateArgs),

    /// Replay numeric rows from a file (or `-` for stdin)
    Replay(replay::ReplayArgs),

    /// Print metadata and statistics of a saved snapshot
    Inspect(inspect::InspectArgs),
}

/// Run using the current process arguments.
pub fn run() -> anyhow::Result<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "info" };
    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Simulate(args) => simulate::execute(&args, &mut out),
        Commands::Replay(args) => replay::execute(&args, &mut out),
        Commands::Inspect(args) => inspect::execute(&args, &mut out),
    }
}
