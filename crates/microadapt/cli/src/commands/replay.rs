//! `microadapt replay`

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use microadapt_engine::{EngineError, Lifecycle, MicroAdaptEngine};
use tracing::{info, warn};

use super::{load_engine, save_snapshot, write_json_line, ForecastLine};
use crate::config_file::EngineArgs;
use crate::input;

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Input file with one observation per line, or `-` for stdin
    #[arg(long, short, default_value = "-")]
    pub input: String,

    /// Forecast horizon
    #[arg(long, default_value_t = 8)]
    pub horizon: usize,

    /// Emit a forecast every K points once warm
    #[arg(long, default_value_t = 1)]
    pub every: usize,

    /// Resume from this snapshot instead of a fresh engine
    #[arg(long)]
    pub snapshot_in: Option<PathBuf>,

    /// Write the final engine snapshot here
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Abort on the first malformed or rejected row instead of skipping it
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Counts reported at the end of a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub accepted: u64,
    pub skipped: u64,
    pub forecasts: u64,
}

pub fn execute<W: Write>(args: &ReplayArgs, out: &mut W) -> anyhow::Result<()> {
    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file =
            File::open(&args.input).with_context(|| format!("opening input {}", args.input))?;
        Box::new(BufReader::new(file))
    };
    replay_from(args, reader, out).map(|_| ())
}

/// Replay every row of `reader` through an engine.
pub fn replay_from<R: BufRead, W: Write>(
    args: &ReplayArgs,
    reader: R,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    anyhow::ensure!(args.every > 0, "--every must be positive");
    anyhow::ensure!(args.horizon > 0, "--horizon must be positive");

    let mut engine = match &args.snapshot_in {
        Some(path) => {
            if args.engine.config.is_some() {
                warn!("--config is ignored when resuming from a snapshot");
            }
            load_engine(path)?
        }
        None => MicroAdaptEngine::new(args.engine.resolve()?).context("building engine")?,
    };

    let mut summary = ReplaySummary::default();
    for row in input::rows(reader) {
        let (line_no, parsed) = row.context("reading input")?;
        let point = match parsed {
            Ok(point) => point,
            Err(e) if args.strict => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "skipping row");
                summary.skipped += 1;
                continue;
            }
        };

        match engine.update(&point) {
            Ok(()) => summary.accepted += 1,
            Err(e @ (EngineError::InvalidConfiguration(_) | EngineError::InvalidInput(_)))
                if !args.strict =>
            {
                warn!(line = line_no, error = %e, "row rejected by engine");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("line {}", line_no)),
        }

        let t = engine.state().current_time;
        if engine.lifecycle() == Lifecycle::Warm && t % args.every as u64 == 0 {
            let result = engine.forecast(args.horizon).context("forecast")?;
            write_json_line(out, &ForecastLine::new(t, &result))?;
            summary.forecasts += 1;
        }
    }

    info!(
        accepted = summary.accepted,
        skipped = summary.skipped,
        forecasts = summary.forecasts,
        units = engine.get_statistics().num_model_units,
        "replay finished"
    );
    if let Some(path) = &args.snapshot_out {
        save_snapshot(&engine, path)?;
    }
    Ok(summary)
}
