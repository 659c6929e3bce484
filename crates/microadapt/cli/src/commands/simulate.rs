//! `microadapt simulate`

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use microadapt_engine::{Lifecycle, MicroAdaptEngine};
use tracing::info;

use super::{save_snapshot, write_json_line, ForecastLine};
use crate::config_file::EngineArgs;
use crate::workload::SignalGenerator;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of points to generate
    #[arg(long, default_value_t = 2000)]
    pub points: usize,

    /// Dimension of every point
    #[arg(long, default_value_t = 1)]
    pub dim: usize,

    /// RNG seed for the synthetic noise
    #[arg(long, env = "MICROADAPT_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Forecast horizon
    #[arg(long, default_value_t = 8)]
    pub horizon: usize,

    /// Emit a forecast every N points once warm
    #[arg(long, default_value_t = 250)]
    pub report_every: usize,

    /// Points per synthetic regime
    #[arg(long, default_value_t = 300)]
    pub segment: usize,

    /// Uniform noise amplitude
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Write the final engine snapshot here
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

pub fn execute<W: Write>(args: &SimulateArgs, out: &mut W) -> anyhow::Result<()> {
    anyhow::ensure!(args.dim > 0, "--dim must be positive");
    anyhow::ensure!(args.report_every > 0, "--report-every must be positive");

    let config = args.engine.resolve()?;
    let mut engine = MicroAdaptEngine::new(config).context("building engine")?;
    let mut signal = SignalGenerator::new(args.seed, args.dim, args.segment, args.noise);
    info!(
        points = args.points,
        dim = args.dim,
        seed = args.seed,
        "starting simulation"
    );

    for _ in 0..args.points {
        let point = signal.next_point();
        engine.update(&point).context("engine update")?;

        let t = engine.state().current_time;
        if engine.lifecycle() == Lifecycle::Warm && t % args.report_every as u64 == 0 {
            let result = engine.forecast(args.horizon).context("forecast")?;
            let mut line = ForecastLine::new(t, &result);
            line.regime = Some(signal.regime().name());
            write_json_line(out, &line)?;
        }
    }

    let stats = engine.get_statistics();
    info!(
        units = stats.num_model_units,
        transitions = stats.regime_transitions,
        degraded = stats.degraded_fits,
        "simulation finished"
    );
    write_json_line(out, &serde_json::json!({ "statistics": stats }))?;

    if let Some(path) = &args.snapshot_out {
        save_snapshot(&engine, path)?;
    }
    Ok(())
}
