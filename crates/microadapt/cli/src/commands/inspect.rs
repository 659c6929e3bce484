//! `microadapt inspect`

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use microadapt_engine::{
    EngineConfig, EngineSnapshot, EngineStatsSnapshot, MicroAdaptEngine, ModelUnitId,
};
use serde::Serialize;

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Snapshot file written by `simulate` or `replay`
    #[arg(long)]
    pub snapshot: PathBuf,
}

#[derive(Debug, Serialize)]
struct UnitSummary {
    id: ModelUnitId,
    hit_count: u64,
    created_at: u64,
    last_used_time: u64,
    models: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    schema_version: u32,
    captured_at: String,
    config: EngineConfig,
    statistics: EngineStatsSnapshot,
    units: Vec<UnitSummary>,
}

pub fn execute<W: Write>(args: &InspectArgs, out: &mut W) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let snapshot = EngineSnapshot::from_json(&json)
        .with_context(|| format!("decoding snapshot {}", args.snapshot.display()))?;

    let schema_version = snapshot.schema_version;
    let captured_at = snapshot.captured_at.to_rfc3339();
    let engine = MicroAdaptEngine::restore(snapshot).context("snapshot is inconsistent")?;

    let units = engine
        .model_units()
        .into_iter()
        .map(|u| UnitSummary {
            id: u.id,
            hit_count: u.hit_count,
            created_at: u.created_at,
            last_used_time: u.last_used_time,
            models: u.dynamics.dims().iter().map(|d| d.kind.name()).collect(),
        })
        .collect();

    let report = InspectReport {
        schema_version,
        captured_at,
        config: engine.config().clone(),
        statistics: engine.get_statistics(),
        units,
    };
    serde_json::to_writer_pretty(&mut *out, &report).context("encoding report")?;
    writeln!(out)?;
    Ok(())
}
