//! Command implementations

pub mod inspect;
pub mod replay;
pub mod simulate;

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use microadapt_engine::{
    ForecastResult, JsonFileSnapshotStore, MicroAdaptEngine, ModelUnitId, SnapshotStore,
};
use serde::Serialize;

/// One JSON line of forecast output.
#[derive(Debug, Serialize)]
pub struct ForecastLine<'a> {
    pub t: u64,
    pub unit: ModelUnitId,
    pub horizon: usize,
    pub forecast: &'a [Vec<f64>],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<&'a [Vec<f64>]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<&'a [Vec<f64>]>,
    pub clamped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regime: Option<&'a str>,
}

impl<'a> ForecastLine<'a> {
    pub fn new(t: u64, result: &'a ForecastResult) -> Self {
        Self {
            t,
            unit: result.model_unit_id,
            horizon: result.forecast_horizon,
            forecast: &result.forecast_values,
            lower: result.uncertainty.as_ref().map(|b| b.lower.as_slice()),
            upper: result.uncertainty.as_ref().map(|b| b.upper.as_slice()),
            clamped: result.clamped,
            regime: None,
        }
    }
}

pub(crate) fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value).context("encoding output")?;
    writeln!(out).context("writing output")?;
    Ok(())
}

pub(crate) fn save_snapshot(engine: &MicroAdaptEngine, path: &Path) -> anyhow::Result<()> {
    JsonFileSnapshotStore::new(path)
        .save(&engine.snapshot())
        .with_context(|| format!("saving snapshot to {}", path.display()))?;
    tracing::info!(path = %path.display(), "snapshot saved");
    Ok(())
}

pub(crate) fn load_engine(path: &Path) -> anyhow::Result<MicroAdaptEngine> {
    let snapshot = JsonFileSnapshotStore::new(path)
        .load()
        .with_context(|| format!("loading snapshot {}", path.display()))?
        .with_context(|| format!("no snapshot at {}", path.display()))?;
    MicroAdaptEngine::restore(snapshot)
        .with_context(|| format!("restoring engine from {}", path.display()))
}
