use serde::{Deserialize, Serialize};

/// Identifier of a model unit. Allocated monotonically, never reused by an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelUnitId(pub u64);

impl std::fmt::Display for ModelUnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Engine lifecycle. The COLD → WARM transition is one-way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifecycle {
    #[default]
    Cold,
    Warm,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cold => write!(f, "COLD"),
            Self::Warm => write!(f, "WARM"),
        }
    }
}

/// Lower/upper envelope around a forecast, same shape as the forecast values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyBand {
    pub lower: Vec<Vec<f64>>,
    pub upper: Vec<Vec<f64>>,
}

/// A multi-step forecast copied out of the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// `forecast_horizon` rows of `dim` values each.
    pub forecast_values: Vec<Vec<f64>>,
    pub forecast_horizon: usize,
    /// Regime whose local dynamics produced the forecast.
    pub model_unit_id: ModelUnitId,
    pub uncertainty: Option<UncertaintyBand>,
    /// True when at least one value hit the clamp bound.
    pub clamped: bool,
}

impl ForecastResult {
    /// Components per forecast row.
    pub fn dimension(&self) -> usize {
        self.forecast_values.first().map_or(0, Vec::len)
    }

    /// Values `h` steps ahead, 1-based.
    pub fn step(&self, h: usize) -> Option<&[f64]> {
        h.checked_sub(1)
            .and_then(|i| self.forecast_values.get(i))
            .map(Vec::as_slice)
    }
}

/// Copy of the level-0 window, rows in arrival order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowView {
    /// Row-major values, `rows * dim` long.
    pub values: Vec<f64>,
    pub rows: usize,
    pub dim: usize,
    /// Fewer than `base_window_length` points have arrived.
    pub cold: bool,
}

impl WindowView {
    /// Row `i`, oldest first.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.rows {
            return None;
        }
        Some(&self.values[i * self.dim..(i + 1) * self.dim])
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Immutable statistics snapshot returned by `get_statistics`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatsSnapshot {
    pub total_updates: u64,
    pub current_time: u64,
    pub num_model_units: usize,
    pub regime_transitions: u64,
    /// Raw points spanned by the retained multi-resolution history.
    pub data_stream_length: u64,
    pub degraded_fits: u64,
    pub lifecycle: Lifecycle,
    pub current_model_unit_id: Option<ModelUnitId>,
    pub units_created: u64,
    pub units_evicted: u64,
}
