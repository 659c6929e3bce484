//! Engine configuration.
//!
//! Every tunable the engine uses is an explicit field here, including the
//! novelty threshold and eviction weights, so deployments never depend on
//! constants buried in the matcher.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Default ring-buffer capacity of every window level.
pub const DEFAULT_BASE_WINDOW_LENGTH: usize = 32;

/// Default number of hierarchical window levels.
pub const DEFAULT_HIERARCHICAL_LEVELS: usize = 4;

/// Default hard cap on the regime pool.
pub const DEFAULT_MAX_MODEL_UNITS: usize = 8;

/// Default normalized distance above which a snapshot opens a new regime.
pub const DEFAULT_NOVELTY_THRESHOLD: f64 = 0.5;

/// Default EMA rate for centroid updates.
pub const DEFAULT_CENTROID_LEARNING_RATE: f64 = 0.1;

/// Default clamp factor relative to the anchor window range.
pub const DEFAULT_CLAMP_RANGE_FACTOR: f64 = 2.0;

/// Default z-score for the uncertainty band (~95% under Gaussian residuals).
pub const DEFAULT_UNCERTAINTY_Z: f64 = 1.96;

/// Default cap on the forecast horizon accepted by a single call.
pub const DEFAULT_MAX_FORECAST_HORIZON: usize = 4096;

/// Upper bound on window depth; level `l` spans `base_window_length * 2^l` points.
pub const MAX_HIERARCHICAL_LEVELS: usize = 32;

// ── Distance ────────────────────────────────────────────────────────────

/// Distance between a window snapshot and a regime centroid.
///
/// All metrics are normalized by feature length (RMS, mean absolute, max
/// absolute) so `novelty_threshold` keeps its meaning across window sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceMetric {
    /// Distance between two equally sized feature vectors.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        if a.is_empty() {
            return 0.0;
        }
        let n = a.len() as f64;
        let diffs = a.iter().zip(b).map(|(x, y)| x - y);
        match self {
            Self::Euclidean => (diffs.map(|d| d * d).sum::<f64>() / n).sqrt(),
            Self::Manhattan => diffs.map(f64::abs).sum::<f64>() / n,
            Self::Chebyshev => diffs.map(f64::abs).fold(0.0, f64::max),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Euclidean => write!(f, "euclidean"),
            Self::Manhattan => write!(f, "manhattan"),
            Self::Chebyshev => write!(f, "chebyshev"),
        }
    }
}

// ── Eviction ────────────────────────────────────────────────────────────

/// Which unit leaves a full pool when a new regime must be admitted.
///
/// The unit with the smallest score is evicted; ties go to the lowest id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Lexicographic (`hit_count`, `last_used_time`).
    #[default]
    LeastFrequent,
    /// Lexicographic (`last_used_time`, `hit_count`).
    LeastRecent,
    /// `hit_weight * hit_count + recency_weight * last_used_time`.
    Weighted { hit_weight: f64, recency_weight: f64 },
}

// ── Local dynamics strategy ─────────────────────────────────────────────

/// Model family used by the local dynamics fitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// Fit every family per dimension and keep the best by information criterion.
    #[default]
    Auto,
    Constant,
    Linear,
    /// Second-order autoregression (discretized damped oscillator).
    Oscillator,
}

// ── Engine configuration ────────────────────────────────────────────────

/// Configuration for a [`MicroAdaptEngine`](crate::MicroAdaptEngine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of every window level; also the COLD→WARM threshold.
    pub base_window_length: usize,
    /// Number of window levels. Zero degrades to a single flat window.
    pub num_hierarchical_levels: usize,
    /// Hard cap on the regime pool.
    pub max_model_units: usize,
    /// Normalized distance above which a snapshot opens a new regime.
    pub novelty_threshold: f64,
    /// EMA rate applied to the matched centroid, in (0, 1].
    pub centroid_learning_rate: f64,
    pub distance_metric: DistanceMetric,
    pub eviction_policy: EvictionPolicy,
    pub fit_strategy: FitStrategy,
    /// Forecasts are clamped to `[min - f*span, max + f*span]` of the anchor window.
    pub clamp_range_factor: f64,
    /// z-score of the uncertainty band. `None` or `0` disables the band;
    /// TOML has no null, so TOML configs use `uncertainty_z = 0`.
    pub uncertainty_z: Option<f64>,
    /// Largest horizon a single forecast may request.
    pub max_forecast_horizon: usize,
    /// Fixed point dimension; `None` learns it from the first update.
    pub dimension: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_window_length: DEFAULT_BASE_WINDOW_LENGTH,
            num_hierarchical_levels: DEFAULT_HIERARCHICAL_LEVELS,
            max_model_units: DEFAULT_MAX_MODEL_UNITS,
            novelty_threshold: DEFAULT_NOVELTY_THRESHOLD,
            centroid_learning_rate: DEFAULT_CENTROID_LEARNING_RATE,
            distance_metric: DistanceMetric::default(),
            eviction_policy: EvictionPolicy::default(),
            fit_strategy: FitStrategy::default(),
            clamp_range_factor: DEFAULT_CLAMP_RANGE_FACTOR,
            uncertainty_z: Some(DEFAULT_UNCERTAINTY_Z),
            max_forecast_horizon: DEFAULT_MAX_FORECAST_HORIZON,
            dimension: None,
        }
    }
}

impl EngineConfig {
    /// Small footprint for constrained devices.
    pub fn edge() -> Self {
        Self {
            base_window_length: 16,
            num_hierarchical_levels: 3,
            max_model_units: 4,
            ..Self::default()
        }
    }

    /// Short windows and a generous pool, handy for interactive runs.
    pub fn demo() -> Self {
        Self {
            base_window_length: 24,
            num_hierarchical_levels: 4,
            max_model_units: 6,
            novelty_threshold: 0.35,
            ..Self::default()
        }
    }

    pub fn with_window_length(mut self, base_window_length: usize) -> Self {
        self.base_window_length = base_window_length;
        self
    }

    pub fn with_levels(mut self, levels: usize) -> Self {
        self.num_hierarchical_levels = levels;
        self
    }

    pub fn with_max_model_units(mut self, max_model_units: usize) -> Self {
        self.max_model_units = max_model_units;
        self
    }

    pub fn with_novelty_threshold(mut self, threshold: f64) -> Self {
        self.novelty_threshold = threshold;
        self
    }

    pub fn with_fit_strategy(mut self, strategy: FitStrategy) -> Self {
        self.fit_strategy = strategy;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_max_forecast_horizon(mut self, max_forecast_horizon: usize) -> Self {
        self.max_forecast_horizon = max_forecast_horizon;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Number of levels actually allocated (at least one).
    pub fn effective_levels(&self) -> usize {
        self.num_hierarchical_levels.max(1)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> EngineResult<()> {
        if self.base_window_length == 0 {
            return Err(invalid("base_window_length must be positive"));
        }
        if self.max_model_units == 0 {
            return Err(invalid("max_model_units must be positive"));
        }
        if self.num_hierarchical_levels > MAX_HIERARCHICAL_LEVELS {
            return Err(invalid(format!(
                "num_hierarchical_levels {} exceeds maximum {}",
                self.num_hierarchical_levels, MAX_HIERARCHICAL_LEVELS
            )));
        }
        if !self.novelty_threshold.is_finite() || self.novelty_threshold < 0.0 {
            return Err(invalid(format!(
                "novelty_threshold must be finite and non-negative, got {}",
                self.novelty_threshold
            )));
        }
        if !(self.centroid_learning_rate > 0.0 && self.centroid_learning_rate <= 1.0) {
            return Err(invalid(format!(
                "centroid_learning_rate must be in (0, 1], got {}",
                self.centroid_learning_rate
            )));
        }
        if !self.clamp_range_factor.is_finite() || self.clamp_range_factor <= 0.0 {
            return Err(invalid(format!(
                "clamp_range_factor must be finite and positive, got {}",
                self.clamp_range_factor
            )));
        }
        if let Some(z) = self.uncertainty_z {
            if !z.is_finite() || z < 0.0 {
                return Err(invalid(format!(
                    "uncertainty_z must be finite and non-negative, got {}",
                    z
                )));
            }
        }
        if self.max_forecast_horizon == 0 {
            return Err(invalid("max_forecast_horizon must be positive"));
        }
        if self.dimension == Some(0) {
            return Err(invalid("dimension must be positive when fixed"));
        }
        if let EvictionPolicy::Weighted {
            hit_weight,
            recency_weight,
        } = self.eviction_policy
        {
            let ok = |w: f64| w.is_finite() && w >= 0.0;
            if !ok(hit_weight) || !ok(recency_weight) {
                return Err(invalid("eviction weights must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfiguration(msg.into())
}
