//! Local dynamics: per-regime predictive models fitted on the bounded window.
//!
//! Each dimension carries one variant of a closed model family
//! ([`DynamicsKind`]). Variants are chosen at fit time, never dispatched
//! through trait objects, and the fitter reuses its buffers so refitting
//! does not allocate once the engine is warm.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FitStrategy;
use crate::pool::ModelUnit;

/// Relative pivot size below which the normal equations count as singular.
const SINGULAR_PIVOT_EPS: f64 = 1e-10;

/// Relative variance below which a series counts as flat.
const FLAT_VARIANCE_EPS: f64 = 1e-12;

/// Relative floor added to residual MSE before taking its logarithm.
const MSE_FLOOR_EPS: f64 = 1e-12;

/// Oscillator fits whose characteristic roots exceed this modulus are rejected.
const MAX_OSCILLATOR_RADIUS: f64 = 1.05;

/// Score margin a more complex model must win by.
const SCORE_TIE_MARGIN: f64 = 1e-9;

/// One-dimensional local model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DynamicsKind {
    /// `y[t+1] = level`
    Constant { level: f64 },
    /// `y[t+1] = y[t] + slope`; `intercept` is the fitted value at the window start.
    Linear { slope: f64, intercept: f64 },
    /// `y[t+1] = a1 * y[t] + a2 * y[t-1] + bias`
    Oscillator { a1: f64, a2: f64, bias: f64 },
}

impl DynamicsKind {
    /// One step ahead from the last two observed values.
    pub fn step(&self, prev: f64, last: f64) -> f64 {
        match *self {
            Self::Constant { level } => level,
            Self::Linear { slope, .. } => last + slope,
            Self::Oscillator { a1, a2, bias } => a1 * last + a2 * prev + bias,
        }
    }

    /// Free parameters, used by the information criterion.
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Constant { .. } => 1,
            Self::Linear { .. } => 2,
            Self::Oscillator { .. } => 3,
        }
    }

    /// Short lowercase family name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "constant",
            Self::Linear { .. } => "linear",
            Self::Oscillator { .. } => "oscillator",
        }
    }

    fn is_finite(&self) -> bool {
        match *self {
            Self::Constant { level } => level.is_finite(),
            Self::Linear { slope, intercept } => slope.is_finite() && intercept.is_finite(),
            Self::Oscillator { a1, a2, bias } => {
                a1.is_finite() && a2.is_finite() && bias.is_finite()
            }
        }
    }
}

/// Fitted model for one dimension plus its in-sample residual spread.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionDynamics {
    pub kind: DynamicsKind,
    pub residual_std: f64,
}

impl DimensionDynamics {
    /// Hold `level` with zero residual spread.
    pub fn constant(level: f64) -> Self {
        Self {
            kind: DynamicsKind::Constant { level },
            residual_std: 0.0,
        }
    }
}

/// Local dynamics of a model unit, one entry per dimension. Empty until first fit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalDynamics {
    dims: Vec<DimensionDynamics>,
}

impl LocalDynamics {
    /// Wrap per-dimension parameters.
    pub fn from_dims(dims: Vec<DimensionDynamics>) -> Self {
        Self { dims }
    }

    /// Parameters, one entry per dimension.
    pub fn dims(&self) -> &[DimensionDynamics] {
        &self.dims
    }

    pub fn dimension(&self) -> usize {
        self.dims.len()
    }

    /// At least one fit has succeeded.
    pub fn is_fitted(&self) -> bool {
        !self.dims.is_empty()
    }

    /// Every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.dims
            .iter()
            .all(|d| d.kind.is_finite() && d.residual_std.is_finite())
    }

    /// Forget the parameters but keep the allocation.
    pub fn clear(&mut self) {
        self.dims.clear();
    }

    fn replace_with(&mut self, staged: &[DimensionDynamics]) {
        self.dims.clear();
        self.dims.extend_from_slice(staged);
    }
}

/// Why a fit was rejected. Recovered locally, never surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum FitError {
    #[error("window too short for model")]
    TooShort,
    #[error("zero-variance window")]
    Degenerate,
    #[error("near-singular normal equations")]
    Singular,
    #[error("non-finite parameters")]
    NonFinite,
    #[error("unstable dynamics")]
    Unstable,
}

/// Result of refitting a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitOutcome {
    Fitted,
    /// The window was unusable; the unit kept (or was seeded with) fallback parameters.
    Degraded,
}

struct Candidate {
    dynamics: DimensionDynamics,
    score: f64,
}

/// Refits a unit's local dynamics from the current bounded window.
#[derive(Clone, Debug)]
pub struct LocalDynamicsFitter {
    strategy: FitStrategy,
    series: Vec<f64>,
    staged: Vec<DimensionDynamics>,
}

impl LocalDynamicsFitter {
    /// Fitter for one model family, or `Auto` selection.
    pub fn new(strategy: FitStrategy) -> Self {
        Self {
            strategy,
            series: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// Refit `unit` from `window` (row-major, `dim` values per row).
    ///
    /// Never fails: unusable windows keep the unit's last good parameters,
    /// or seed a constant model when the unit has none.
    pub fn fit(&mut self, unit: &mut ModelUnit, window: &[f64], dim: usize) -> FitOutcome {
        if dim == 0 || window.len() < dim {
            return self.degrade(unit, window, dim, FitError::TooShort);
        }
        if is_flat_window(window, dim) {
            return self.degrade(unit, window, dim, FitError::Degenerate);
        }

        self.staged.clear();
        for d in 0..dim {
            self.series.clear();
            self.series.extend(window.iter().skip(d).step_by(dim));
            match fit_series(self.strategy, &self.series) {
                Ok(dynamics) => self.staged.push(dynamics),
                Err(e) => return self.degrade(unit, window, dim, e),
            }
        }
        unit.dynamics.replace_with(&self.staged);
        FitOutcome::Fitted
    }

    fn degrade(
        &mut self,
        unit: &mut ModelUnit,
        window: &[f64],
        dim: usize,
        reason: FitError,
    ) -> FitOutcome {
        let keeps_last_good = unit.dynamics.is_fitted() && unit.dynamics.dimension() == dim;
        match reason {
            FitError::Degenerate | FitError::TooShort => {
                debug!(unit = %unit.id, reason = %reason, keeps_last_good, "local fit skipped")
            }
            _ => warn!(unit = %unit.id, reason = %reason, keeps_last_good, "local fit degraded"),
        }
        if !keeps_last_good && dim > 0 {
            self.staged.clear();
            let rows = (window.len() / dim).max(1);
            for d in 0..dim {
                let level = window.iter().skip(d).step_by(dim).sum::<f64>() / rows as f64;
                let level = if level.is_finite() { level } else { 0.0 };
                self.staged.push(DimensionDynamics::constant(level));
            }
            unit.dynamics.replace_with(&self.staged);
        }
        FitOutcome::Degraded
    }
}

/// True when every dimension of the window has (relatively) zero variance.
fn is_flat_window(window: &[f64], dim: usize) -> bool {
    let rows = window.len() / dim;
    if rows < 2 {
        return true;
    }
    (0..dim).all(|d| {
        let (_, var, mean_sq) = moments(window.iter().skip(d).step_by(dim).copied(), rows);
        var <= FLAT_VARIANCE_EPS * (1.0 + mean_sq)
    })
}

/// (mean, population variance, mean of squares) of `n` values.
fn moments(values: impl Iterator<Item = f64> + Clone, n: usize) -> (f64, f64, f64) {
    let n_f = n as f64;
    let mean = values.clone().sum::<f64>() / n_f;
    let mut var = 0.0;
    let mut mean_sq = 0.0;
    for v in values {
        var += (v - mean) * (v - mean);
        mean_sq += v * v;
    }
    (mean, var / n_f, mean_sq / n_f)
}

fn fit_series(strategy: FitStrategy, y: &[f64]) -> Result<DimensionDynamics, FitError> {
    match strategy {
        FitStrategy::Constant => fit_constant(y).map(|c| c.dynamics),
        FitStrategy::Linear => fit_linear(y).map(|c| c.dynamics),
        FitStrategy::Oscillator => fit_oscillator(y).map(|c| c.dynamics),
        FitStrategy::Auto => {
            let mut best: Option<Candidate> = None;
            // Ordered simplest first; a later model must beat the incumbent by a margin.
            for candidate in [fit_constant(y), fit_linear(y), fit_oscillator(y)]
                .into_iter()
                .flatten()
            {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.score < b.score - SCORE_TIE_MARGIN);
                if better {
                    best = Some(candidate);
                }
            }
            best.map(|c| c.dynamics).ok_or(FitError::Singular)
        }
    }
}

/// Per-sample information criterion: `ln(mse + floor) + 2k/m`.
fn score(sse: f64, m: usize, k: usize, mean_sq: f64) -> f64 {
    let m = m as f64;
    let floor = MSE_FLOOR_EPS * (1.0 + mean_sq);
    (sse / m + floor).ln() + 2.0 * k as f64 / m
}

fn finish(kind: DynamicsKind, sse: f64, m: usize, mean_sq: f64) -> Result<Candidate, FitError> {
    let residual_std = (sse / m as f64).sqrt();
    if !kind.is_finite() || !residual_std.is_finite() {
        return Err(FitError::NonFinite);
    }
    Ok(Candidate {
        dynamics: DimensionDynamics { kind, residual_std },
        score: score(sse, m, kind.parameter_count(), mean_sq),
    })
}

fn fit_constant(y: &[f64]) -> Result<Candidate, FitError> {
    if y.is_empty() {
        return Err(FitError::TooShort);
    }
    let (mean, var, mean_sq) = moments(y.iter().copied(), y.len());
    let sse = var * y.len() as f64;
    finish(DynamicsKind::Constant { level: mean }, sse, y.len(), mean_sq)
}

fn fit_linear(y: &[f64]) -> Result<Candidate, FitError> {
    let n = y.len();
    if n < 3 {
        return Err(FitError::TooShort);
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let (y_mean, _, mean_sq) = moments(y.iter().copied(), n);
    let mut s_tt = 0.0;
    let mut s_ty = 0.0;
    for (t, v) in y.iter().enumerate() {
        let dt = t as f64 - t_mean;
        s_tt += dt * dt;
        s_ty += dt * (v - y_mean);
    }
    let slope = s_ty / s_tt;
    let intercept = y_mean - slope * t_mean;
    let sse: f64 = y
        .iter()
        .enumerate()
        .map(|(t, v)| {
            let r = v - (intercept + slope * t as f64);
            r * r
        })
        .sum();
    finish(DynamicsKind::Linear { slope, intercept }, sse, n, mean_sq)
}

fn fit_oscillator(y: &[f64]) -> Result<Candidate, FitError> {
    let n = y.len();
    if n < 6 {
        return Err(FitError::TooShort);
    }
    // Regress y[t] on (y[t-1], y[t-2], 1).
    let mut xtx = [[0.0; 3]; 3];
    let mut xty = [0.0; 3];
    for t in 2..n {
        let x = [y[t - 1], y[t - 2], 1.0];
        for i in 0..3 {
            for j in 0..3 {
                xtx[i][j] += x[i] * x[j];
            }
            xty[i] += x[i] * y[t];
        }
    }
    let [a1, a2, bias] = solve3(xtx, xty).ok_or(FitError::Singular)?;
    let kind = DynamicsKind::Oscillator { a1, a2, bias };
    if !kind.is_finite() {
        return Err(FitError::NonFinite);
    }
    if spectral_radius(a1, a2) > MAX_OSCILLATOR_RADIUS {
        return Err(FitError::Unstable);
    }

    let m = n - 2;
    let sse: f64 = (2..n)
        .map(|t| {
            let r = y[t] - kind.step(y[t - 2], y[t - 1]);
            r * r
        })
        .sum();
    let (_, _, mean_sq) = moments(y.iter().copied(), n);
    finish(kind, sse, m, mean_sq)
}

/// Largest root modulus of `z^2 - a1 z - a2`.
fn spectral_radius(a1: f64, a2: f64) -> f64 {
    let disc = a1 * a1 + 4.0 * a2;
    if disc >= 0.0 {
        let s = disc.sqrt();
        ((a1 + s) / 2.0).abs().max(((a1 - s) / 2.0).abs())
    } else {
        (-a2).sqrt()
    }
}

/// Gaussian elimination with partial pivoting on a 3×3 system.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    let scale = (0..3).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let tol = SINGULAR_PIVOT_EPS * scale;

    for col in 0..3 {
        let pivot = (col..3)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= tol {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
