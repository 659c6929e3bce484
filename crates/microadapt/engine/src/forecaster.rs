//! Multi-step forecasting from a unit's local dynamics.

use crate::config::EngineConfig;
use crate::dynamics::DimensionDynamics;
use crate::error::{EngineError, EngineResult};
use crate::pool::ModelUnit;
use crate::types::{ForecastResult, UncertaintyBand};

/// Smallest span used for clamp bounds, relative to the anchor magnitude.
const MIN_SPAN_RATIO: f64 = 1e-6;

/// Per-dimension clamp envelope derived from the anchor window.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    fn clamp(&self, v: f64) -> (f64, bool) {
        if v.is_nan() {
            // Midpoint is the least surprising substitute.
            return ((self.lower + self.upper) / 2.0, true);
        }
        if v < self.lower {
            (self.lower, true)
        } else if v > self.upper {
            (self.upper, true)
        } else {
            (v, false)
        }
    }
}

/// Stateless forecaster; owns only the clamp, band and horizon settings.
#[derive(Clone, Copy, Debug)]
pub struct Forecaster {
    clamp_range_factor: f64,
    uncertainty_z: Option<f64>,
    max_horizon: usize,
}

impl Forecaster {
    /// Take the clamp, band and horizon settings from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clamp_range_factor: config.clamp_range_factor,
            uncertainty_z: config.uncertainty_z.filter(|z| *z > 0.0),
            max_horizon: config.max_forecast_horizon,
        }
    }

    /// Iterate `unit`'s dynamics `horizon` steps past `anchor` (row-major, `dim` per row).
    pub fn forecast(
        &self,
        unit: &ModelUnit,
        anchor: &[f64],
        dim: usize,
        horizon: usize,
    ) -> EngineResult<ForecastResult> {
        if horizon == 0 {
            return Err(EngineError::InvalidInput(
                "forecast horizon must be positive".into(),
            ));
        }
        if horizon > self.max_horizon {
            return Err(EngineError::InvalidInput(format!(
                "forecast horizon {} exceeds the configured maximum {}",
                horizon, self.max_horizon
            )));
        }
        if dim == 0 || anchor.is_empty() || anchor.len() % dim != 0 {
            return Err(EngineError::InvalidInput(format!(
                "anchor window of {} values does not hold rows of {}",
                anchor.len(),
                dim
            )));
        }

        let rows = anchor.len() / dim;
        let last_row = &anchor[(rows - 1) * dim..];
        let prev_row = if rows >= 2 {
            &anchor[(rows - 2) * dim..(rows - 1) * dim]
        } else {
            last_row
        };

        let mut forecast_values = vec![vec![0.0; dim]; horizon];
        let mut band = self
            .uncertainty_z
            .map(|_| (vec![vec![0.0; dim]; horizon], vec![vec![0.0; dim]; horizon]));
        let mut clamped = false;

        for d in 0..dim {
            let bounds = self.bounds(anchor, dim, d);
            let dynamics = unit
                .dynamics
                .dims()
                .get(d)
                .copied()
                .unwrap_or_else(|| DimensionDynamics::constant(last_row[d]));

            let (mut prev, mut last) = (prev_row[d], last_row[d]);
            for (h, step) in forecast_values.iter_mut().enumerate() {
                let (next, hit) = bounds.clamp(dynamics.kind.step(prev, last));
                clamped |= hit;
                step[d] = next;
                prev = last;
                last = next;

                if let (Some(z), Some((lower, upper))) = (self.uncertainty_z, band.as_mut()) {
                    let half = z * dynamics.residual_std * ((h + 1) as f64).sqrt();
                    let half = if half.is_finite() { half } else { 0.0 };
                    lower[h][d] = bounds.clamp(next - half).0;
                    upper[h][d] = bounds.clamp(next + half).0;
                }
            }
        }

        Ok(ForecastResult {
            forecast_values,
            forecast_horizon: horizon,
            model_unit_id: unit.id,
            uncertainty: band.map(|(lower, upper)| UncertaintyBand { lower, upper }),
            clamped,
        })
    }

    fn bounds(&self, anchor: &[f64], dim: usize, d: usize) -> Bounds {
        let (min, max) = anchor
            .iter()
            .skip(d)
            .step_by(dim)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let magnitude = min.abs().max(max.abs());
        let span = (max - min).max(MIN_SPAN_RATIO * (1.0 + magnitude));
        let margin = self.clamp_range_factor * span;
        Bounds {
            lower: min - margin,
            upper: max + margin,
        }
    }
}
