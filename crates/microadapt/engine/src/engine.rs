//! The MicroAdapt engine: window → matcher → fitter → forecaster.

use chrono::Utc;
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::dynamics::{FitOutcome, LocalDynamicsFitter};
use crate::error::{EngineError, EngineResult};
use crate::forecaster::Forecaster;
use crate::pool::{MatchKind, ModelUnit, RegimeModelPool};
use crate::snapshot::{self, EngineSnapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::state::EngineState;
use crate::types::{EngineStatsSnapshot, ForecastResult, Lifecycle, WindowView};
use crate::window::HierarchicalWindow;

/// Single-stream adaptive forecaster.
///
/// `update` takes `&mut self`; every query takes `&self`, so callers that
/// need concurrent readers wrap the engine in their own `RwLock`. Engines
/// share nothing with each other.
#[derive(Clone, Debug)]
pub struct MicroAdaptEngine {
    config: EngineConfig,
    window: HierarchicalWindow,
    pool: RegimeModelPool,
    fitter: LocalDynamicsFitter,
    forecaster: Forecaster,
    state: EngineState,
    /// Flattened level-0 window, reused across updates.
    features: Vec<f64>,
}

impl MicroAdaptEngine {
    /// Build a COLD engine. Fails without side effects on an invalid config.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let window = match config.dimension {
            Some(dim) => HierarchicalWindow::with_dimension(
                config.base_window_length,
                config.num_hierarchical_levels,
                dim,
            )?,
            None => HierarchicalWindow::new(
                config.base_window_length,
                config.num_hierarchical_levels,
            )?,
        };
        let features = config
            .dimension
            .map_or_else(Vec::new, |dim| vec![0.0; config.base_window_length * dim]);

        Ok(Self {
            pool: RegimeModelPool::new(&config),
            fitter: LocalDynamicsFitter::new(config.fit_strategy),
            forecaster: Forecaster::new(&config),
            state: EngineState::new(),
            window,
            features,
            config,
        })
    }

    /// Ingest one observation.
    ///
    /// A vector whose length disagrees with the stream, or that holds
    /// non-finite values, is rejected before anything is mutated.
    pub fn update(&mut self, point: &[f64]) -> EngineResult<()> {
        self.window.check_dimension(point.len())?;
        if let Some(i) = point.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "component {} is not finite",
                i
            )));
        }

        self.window.push(point)?;
        let dim = point.len();
        if self.features.is_empty() {
            self.features = vec![0.0; self.config.base_window_length * dim];
        }

        if self.state.advance(self.config.base_window_length) {
            info!(
                updates = self.state.total_updates,
                dim,
                "engine warm, regime matching enabled"
            );
        }
        if !self.state.is_warm() {
            trace!(t = self.state.current_time, "cold update");
            return Ok(());
        }

        self.window.copy_window_into(&mut self.features);
        let outcome = self
            .pool
            .match_snapshot(&self.features, self.state.current_time);
        match outcome.kind {
            MatchKind::Matched => {}
            MatchKind::Created => self.state.record_unit_created(),
            MatchKind::Replaced { .. } => {
                self.state.record_unit_created();
                self.state.record_unit_evicted();
            }
        }

        let previous = self.state.current_model_unit_id;
        if self.state.record_assignment(outcome.unit_id) {
            debug!(
                from = ?previous,
                to = %outcome.unit_id,
                distance = outcome.distance,
                transitions = self.state.regime_transitions,
                "regime transition"
            );
        }

        if let Some(unit) = self.pool.get_mut(outcome.unit_id) {
            if self.fitter.fit(unit, &self.features, dim) == FitOutcome::Degraded {
                self.state.record_degraded_fit();
            }
        }
        trace!(
            t = self.state.current_time,
            unit = %outcome.unit_id,
            distance = outcome.distance,
            "warm update"
        );
        Ok(())
    }

    /// Forecast `horizon` steps from the engine's own window with the current regime.
    pub fn forecast(&self, horizon: usize) -> EngineResult<ForecastResult> {
        self.ensure_warm()?;
        let unit = self
            .state
            .current_model_unit_id
            .and_then(|id| self.pool.get(id))
            .ok_or_else(|| self.insufficient_history())?;
        let dim = self.window.dimension().unwrap_or(0);
        self.forecaster.forecast(unit, &self.features, dim, horizon)
    }

    /// Match a caller-supplied window (row-major, `base_window_length × dim`)
    /// against the pool without mutating it, then forecast from that window.
    pub fn search_and_forecast(
        &self,
        window: &[f64],
        horizon: usize,
    ) -> EngineResult<ForecastResult> {
        self.ensure_warm()?;
        if horizon == 0 {
            return Err(EngineError::InvalidInput(
                "forecast horizon must be positive".into(),
            ));
        }
        let dim = self.window.dimension().unwrap_or(0);
        let expected = self.config.base_window_length * dim;
        if window.len() != expected {
            return Err(EngineError::InvalidInput(format!(
                "window must hold {} values ({} rows of {}), got {}",
                expected,
                self.config.base_window_length,
                dim,
                window.len()
            )));
        }
        if window.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidInput(
                "window contains non-finite values".into(),
            ));
        }

        let (unit, distance) = self
            .pool
            .nearest(window)
            .ok_or_else(|| self.insufficient_history())?;
        debug!(unit = %unit.id, distance, horizon, "search and forecast");
        self.forecaster.forecast(unit, window, dim, horizon)
    }

    /// Point-in-time copy of the engine counters.
    pub fn get_statistics(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            total_updates: self.state.total_updates,
            current_time: self.state.current_time,
            num_model_units: self.pool.len(),
            regime_transitions: self.state.regime_transitions,
            data_stream_length: self.window.raw_span(),
            degraded_fits: self.state.degraded_fits,
            lifecycle: self.state.lifecycle,
            current_model_unit_id: self.state.current_model_unit_id,
            units_created: self.state.units_created,
            units_evicted: self.state.units_evicted,
        }
    }

    /// COLD until the first full window, WARM afterwards.
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    /// Borrow the raw counters.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// The validated configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The hierarchical window, for inspecting coarser levels.
    pub fn window(&self) -> &HierarchicalWindow {
        &self.window
    }

    /// Copy of the level-0 window.
    pub fn current_window(&self) -> WindowView {
        self.window.current_window()
    }

    /// Copies of every model unit in the pool.
    pub fn model_units(&self) -> Vec<ModelUnit> {
        self.pool.units().to_vec()
    }

    /// Return to a fresh COLD engine with the same configuration.
    pub fn reset(&mut self) -> EngineResult<()> {
        *self = Self::new(self.config.clone())?;
        debug!("engine reset");
        Ok(())
    }

    /// Capture everything needed to resume this engine elsewhere.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            captured_at: Utc::now(),
            config: self.config.clone(),
            window: self.window.to_snapshot(),
            pool: self.pool.to_snapshot(),
            state: self.state.clone(),
        }
    }

    /// Rebuild an engine from a snapshot, rejecting newer schema versions and
    /// any contents that disagree with each other.
    pub fn restore(snapshot: EngineSnapshot) -> EngineResult<Self> {
        snapshot::check_version(snapshot.schema_version)?;
        let config = snapshot.config;
        config
            .validate()
            .map_err(|e| EngineError::Snapshot(format!("embedded config: {}", e)))?;

        let window = HierarchicalWindow::from_snapshot(
            &snapshot.window,
            config.base_window_length,
            config.effective_levels(),
        )?;
        let dim = window.dimension();
        if config.dimension.is_some() && config.dimension != dim {
            return Err(EngineError::Snapshot(
                "window dimension does not match the embedded config".into(),
            ));
        }

        let state = snapshot.state;
        let warm_expected = state.total_updates >= config.base_window_length as u64;
        if state.total_updates != window.total_pushed()
            || state.current_time != state.total_updates
            || state.is_warm() != warm_expected
        {
            return Err(EngineError::Snapshot(
                "engine counters do not match the window history".into(),
            ));
        }

        let feature_len = dim.map(|d| config.base_window_length * d);
        let pool = RegimeModelPool::from_snapshot(&config, snapshot.pool, feature_len, dim)?;
        let current_ok = match state.current_model_unit_id {
            Some(id) => state.is_warm() && pool.get(id).is_some(),
            None => !state.is_warm() && pool.is_empty(),
        };
        if !current_ok {
            return Err(EngineError::Snapshot(
                "current model unit is inconsistent with the pool".into(),
            ));
        }

        let mut features = vec![0.0; feature_len.unwrap_or(0)];
        window.copy_window_into(&mut features);

        info!(
            updates = state.total_updates,
            units = pool.len(),
            lifecycle = %state.lifecycle,
            "engine restored from snapshot"
        );
        Ok(Self {
            fitter: LocalDynamicsFitter::new(config.fit_strategy),
            forecaster: Forecaster::new(&config),
            config,
            window,
            pool,
            state,
            features,
        })
    }

    fn ensure_warm(&self) -> EngineResult<()> {
        if self.state.is_warm() {
            Ok(())
        } else {
            Err(self.insufficient_history())
        }
    }

    fn insufficient_history(&self) -> EngineError {
        EngineError::InsufficientHistory {
            received: self.state.total_updates,
            required: self.config.base_window_length as u64,
        }
    }
}
