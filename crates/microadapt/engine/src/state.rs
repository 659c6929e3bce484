use serde::{Deserialize, Serialize};

use crate::types::{Lifecycle, ModelUnitId};

/// Engine counters and lifecycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Incremented exactly once per accepted update.
    pub current_time: u64,
    pub total_updates: u64,
    pub regime_transitions: u64,
    pub current_model_unit_id: Option<ModelUnitId>,
    pub lifecycle: Lifecycle,
    pub degraded_fits: u64,
    pub units_created: u64,
    pub units_evicted: u64,
}

impl EngineState {
    /// Counters for a fresh COLD engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted point. Returns true on the tick that turns the engine WARM.
    pub fn advance(&mut self, warm_after: usize) -> bool {
        self.current_time += 1;
        self.total_updates += 1;
        if self.lifecycle == Lifecycle::Cold && self.total_updates == warm_after as u64 {
            self.lifecycle = Lifecycle::Warm;
            return true;
        }
        false
    }

    /// Record the regime the latest snapshot was assigned to.
    ///
    /// Returns true when this counts as a regime transition. The first
    /// assignment after warm-up is not a transition.
    pub fn record_assignment(&mut self, unit_id: ModelUnitId) -> bool {
        let previous = self.current_model_unit_id.replace(unit_id);
        match previous {
            Some(prev) if prev != unit_id => {
                self.regime_transitions += 1;
                true
            }
            _ => false,
        }
    }

    /// Count a unit added to the pool, including replacements.
    pub fn record_unit_created(&mut self) {
        self.units_created += 1;
    }

    /// Count a unit removed to make room.
    pub fn record_unit_evicted(&mut self) {
        self.units_evicted += 1;
    }

    /// Count a refit that fell back to previous or seeded parameters.
    pub fn record_degraded_fit(&mut self) {
        self.degraded_fits += 1;
    }

    /// True once the first full window has been seen.
    pub fn is_warm(&self) -> bool {
        self.lifecycle == Lifecycle::Warm
    }
}
