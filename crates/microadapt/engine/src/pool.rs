//! Regime model pool and matcher.
//!
//! A capacity-bounded online vector quantizer: each window snapshot is
//! assigned to its nearest centroid, centroids drift toward the data by EMA,
//! and novel snapshots open a new regime, evicting the weakest unit when the
//! pool is full.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DistanceMetric, EngineConfig, EvictionPolicy};
use crate::dynamics::LocalDynamics;
use crate::error::{EngineError, EngineResult};
use crate::types::ModelUnitId;

/// One regime: centroid summary plus its local predictive model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelUnit {
    pub id: ModelUnitId,
    /// Flattened window snapshot the unit represents.
    pub centroid: Vec<f64>,
    pub dynamics: LocalDynamics,
    pub hit_count: u64,
    pub last_used_time: u64,
    pub created_at: u64,
}

impl ModelUnit {
    /// Fresh unit seeded at `centroid`, not yet fitted.
    pub fn new(id: ModelUnitId, centroid: Vec<f64>, now: u64) -> Self {
        Self {
            id,
            centroid,
            dynamics: LocalDynamics::default(),
            hit_count: 1,
            last_used_time: now,
            created_at: now,
        }
    }

    /// Move the centroid toward `snapshot` by `rate`.
    fn absorb(&mut self, snapshot: &[f64], rate: f64, now: u64) {
        for (c, s) in self.centroid.iter_mut().zip(snapshot) {
            *c += rate * (s - *c);
        }
        self.hit_count += 1;
        self.last_used_time = now;
    }

    /// Reuse this slot for a brand new regime, keeping the allocations.
    fn reseed(&mut self, id: ModelUnitId, snapshot: &[f64], now: u64) {
        self.id = id;
        self.centroid.clear();
        self.centroid.extend_from_slice(snapshot);
        self.dynamics.clear();
        self.hit_count = 1;
        self.last_used_time = now;
        self.created_at = now;
    }
}

/// How a snapshot was placed in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Within the novelty threshold of an existing unit.
    Matched,
    /// Opened a new unit in a free slot.
    Created,
    /// Opened a new unit in the slot of an evicted one.
    Replaced { evicted: ModelUnitId },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub unit_id: ModelUnitId,
    /// Distance to the nearest unit before the update (infinite for an empty pool).
    pub distance: f64,
    pub kind: MatchKind,
}

/// Serialized form of the pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub units: Vec<ModelUnit>,
    pub next_unit_id: u64,
}

/// Bounded set of model units. `len() <= capacity()` always holds.
#[derive(Clone, Debug)]
pub struct RegimeModelPool {
    units: Vec<ModelUnit>,
    max_units: usize,
    metric: DistanceMetric,
    eviction: EvictionPolicy,
    novelty_threshold: f64,
    learning_rate: f64,
    next_id: u64,
}

impl RegimeModelPool {
    /// Empty pool sized and tuned from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            units: Vec::with_capacity(config.max_model_units),
            max_units: config.max_model_units,
            metric: config.distance_metric,
            eviction: config.eviction_policy,
            novelty_threshold: config.novelty_threshold,
            learning_rate: config.centroid_learning_rate,
            next_id: 1,
        }
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The next novel snapshot will evict.
    pub fn is_full(&self) -> bool {
        self.units.len() >= self.max_units
    }

    /// Hard cap on live units.
    pub fn capacity(&self) -> usize {
        self.max_units
    }

    /// Live units in slot order.
    pub fn units(&self) -> &[ModelUnit] {
        &self.units
    }

    /// Look up a live unit by id.
    pub fn get(&self, id: ModelUnitId) -> Option<&ModelUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: ModelUnitId) -> Option<&mut ModelUnit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    /// Nearest unit and its distance, ties broken by lowest id. Read-only.
    pub fn nearest(&self, snapshot: &[f64]) -> Option<(&ModelUnit, f64)> {
        self.nearest_index(snapshot)
            .map(|(idx, d)| (&self.units[idx], d))
    }

    fn nearest_index(&self, snapshot: &[f64]) -> Option<(usize, f64)> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.centroid.len() == snapshot.len())
            .map(|(i, u)| (i, self.metric.distance(snapshot, &u.centroid)))
            .min_by(|(i, da), (j, db)| {
                da.total_cmp(db)
                    .then_with(|| self.units[*i].id.cmp(&self.units[*j].id))
            })
    }

    /// Assign `snapshot` to a regime, creating or evicting units as needed.
    pub fn match_snapshot(&mut self, snapshot: &[f64], now: u64) -> MatchOutcome {
        let nearest = self.nearest_index(snapshot);

        if let Some((idx, distance)) = nearest {
            if distance <= self.novelty_threshold {
                let unit = &mut self.units[idx];
                unit.absorb(snapshot, self.learning_rate, now);
                return MatchOutcome {
                    unit_id: unit.id,
                    distance,
                    kind: MatchKind::Matched,
                };
            }
        }
        let distance = nearest.map_or(f64::INFINITY, |(_, d)| d);

        let id = self.allocate_id();
        if !self.is_full() {
            self.units.push(ModelUnit::new(id, snapshot.to_vec(), now));
            debug!(unit = %id, distance, pool = self.units.len(), "regime created");
            return MatchOutcome {
                unit_id: id,
                distance,
                kind: MatchKind::Created,
            };
        }

        let victim = self.eviction_candidate();
        let evicted = self.units[victim].id;
        self.units[victim].reseed(id, snapshot, now);
        debug!(unit = %id, evicted = %evicted, distance, "regime replaced");
        MatchOutcome {
            unit_id: id,
            distance,
            kind: MatchKind::Replaced { evicted },
        }
    }

    fn allocate_id(&mut self) -> ModelUnitId {
        let id = ModelUnitId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Index of the unit with the smallest eviction score; ties go to the lowest id.
    fn eviction_candidate(&self) -> usize {
        let policy = self.eviction;
        self.units
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let primary = match policy {
                    EvictionPolicy::LeastFrequent => (a.hit_count, a.last_used_time)
                        .cmp(&(b.hit_count, b.last_used_time)),
                    EvictionPolicy::LeastRecent => (a.last_used_time, a.hit_count)
                        .cmp(&(b.last_used_time, b.hit_count)),
                    EvictionPolicy::Weighted {
                        hit_weight,
                        recency_weight,
                    } => {
                        let score = |u: &ModelUnit| {
                            hit_weight * u.hit_count as f64
                                + recency_weight * u.last_used_time as f64
                        };
                        score(a).total_cmp(&score(b))
                    }
                };
                primary.then_with(|| a.id.cmp(&b.id))
            })
            .map_or(0, |(i, _)| i)
    }

    /// Serializable copy of every unit and the id counter.
    pub fn to_snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            units: self.units.clone(),
            next_unit_id: self.next_id,
        }
    }

    /// Rebuild a pool from a snapshot. `feature_len` is `window_length * dim`
    /// when the dimension is known.
    pub fn from_snapshot(
        config: &EngineConfig,
        snapshot: PoolSnapshot,
        feature_len: Option<usize>,
        dim: Option<usize>,
    ) -> EngineResult<Self> {
        let mut pool = Self::new(config);
        if snapshot.units.len() > pool.max_units {
            return Err(EngineError::Snapshot(format!(
                "pool holds {} units, limit {}",
                snapshot.units.len(),
                pool.max_units
            )));
        }
        if !snapshot.units.is_empty() && feature_len.is_none() {
            return Err(EngineError::Snapshot(
                "pool has units but the window has no dimension".into(),
            ));
        }

        let mut ids: Vec<u64> = snapshot.units.iter().map(|u| u.id.0).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(EngineError::Snapshot("duplicate model unit ids".into()));
        }
        if ids.last().is_some_and(|&max| max >= snapshot.next_unit_id) {
            return Err(EngineError::Snapshot(
                "next_unit_id does not exceed existing ids".into(),
            ));
        }

        for unit in &snapshot.units {
            let shape_ok = Some(unit.centroid.len()) == feature_len
                && unit.centroid.iter().all(|v| v.is_finite());
            let dynamics_ok = unit.dynamics.is_finite()
                && (!unit.dynamics.is_fitted() || Some(unit.dynamics.dimension()) == dim);
            if !shape_ok || !dynamics_ok {
                return Err(EngineError::Snapshot(format!(
                    "model unit {} is malformed",
                    unit.id
                )));
            }
        }

        pool.units.extend(snapshot.units);
        pool.next_id = snapshot.next_unit_id.max(1);
        Ok(pool)
    }
}
