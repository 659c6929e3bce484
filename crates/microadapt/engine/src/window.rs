//! Hierarchical window: fixed-capacity multi-resolution ring buffers.
//!
//! ```text
//!   raw point ──► level 0  [ W rows, 1 raw point each      ]
//!                    │ every 2 arrivals, mean ▼
//!                 level 1  [ W rows, 2 raw points each     ]
//!                    │ every 2 arrivals, mean ▼
//!                 level L  [ W rows, 2^L raw points each   ]   (never cascades)
//! ```
//!
//! Level `l` receives one row per `2^l` pushes, so cascade work amortizes to
//! O(1) per push. All storage is allocated once, when the point dimension
//! becomes known.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::WindowView;

/// Rows of level `l` averaged into one row of level `l + 1`.
pub const CASCADE_FAN_IN: usize = 2;

/// Zeroed buffer of `rows * dim` values, or `None` when it cannot be allocated.
pub(crate) fn zeroed(rows: usize, dim: usize) -> Option<Vec<f64>> {
    let len = rows.checked_mul(dim)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0.0);
    Some(buf)
}

/// One fixed-capacity circular buffer of `dim`-sized rows.
#[derive(Clone, Debug)]
pub struct WindowLevel {
    values: Vec<f64>,
    capacity: usize,
    dim: usize,
    head: usize,
    len: usize,
    carry: Vec<f64>,
    carry_count: usize,
}

impl WindowLevel {
    fn new(capacity: usize, dim: usize) -> Option<Self> {
        Some(Self {
            values: zeroed(capacity, dim)?,
            capacity,
            dim,
            head: 0,
            len: 0,
            carry: zeroed(1, dim)?,
            carry_count: 0,
        })
    }

    /// Push a row, overwriting the oldest if full.
    fn push(&mut self, row: &[f64]) {
        let start = self.head * self.dim;
        self.values[start..start + self.dim].copy_from_slice(row);
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Fold `row` into the pending summary. When `CASCADE_FAN_IN` rows have
    /// accumulated, overwrite `row` with their mean and return true.
    fn accumulate(&mut self, row: &mut [f64]) -> bool {
        for (c, v) in self.carry.iter_mut().zip(row.iter()) {
            *c += v;
        }
        self.carry_count += 1;
        if self.carry_count < CASCADE_FAN_IN {
            return false;
        }
        let n = CASCADE_FAN_IN as f64;
        for (v, c) in row.iter_mut().zip(self.carry.iter_mut()) {
            *v = *c / n;
            *c = 0.0;
        }
        self.carry_count = 0;
        true
    }

    /// Rows currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every slot holds a row.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Maximum number of rows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row `i` in arrival order (0 is the oldest retained row).
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.len {
            return None;
        }
        let oldest = (self.head + self.capacity - self.len) % self.capacity;
        let idx = (oldest + i) % self.capacity;
        Some(&self.values[idx * self.dim..(idx + 1) * self.dim])
    }

    /// Retained rows, oldest first.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.len).filter_map(move |i| self.row(i))
    }

    /// Most recently pushed row.
    pub fn latest(&self) -> Option<&[f64]> {
        self.len.checked_sub(1).and_then(|i| self.row(i))
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
        self.carry.iter_mut().for_each(|c| *c = 0.0);
        self.carry_count = 0;
    }

    fn to_snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            rows: self.rows().map(<[f64]>::to_vec).collect(),
            carry: self.carry.clone(),
            carry_count: self.carry_count,
        }
    }
}

/// Serialized form of one level: retained rows oldest-first plus the pending summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub rows: Vec<Vec<f64>>,
    pub carry: Vec<f64>,
    pub carry_count: usize,
}

/// Serialized form of the whole hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub capacity: usize,
    pub num_levels: usize,
    pub dimension: Option<usize>,
    pub total_pushed: u64,
    pub levels: Vec<LevelSnapshot>,
}

/// Ordered stack of equally sized window levels.
#[derive(Clone, Debug)]
pub struct HierarchicalWindow {
    capacity: usize,
    num_levels: usize,
    dim: Option<usize>,
    levels: Vec<WindowLevel>,
    scratch: Vec<f64>,
    total_pushed: u64,
}

impl HierarchicalWindow {
    /// Create a window whose dimension is fixed by the first pushed point.
    ///
    /// `num_hierarchical_levels == 0` degrades to a single flat window.
    pub fn new(base_window_length: usize, num_hierarchical_levels: usize) -> EngineResult<Self> {
        if base_window_length == 0 {
            return Err(EngineError::InvalidConfiguration(
                "base_window_length must be positive".into(),
            ));
        }
        Ok(Self {
            capacity: base_window_length,
            num_levels: num_hierarchical_levels.max(1),
            dim: None,
            levels: Vec::new(),
            scratch: Vec::new(),
            total_pushed: 0,
        })
    }

    /// Create a window with storage for `dim`-sized points allocated up front.
    pub fn with_dimension(
        base_window_length: usize,
        num_hierarchical_levels: usize,
        dim: usize,
    ) -> EngineResult<Self> {
        if dim == 0 {
            return Err(EngineError::InvalidConfiguration(
                "dimension must be positive".into(),
            ));
        }
        let mut window = Self::new(base_window_length, num_hierarchical_levels)?;
        window.allocate(dim)?;
        Ok(window)
    }

    /// Allocate every level for `dim`-sized rows. Leaves `self` untouched on failure.
    fn allocate(&mut self, dim: usize) -> EngineResult<()> {
        let levels = (0..self.num_levels)
            .map(|_| WindowLevel::new(self.capacity, dim))
            .collect::<Option<Vec<_>>>()
            .zip(zeroed(1, dim))
            .ok_or_else(|| {
                EngineError::InvalidConfiguration(format!(
                    "cannot allocate {} window levels of {} rows x {} values",
                    self.num_levels, self.capacity, dim
                ))
            })?;
        (self.levels, self.scratch) = levels;
        self.dim = Some(dim);
        Ok(())
    }

    /// Dimension check without mutation.
    pub fn check_dimension(&self, len: usize) -> EngineResult<()> {
        if len == 0 {
            return Err(EngineError::InvalidConfiguration(
                "points must have at least one component".into(),
            ));
        }
        match self.dim {
            Some(d) if d != len => Err(EngineError::InvalidConfiguration(format!(
                "dimension mismatch: expected {}, got {}",
                d, len
            ))),
            _ => Ok(()),
        }
    }

    /// Push a raw point into level 0 and cascade summaries upward.
    pub fn push(&mut self, point: &[f64]) -> EngineResult<()> {
        self.check_dimension(point.len())?;
        if self.dim.is_none() {
            self.allocate(point.len())?;
        }

        let Self {
            levels, scratch, ..
        } = self;
        scratch.copy_from_slice(point);
        let top = levels.len() - 1;
        for (l, level) in levels.iter_mut().enumerate() {
            level.push(scratch.as_slice());
            if l == top || !level.accumulate(scratch.as_mut_slice()) {
                break;
            }
        }
        self.total_pushed += 1;
        Ok(())
    }

    /// Copy level 0 in arrival order into `out`. Returns the number of rows copied.
    pub fn copy_window_into(&self, out: &mut [f64]) -> usize {
        let Some(level) = self.levels.first() else {
            return 0;
        };
        let dim = level.dim;
        let mut rows = 0;
        for (chunk, row) in out.chunks_exact_mut(dim).zip(level.rows()) {
            chunk.copy_from_slice(row);
            rows += 1;
        }
        rows
    }

    /// Current level-0 contents; tagged cold until the level is full.
    pub fn current_window(&self) -> WindowView {
        let dim = self.dim.unwrap_or(0);
        let rows = self.levels.first().map_or(0, WindowLevel::len);
        let mut values = vec![0.0; rows * dim];
        self.copy_window_into(&mut values);
        WindowView {
            values,
            rows,
            dim,
            cold: rows < self.capacity,
        }
    }

    /// Level `l`, or `None` before the dimension is known.
    pub fn level(&self, l: usize) -> Option<&WindowLevel> {
        self.levels.get(l)
    }

    /// Configured depth (at least one).
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Rows per level.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Point dimension, once learned.
    pub fn dimension(&self) -> Option<usize> {
        self.dim
    }

    /// Raw points pushed since creation or the last clear.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Level 0 holds a full window.
    pub fn is_warm(&self) -> bool {
        self.levels.first().is_some_and(WindowLevel::is_full)
    }

    /// Raw points spanned by the retained history (the coarsest populated level wins).
    pub fn raw_span(&self) -> u64 {
        let span = self
            .levels
            .iter()
            .enumerate()
            .map(|(l, level)| (level.len() as u64).saturating_mul(1u64 << l))
            .max()
            .unwrap_or(0);
        span.min(self.total_pushed)
    }

    /// Drop all history, keeping the allocated storage and dimension.
    pub fn clear(&mut self) {
        self.levels.iter_mut().for_each(WindowLevel::clear);
        self.total_pushed = 0;
    }

    /// Serializable copy of every level.
    pub fn to_snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            capacity: self.capacity,
            num_levels: self.num_levels,
            dimension: self.dim,
            total_pushed: self.total_pushed,
            levels: self.levels.iter().map(WindowLevel::to_snapshot).collect(),
        }
    }

    /// Rebuild a window of `capacity` rows and `num_levels` levels, checking
    /// every buffer against that shape before anything is allocated.
    pub fn from_snapshot(
        snapshot: &WindowSnapshot,
        capacity: usize,
        num_levels: usize,
    ) -> EngineResult<Self> {
        if snapshot.capacity != capacity || snapshot.num_levels != num_levels {
            return Err(EngineError::Snapshot(format!(
                "window is {} rows x {} levels, expected {} x {}",
                snapshot.capacity, snapshot.num_levels, capacity, num_levels
            )));
        }
        let mut window = Self::new(capacity, num_levels)?;
        if window.num_levels != num_levels {
            return Err(EngineError::Snapshot(format!(
                "window declares {} levels",
                num_levels
            )));
        }

        let Some(dim) = snapshot.dimension else {
            if !snapshot.levels.is_empty() || snapshot.total_pushed != 0 {
                return Err(EngineError::Snapshot(
                    "window without dimension must be empty".into(),
                ));
            }
            return Ok(window);
        };
        if dim == 0 {
            return Err(EngineError::Snapshot("window dimension is zero".into()));
        }
        if snapshot.levels.len() != window.num_levels {
            return Err(EngineError::Snapshot(format!(
                "expected {} window levels, found {}",
                window.num_levels,
                snapshot.levels.len()
            )));
        }
        for (l, saved) in snapshot.levels.iter().enumerate() {
            if saved.rows.len() > capacity {
                return Err(EngineError::Snapshot(format!(
                    "level {} holds {} rows, capacity {}",
                    l,
                    saved.rows.len(),
                    capacity
                )));
            }
            if saved.carry.len() != dim || saved.carry_count >= CASCADE_FAN_IN {
                return Err(EngineError::Snapshot(format!(
                    "level {} has malformed pending summary",
                    l
                )));
            }
            if saved
                .rows
                .iter()
                .any(|row| row.len() != dim || row.iter().any(|v| !v.is_finite()))
            {
                return Err(EngineError::Snapshot(format!(
                    "level {} contains a malformed row",
                    l
                )));
            }
        }

        window
            .allocate(dim)
            .map_err(|e| EngineError::Snapshot(e.to_string()))?;
        window.total_pushed = snapshot.total_pushed;
        for (level, saved) in window.levels.iter_mut().zip(&snapshot.levels) {
            for row in &saved.rows {
                level.push(row);
            }
            level.carry.copy_from_slice(&saved.carry);
            level.carry_count = saved.carry_count;
        }
        Ok(window)
    }
}
