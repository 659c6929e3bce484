//! # microadapt-engine
//!
//! Bounded-memory adaptive forecaster for a single multivariate stream.
//!
//! The engine keeps a multi-resolution window over the stream, segments it
//! online into recurring regimes, fits a small local model per regime and
//! forecasts from whichever regime currently fits best. Memory and per-update
//! work depend only on the configuration, never on how long the stream runs.
//!
//! ## Architecture
//!
//! ```text
//!   update(x) ──▶ ┌─────────────────────┐
//!                 │ HierarchicalWindow  │  level 0: last W points
//!                 │  ┌───────────────┐  │  level l: W means of 2^l points
//!                 │  │ L0 │ L1 │ ... │  │
//!                 │  └───────────────┘  │
//!                 └─────────┬───────────┘
//!                           │ level-0 snapshot (once WARM)
//!                           ▼
//!                 ┌─────────────────────┐
//!                 │  RegimeModelPool    │  nearest centroid / create / evict
//!                 └─────────┬───────────┘
//!                           │ matched ModelUnit
//!                           ▼
//!                 ┌─────────────────────┐
//!                 │ LocalDynamicsFitter │  constant | linear | oscillator
//!                 └─────────┬───────────┘
//!                           │
//!   forecast(h) ◀─┌─────────────────────┐
//!                 │     Forecaster      │  iterate + clamp + band
//!                 └─────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! The engine is COLD until it has seen `base_window_length` points and WARM
//! from then on. COLD updates only fill the window; forecasting fails with
//! [`EngineError::InsufficientHistory`].
//!
//! ## Quick Start
//!
//! ```rust
//! use microadapt_engine::{EngineConfig, MicroAdaptEngine};
//!
//! let config = EngineConfig::default().with_window_length(16);
//! let mut engine = MicroAdaptEngine::new(config).unwrap();
//! for i in 0..64 {
//!     engine.update(&[i as f64]).unwrap();
//! }
//! let forecast = engine.forecast(4).unwrap();
//! assert_eq!(forecast.forecast_values.len(), 4);
//! assert!(engine.get_statistics().num_model_units >= 1);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod forecaster;
pub mod pool;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod window;

pub use config::{DistanceMetric, EngineConfig, EvictionPolicy, FitStrategy};
pub use dynamics::{DimensionDynamics, DynamicsKind, FitOutcome, LocalDynamics, LocalDynamicsFitter};
pub use engine::MicroAdaptEngine;
pub use error::{EngineError, EngineResult};
pub use forecaster::Forecaster;
pub use pool::{MatchKind, MatchOutcome, ModelUnit, PoolSnapshot, RegimeModelPool};
pub use snapshot::{
    EngineSnapshot, InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore,
    SNAPSHOT_SCHEMA_VERSION,
};
pub use state::EngineState;
pub use types::{
    EngineStatsSnapshot, ForecastResult, Lifecycle, ModelUnitId, UncertaintyBand, WindowView,
};
pub use window::{HierarchicalWindow, WindowLevel, WindowSnapshot};
