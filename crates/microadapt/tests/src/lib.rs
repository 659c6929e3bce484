//! Shared fixtures for the MicroAdapt scenario and property suites.

use microadapt_engine::{EngineConfig, MicroAdaptEngine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Compact configuration used by most scenarios.
pub fn config(window: usize, levels: usize, max_units: usize) -> EngineConfig {
    EngineConfig::default()
        .with_window_length(window)
        .with_levels(levels)
        .with_max_model_units(max_units)
}

pub fn engine(config: EngineConfig) -> MicroAdaptEngine {
    MicroAdaptEngine::new(config).expect("valid test config")
}

/// Feed scalar values, panicking on any rejected update.
pub fn feed(engine: &mut MicroAdaptEngine, values: impl IntoIterator<Item = f64>) {
    for v in values {
        engine.update(&[v]).expect("update accepted");
    }
}

/// Feed multivariate rows.
pub fn feed_rows(engine: &mut MicroAdaptEngine, rows: impl IntoIterator<Item = Vec<f64>>) {
    for row in rows {
        engine.update(&row).expect("update accepted");
    }
}

pub fn sine(n: usize, freq: f64) -> Vec<f64> {
    (0..n).map(|i| (freq * i as f64).sin()).collect()
}

pub fn cosine(n: usize, freq: f64) -> Vec<f64> {
    (0..n).map(|i| (freq * i as f64).cos()).collect()
}

pub fn ramp(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// `n` rows of a seeded noisy multivariate oscillation.
pub fn noisy_rows(seed: u64, n: usize, dim: usize, noise: f64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            (0..dim)
                .map(|d| {
                    let clean = (0.15 * i as f64 + d as f64).sin() * (1.0 + d as f64);
                    clean + rng.gen_range(-noise..=noise)
                })
                .collect()
        })
        .collect()
}

/// Alternating flat segments at `low` and `high`, each `segment` points long.
pub fn alternating(segments: usize, segment: usize, low: f64, high: f64) -> Vec<f64> {
    (0..segments)
        .flat_map(|s| {
            let level = if s % 2 == 0 { low } else { high };
            std::iter::repeat(level).take(segment)
        })
        .collect()
}
