//! Seeded synthetic workload: a stream that cycles through known regimes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Regime the generator is currently emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRegime {
    Sine,
    Cosine,
    Ramp,
}

impl SignalRegime {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Cosine => "cosine",
            Self::Ramp => "ramp",
        }
    }

    fn next(self) -> Self {
        match self {
            Self::Sine => Self::Cosine,
            Self::Cosine => Self::Ramp,
            Self::Ramp => Self::Sine,
        }
    }
}

/// Deterministic generator for a `dim`-dimensional regime-switching stream.
///
/// Each regime lasts `segment_len` points; dimension `d` is phase-shifted and
/// scaled so components are not identical. Noise is uniform in `±noise`.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    rng: StdRng,
    dim: usize,
    segment_len: usize,
    noise: f64,
    regime: SignalRegime,
    t: usize,
    ramp_origin: Vec<f64>,
}

impl SignalGenerator {
    pub fn new(seed: u64, dim: usize, segment_len: usize, noise: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dim: dim.max(1),
            segment_len: segment_len.max(1),
            noise: noise.abs(),
            regime: SignalRegime::Sine,
            t: 0,
            ramp_origin: vec![0.0; dim.max(1)],
        }
    }

    pub fn regime(&self) -> SignalRegime {
        self.regime
    }

    pub fn next_point(&mut self) -> Vec<f64> {
        if self.t > 0 && self.t % self.segment_len == 0 {
            self.regime = self.regime.next();
        }
        let local = (self.t % self.segment_len) as f64;
        let t = self.t as f64;

        let mut point = Vec::with_capacity(self.dim);
        for d in 0..self.dim {
            let scale = 1.0 + 0.5 * d as f64;
            let phase = 0.7 * d as f64;
            let clean = match self.regime {
                SignalRegime::Sine => scale * (0.2 * t + phase).sin(),
                SignalRegime::Cosine => scale * (0.45 * t + phase).cos(),
                SignalRegime::Ramp => {
                    if local == 0.0 {
                        self.ramp_origin[d] = scale * (0.45 * t + phase).cos();
                    }
                    self.ramp_origin[d] + 0.05 * scale * local
                }
            };
            let noise = if self.noise > 0.0 {
                self.rng.gen_range(-self.noise..=self.noise)
            } else {
                0.0
            };
            point.push(clean + noise);
        }
        self.t += 1;
        point
    }
}

impl Iterator for SignalGenerator {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_point())
    }
}
