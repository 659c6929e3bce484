//! E2E: forecast quality, determinism, clamping and degraded fits.

use microadapt_engine::{EngineConfig, EngineError, FitStrategy};
use microadapt_tests::*;

#[test]
fn ramp_forecast_has_unit_slope() {
    let mut e = engine(EngineConfig::default());
    feed(&mut e, ramp(50));

    let out = e.forecast(5).unwrap();
    assert_eq!(out.forecast_horizon, 5);
    assert_eq!(out.dimension(), 1);

    let mut prev = 49.0;
    for h in 1..=5 {
        let v = out.step(h).unwrap()[0];
        assert!(((v - prev) - 1.0).abs() < 0.1, "step {} slope {}", h, v - prev);
        prev = v;
    }
}

#[test]
fn oscillation_is_continued() {
    let freq = 0.35;
    let mut e = engine(config(24, 3, 4).with_fit_strategy(FitStrategy::Oscillator));
    feed(&mut e, sine(200, freq));

    let out = e.forecast(6).unwrap();
    for h in 1..=6 {
        let expected = (freq * (199 + h) as f64).sin();
        let got = out.step(h).unwrap()[0];
        assert!((got - expected).abs() < 1e-3, "h={} got {} expected {}", h, got, expected);
    }
}

#[test]
fn identical_input_gives_identical_forecasts() {
    let rows = noisy_rows(99, 600, 3, 0.2);
    let run = || {
        let mut e = engine(config(16, 4, 5));
        let mut forecasts = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            e.update(row).unwrap();
            if i >= 16 && i % 50 == 0 {
                forecasts.push(e.forecast(8).unwrap());
            }
        }
        (forecasts, e.get_statistics(), e.model_units())
    };
    assert_eq!(run(), run());
}

#[test]
fn forecasts_never_leave_the_clamp_envelope() {
    let factor = 0.5;
    let mut config = config(10, 2, 4).with_fit_strategy(FitStrategy::Linear);
    config.clamp_range_factor = factor;
    let mut e = engine(config);
    // Sharp acceleration at the end pushes a linear model far outside the window.
    feed(&mut e, ramp(40).into_iter().map(|v| v * v));

    let window = e.current_window();
    let (min, max) = window
        .values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;

    let out = e.forecast(200).unwrap();
    assert!(out.clamped);
    for row in &out.forecast_values {
        assert!(row[0] <= max + factor * span + 1e-9);
        assert!(row[0] >= min - factor * span - 1e-9);
    }
}

#[test]
fn uncertainty_band_brackets_forecast() {
    let mut config = config(16, 2, 4);
    config.uncertainty_z = Some(1.96);
    let mut e = engine(config);
    feed_rows(&mut e, noisy_rows(5, 200, 2, 0.1));

    let out = e.forecast(10).unwrap();
    let band = out.uncertainty.as_ref().expect("band enabled");
    for h in 0..10 {
        for d in 0..2 {
            assert!(band.lower[h][d] <= out.forecast_values[h][d]);
            assert!(band.upper[h][d] >= out.forecast_values[h][d]);
        }
    }
}

#[test]
fn constant_stream_counts_degraded_fits_without_errors() {
    let w = 16;
    let mut e = engine(config(w, 3, 4));
    feed(&mut e, std::iter::repeat(3.0).take(100));

    let stats = e.get_statistics();
    assert_eq!(stats.degraded_fits, (100 - w + 1) as u64);
    assert_eq!(stats.num_model_units, 1);
    let out = e.forecast(4).unwrap();
    assert!(out.forecast_values.iter().all(|r| (r[0] - 3.0).abs() < 1e-9));
}

#[test]
fn search_and_forecast_uses_the_supplied_window() {
    let w = 16;
    let mut e = engine(config(w, 3, 6));
    feed(&mut e, sine(w * 6, 0.3));
    feed(&mut e, ramp(w * 4).into_iter().map(|v| 5.0 + 0.5 * v));
    let before = e.get_statistics();

    // A ramp-shaped query anchored well above anything seen.
    let query: Vec<f64> = (0..w).map(|i| 100.0 + i as f64).collect();
    let out = e.search_and_forecast(&query, 3).unwrap();
    assert_eq!(out.forecast_values.len(), 3);
    // The anchor is the query itself, so values stay near its range.
    for row in &out.forecast_values {
        assert!(row[0] > 90.0);
    }
    assert_eq!(e.get_statistics(), before);
}

#[test]
fn multivariate_forecast_shape() {
    let mut e = engine(config(12, 3, 4));
    feed_rows(&mut e, noisy_rows(1, 100, 4, 0.05));
    let out = e.forecast(7).unwrap();
    assert_eq!(out.forecast_values.len(), 7);
    assert!(out.forecast_values.iter().all(|r| r.len() == 4));
    assert!(out.forecast_values.iter().flatten().all(|v| v.is_finite()));
}

#[test]
fn oversized_horizon_is_an_error() {
    let w = 8;
    let mut e = engine(config(w, 2, 4).with_max_forecast_horizon(32));
    feed(&mut e, sine(40, 0.4));

    assert_eq!(e.forecast(32).unwrap().forecast_values.len(), 32);
    assert!(matches!(e.forecast(33), Err(EngineError::InvalidInput(_))));
    assert!(matches!(
        e.forecast(usize::MAX),
        Err(EngineError::InvalidInput(_))
    ));

    let window = sine(w, 0.4);
    assert!(matches!(
        e.search_and_forecast(&window, usize::MAX),
        Err(EngineError::InvalidInput(_))
    ));
    assert_eq!(e.get_statistics().total_updates, 40);
}
