//! E2E: COLD → WARM lifecycle, hierarchical window fill and input validation.

use microadapt_engine::{EngineConfig, EngineError, Lifecycle};
use microadapt_tests::*;

#[test]
fn forecast_fails_until_window_is_full() {
    let mut e = engine(config(16, 3, 4));
    assert!(matches!(
        e.forecast(1),
        Err(EngineError::InsufficientHistory {
            received: 0,
            required: 16
        })
    ));

    for (i, v) in ramp(15).into_iter().enumerate() {
        e.update(&[v]).unwrap();
        match e.forecast(4) {
            Err(EngineError::InsufficientHistory { received, required }) => {
                assert_eq!(received, i as u64 + 1);
                assert_eq!(required, 16);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
        assert!(matches!(
            e.search_and_forecast(&[0.0; 16], 4),
            Err(EngineError::InsufficientHistory { .. })
        ));
        assert_eq!(e.lifecycle(), Lifecycle::Cold);
    }
}

#[test]
fn warm_after_exactly_base_window_length_updates() {
    let mut e = engine(config(16, 3, 4));
    feed(&mut e, ramp(16));

    let stats = e.get_statistics();
    assert_eq!(stats.lifecycle, Lifecycle::Warm);
    assert_eq!(stats.current_time, 16);
    assert_eq!(stats.total_updates, 16);
    assert_eq!(stats.num_model_units, 1);
    assert!(e.forecast(3).is_ok());
    assert!(!e.current_window().cold);
}

#[test]
fn top_level_fills_after_w_times_two_to_the_l() {
    let mut e = engine(config(4, 3, 4));
    feed(&mut e, ramp(15));
    assert_eq!(e.window().level(2).unwrap().len(), 3);
    feed(&mut e, [15.0]);
    assert_eq!(e.window().level(2).unwrap().len(), 4);
    assert!(e.window().level(2).unwrap().is_full());
    // Means of raw blocks of four: (0+1+2+3)/4, ...
    let top: Vec<f64> = e.window().level(2).unwrap().rows().map(|r| r[0]).collect();
    assert_eq!(top, vec![1.5, 5.5, 9.5, 13.5]);
}

#[test]
fn default_config_top_level_fill() {
    let config = EngineConfig::default();
    let w = config.base_window_length;
    let top = config.num_hierarchical_levels - 1;
    let needed = w * (1 << top);

    let mut e = engine(config);
    feed(&mut e, sine(needed - 1, 0.1));
    assert_eq!(e.window().level(top).unwrap().len(), w - 1);
    feed(&mut e, [0.0]);
    assert_eq!(e.window().level(top).unwrap().len(), w);
}

#[test]
fn data_stream_length_is_bounded_by_retained_span() {
    let mut e = engine(config(4, 3, 4));
    feed(&mut e, ramp(16));
    assert_eq!(e.get_statistics().data_stream_length, 16);
    feed(&mut e, ramp(84));
    let stats = e.get_statistics();
    assert_eq!(stats.total_updates, 100);
    assert_eq!(stats.data_stream_length, 16);
}

#[test]
fn dimension_mismatch_leaves_engine_unchanged() {
    let mut e = engine(config(8, 2, 4));
    feed_rows(&mut e, noisy_rows(3, 20, 3, 0.05));

    let stats = e.get_statistics();
    let window = e.window().to_snapshot();
    let units = e.model_units();
    let forecast = e.forecast(4).unwrap();

    for bad in [vec![1.0, 2.0], vec![1.0, 2.0, 3.0, 4.0]] {
        assert!(matches!(
            e.update(&bad),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }
    assert!(matches!(e.update(&[]), Err(EngineError::InvalidConfiguration(_))));

    assert_eq!(e.get_statistics(), stats);
    assert_eq!(e.window().to_snapshot(), window);
    assert_eq!(e.model_units(), units);
    assert_eq!(e.forecast(4).unwrap(), forecast);
}

#[test]
fn invalid_configurations_are_rejected() {
    for config in [
        EngineConfig::default().with_window_length(0),
        EngineConfig::default().with_max_model_units(0),
        EngineConfig::default().with_novelty_threshold(-1.0),
        EngineConfig::default().with_novelty_threshold(f64::NAN),
    ] {
        assert!(matches!(
            microadapt_engine::MicroAdaptEngine::new(config),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn reset_starts_over() {
    let mut e = engine(config(8, 2, 4));
    feed(&mut e, sine(40, 0.3));
    e.reset().unwrap();
    assert_eq!(e.lifecycle(), Lifecycle::Cold);
    assert_eq!(e.get_statistics().total_updates, 0);
    assert!(e.model_units().is_empty());
    feed(&mut e, sine(8, 0.3));
    assert_eq!(e.lifecycle(), Lifecycle::Warm);
}
