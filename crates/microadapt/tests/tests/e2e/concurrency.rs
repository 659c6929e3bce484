//! E2E: independent engines across threads and shared read access.

use std::sync::{Arc, RwLock};

use microadapt_engine::{EngineError, MicroAdaptEngine};
use microadapt_tests::*;

fn run_stream(seed: u64) -> (microadapt_engine::EngineStatsSnapshot, Vec<Vec<f64>>) {
    let mut e = engine(config(16, 3, 4));
    feed_rows(&mut e, noisy_rows(seed, 400, 2, 0.2));
    (e.get_statistics(), e.forecast(6).unwrap().forecast_values)
}

#[test]
fn engines_on_separate_threads_are_independent() {
    let sequential: Vec<_> = (0..4).map(run_stream).collect();

    let parallel: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4u64).map(|seed| s.spawn(move || run_stream(seed))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(parallel, sequential);
}

#[test]
fn readers_share_an_engine_behind_a_rwlock() {
    let shared = Arc::new(RwLock::new(engine(config(16, 3, 4))));
    let rows = noisy_rows(8, 500, 1, 0.1);

    std::thread::scope(|s| {
        let writer = Arc::clone(&shared);
        s.spawn(move || {
            for row in &rows {
                writer.write().unwrap().update(row).unwrap();
            }
        });

        for _ in 0..3 {
            let reader = Arc::clone(&shared);
            s.spawn(move || {
                for _ in 0..200 {
                    let guard = reader.read().unwrap();
                    let stats = guard.get_statistics();
                    assert!(stats.num_model_units <= 4);
                    match guard.forecast(3) {
                        Ok(out) => assert_eq!(out.forecast_values.len(), 3),
                        Err(EngineError::InsufficientHistory { received, .. }) => {
                            assert!(received < 16)
                        }
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            });
        }
    });

    let engine: MicroAdaptEngine = Arc::try_unwrap(shared).unwrap().into_inner().unwrap();
    assert_eq!(engine.get_statistics().total_updates, 500);
}
