//! Property tests: a snapshot restore is indistinguishable from the original engine.

use microadapt_engine::{EngineConfig, EngineSnapshot, MicroAdaptEngine};
use proptest::prelude::*;

fn arb_rows() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..4).prop_flat_map(|dim| {
        prop::collection::vec(prop::collection::vec(-50.0f64..50.0, dim), 0..120)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn restore_preserves_behaviour(
        window in 2usize..8,
        levels in 1usize..4,
        max_units in 1usize..5,
        rows in arb_rows(),
        tail in prop::collection::vec(-50.0f64..50.0, 0..40),
    ) {
        let config = EngineConfig::default()
            .with_window_length(window)
            .with_levels(levels)
            .with_max_model_units(max_units);
        let mut original = MicroAdaptEngine::new(config).unwrap();
        for row in &rows {
            original.update(row).unwrap();
        }

        let json = original.snapshot().to_json().unwrap();
        let mut restored = MicroAdaptEngine::restore(EngineSnapshot::from_json(&json).unwrap()).unwrap();
        prop_assert_eq!(restored.get_statistics(), original.get_statistics());
        prop_assert_eq!(restored.forecast(3).ok(), original.forecast(3).ok());

        let dim = rows.first().map_or(1, Vec::len);
        for v in tail {
            let row = vec![v; dim];
            original.update(&row).unwrap();
            restored.update(&row).unwrap();
        }
        prop_assert_eq!(restored.get_statistics(), original.get_statistics());
        prop_assert_eq!(restored.model_units(), original.model_units());
    }
}
