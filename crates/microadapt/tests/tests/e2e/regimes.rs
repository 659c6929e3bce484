//! E2E: regime segmentation, pool capacity and eviction.

use microadapt_engine::{EvictionPolicy, ModelUnitId};
use microadapt_tests::*;

#[test]
fn sine_then_cosine_produces_transitions() {
    let w = 16;
    let k = 8;
    let mut e = engine(config(w, 3, 6));
    feed(&mut e, sine(w * k, 0.3));
    feed(&mut e, cosine(w * k, 0.9).into_iter().map(|v| 3.0 * v));

    let stats = e.get_statistics();
    assert!(stats.regime_transitions >= 1);
    assert!(stats.num_model_units >= 2);
    assert!(stats.num_model_units <= 6);
    assert_eq!(stats.total_updates, (2 * w * k) as u64);
}

#[test]
fn equal_volume_sine_then_cosine_transitions() {
    let w = 16;
    let k = 8;
    let mut e = engine(config(w, 3, 8));
    feed(&mut e, sine(w * k, 0.3));
    let after_sine = e.get_statistics();
    feed(&mut e, cosine(w * k, 0.3));

    let stats = e.get_statistics();
    assert!(stats.regime_transitions >= 1);
    assert!(stats.regime_transitions >= after_sine.regime_transitions);
    assert!(stats.num_model_units <= 8);
    assert_eq!(stats.total_updates, (2 * w * k) as u64);
    assert!(e.forecast(w).is_ok());
}

#[test]
fn pool_stays_bounded_on_long_streams() {
    let mut e = engine(config(8, 3, 3).with_novelty_threshold(0.05));
    for (i, row) in noisy_rows(17, 5_000, 2, 0.5).into_iter().enumerate() {
        e.update(&row).unwrap();
        if i % 97 == 0 {
            assert!(e.get_statistics().num_model_units <= 3);
        }
    }
    let stats = e.get_statistics();
    assert_eq!(stats.num_model_units, 3);
    assert!(stats.units_evicted > 0);
    assert_eq!(
        stats.units_created - stats.units_evicted,
        stats.num_model_units as u64
    );
}

#[test]
fn single_unit_pool_replaces_and_counts_transitions() {
    let w = 8;
    let mut e = engine(config(w, 2, 1));
    feed(&mut e, alternating(6, 2 * w, 0.0, 10.0));

    let stats = e.get_statistics();
    assert_eq!(stats.num_model_units, 1);
    // Each of the five level changes opens a new regime in the only slot.
    assert!(stats.regime_transitions >= 5);
    assert!(stats.units_evicted >= 5);

    let ids: Vec<ModelUnitId> = e.model_units().iter().map(|u| u.id).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(Some(ids[0]), stats.current_model_unit_id);
}

#[test]
fn recurring_regime_is_matched_not_recreated() {
    let w = 8;
    let mut e = engine(config(w, 2, 4));
    // Two well separated flat regimes, revisited several times.
    feed(&mut e, alternating(8, 3 * w, 0.0, 5.0));

    let stats = e.get_statistics();
    assert!(stats.regime_transitions >= 7);
    assert!(stats.num_model_units <= 4);

    // Both plateaus keep their unit across all four visits; transitional
    // windows are the ones that get evicted.
    let mut hits: Vec<u64> = e.model_units().iter().map(|u| u.hit_count).collect();
    hits.sort_unstable_by(|a, b| b.cmp(a));
    let per_visit = (3 * w - w + 1) as u64;
    assert!(hits[0] >= 3 * per_visit, "{:?}", hits);
    assert!(hits[1] >= 3 * per_visit, "{:?}", hits);
}

#[test]
fn eviction_policies_all_respect_capacity() {
    for policy in [
        EvictionPolicy::LeastFrequent,
        EvictionPolicy::LeastRecent,
        EvictionPolicy::Weighted {
            hit_weight: 1.0,
            recency_weight: 0.1,
        },
    ] {
        let mut e = engine(
            config(6, 2, 2)
                .with_eviction_policy(policy)
                .with_novelty_threshold(0.2),
        );
        feed(&mut e, alternating(12, 10, -4.0, 4.0));
        feed(&mut e, ramp(60));
        assert!(e.get_statistics().num_model_units <= 2, "{:?}", policy);
    }
}

#[test]
fn model_units_carry_fitted_dynamics() {
    let mut e = engine(config(12, 2, 4));
    feed(&mut e, sine(120, 0.4));
    for unit in e.model_units() {
        assert_eq!(unit.centroid.len(), 12);
        assert_eq!(unit.dynamics.dimension(), 1);
        assert!(unit.hit_count >= 1);
        assert!(unit.last_used_time >= unit.created_at);
    }
}
