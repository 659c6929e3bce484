//! E2E: snapshot persistence and restore.

use microadapt_engine::{
    EngineError, EngineSnapshot, InMemorySnapshotStore, JsonFileSnapshotStore, MicroAdaptEngine,
    SnapshotStore, SNAPSHOT_SCHEMA_VERSION,
};
use microadapt_tests::*;

fn trained_engine() -> MicroAdaptEngine {
    let mut e = engine(config(12, 3, 4));
    feed_rows(&mut e, noisy_rows(21, 300, 2, 0.1));
    e
}

#[test]
fn restored_engine_matches_original() {
    let mut original = trained_engine();
    let store = InMemorySnapshotStore::new();
    store.save(&original.snapshot()).unwrap();
    let mut restored = MicroAdaptEngine::restore(store.load().unwrap().unwrap()).unwrap();

    assert_eq!(restored.get_statistics(), original.get_statistics());
    assert_eq!(restored.model_units(), original.model_units());
    assert_eq!(restored.current_window(), original.current_window());
    assert_eq!(restored.forecast(10).unwrap(), original.forecast(10).unwrap());

    // Both continue identically on new data.
    for row in noisy_rows(22, 150, 2, 0.3) {
        original.update(&row).unwrap();
        restored.update(&row).unwrap();
    }
    assert_eq!(restored.get_statistics(), original.get_statistics());
    assert_eq!(restored.forecast(5).unwrap(), original.forecast(5).unwrap());
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileSnapshotStore::new(dir.path().join("engine.json"));
    assert!(store.load().unwrap().is_none());

    let original = trained_engine();
    store.save(&original.snapshot()).unwrap();
    let restored = MicroAdaptEngine::restore(store.load().unwrap().unwrap()).unwrap();
    assert_eq!(restored.get_statistics(), original.get_statistics());
    assert_eq!(restored.forecast(4).unwrap(), original.forecast(4).unwrap());
}

#[test]
fn newer_schema_version_is_rejected() {
    let snapshot = trained_engine().snapshot();
    let mut value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    value["schema_version"] = serde_json::json!(SNAPSHOT_SCHEMA_VERSION + 1);

    let err = EngineSnapshot::from_json(&value.to_string()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnsupportedSnapshotVersion { found, supported }
            if found == SNAPSHOT_SCHEMA_VERSION + 1 && supported == SNAPSHOT_SCHEMA_VERSION
    ));

    let mut direct = snapshot;
    direct.schema_version = 7;
    assert!(matches!(
        MicroAdaptEngine::restore(direct),
        Err(EngineError::UnsupportedSnapshotVersion { found: 7, .. })
    ));
}

#[test]
fn tampered_snapshot_is_rejected() {
    let original = trained_engine();

    let mut oversized = original.snapshot();
    oversized.config.max_model_units = 1;
    if oversized.pool.units.len() > 1 {
        assert!(matches!(
            MicroAdaptEngine::restore(oversized),
            Err(EngineError::Snapshot(_))
        ));
    }

    let mut dangling = original.snapshot();
    dangling.state.current_model_unit_id = Some(microadapt_engine::ModelUnitId(u64::MAX));
    assert!(matches!(
        MicroAdaptEngine::restore(dangling),
        Err(EngineError::Snapshot(_))
    ));

    let mut reshaped = original.snapshot();
    reshaped.config.base_window_length += 1;
    assert!(matches!(
        MicroAdaptEngine::restore(reshaped),
        Err(EngineError::Snapshot(_))
    ));
}

#[test]
fn corrupted_window_capacity_in_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&trained_engine().snapshot().to_json().unwrap()).unwrap();
    value["window"]["capacity"] = serde_json::json!(usize::MAX / 4);
    std::fs::write(&path, value.to_string()).unwrap();

    let snapshot = JsonFileSnapshotStore::new(path.clone()).load().unwrap().unwrap();
    assert!(matches!(
        MicroAdaptEngine::restore(snapshot),
        Err(EngineError::Snapshot(_))
    ));
}

#[test]
fn cold_snapshot_restores_cold() {
    let mut e = engine(config(12, 3, 4));
    feed(&mut e, [1.0, 2.0, 3.0]);
    let restored = MicroAdaptEngine::restore(e.snapshot()).unwrap();
    assert!(matches!(
        restored.forecast(1),
        Err(EngineError::InsufficientHistory { received: 3, .. })
    ));
}
