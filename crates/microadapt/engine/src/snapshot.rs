//! Versioned engine snapshots and their persistence.
//!
//! An [`EngineSnapshot`] captures every window level buffer, the full regime
//! pool and the engine counters, so a restored engine continues exactly where
//! the original stopped. Stores never run inside `update`; callers decide when
//! to persist.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::pool::PoolSnapshot;
use crate::state::EngineState;
use crate::window::WindowSnapshot;

/// Current snapshot layout. Readers accept this version and older.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Complete serializable engine state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub schema_version: u32,
    pub captured_at: DateTime<Utc>,
    pub config: EngineConfig,
    pub window: WindowSnapshot,
    pub pool: PoolSnapshot,
    pub state: EngineState,
}

impl EngineSnapshot {
    /// Compact JSON encoding.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Snapshot(format!("serialization failed: {}", e)))
    }

    pub fn to_json_pretty(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Snapshot(format!("serialization failed: {}", e)))
    }

    /// Decode a snapshot, checking the schema version before the body.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| EngineError::Snapshot(format!("malformed JSON: {}", e)))?;

        let version = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| EngineError::Snapshot("missing schema_version".into()))?;
        check_version(u32::try_from(version).unwrap_or(u32::MAX))?;

        serde_json::from_value(value)
            .map_err(|e| EngineError::Snapshot(format!("deserialization failed: {}", e)))
    }
}

pub(crate) fn check_version(found: u32) -> EngineResult<()> {
    if found == 0 || found > SNAPSHOT_SCHEMA_VERSION {
        return Err(EngineError::UnsupportedSnapshotVersion {
            found,
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Somewhere to keep the latest engine snapshot between restarts.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> EngineResult<Option<EngineSnapshot>>;
}

/// Snapshot stored as a single JSON file.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so an
/// interrupted save never leaves a truncated snapshot behind.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    /// Store snapshots at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file of this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()> {
        let json = snapshot.to_json_pretty()?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load(&self) -> EngineResult<Option<EngineSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        EngineSnapshot::from_json(&contents).map(Some)
    }
}

/// In-memory store (for testing). Keeps the encoded form so loads exercise decoding.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    data: Mutex<Option<String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()> {
        let json = snapshot.to_json()?;
        let mut data = self
            .data
            .lock()
            .map_err(|_| EngineError::Persistence("snapshot store lock poisoned".into()))?;
        *data = Some(json);
        Ok(())
    }

    fn load(&self) -> EngineResult<Option<EngineSnapshot>> {
        let data = self
            .data
            .lock()
            .map_err(|_| EngineError::Persistence("snapshot store lock poisoned".into()))?;
        data.as_deref().map(EngineSnapshot::from_json).transpose()
    }
}
