//! `RunCounters` and the atomic stats file (§4.7, §9).
//!
//! Write-temp-fsync-rename, grounded in the teacher's durable authority
//! marker: write the new content to a sibling temp path, fsync it, rename
//! over the target, then fsync the parent directory.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document_replicator::WatermarkStore;
use crate::error::EngineResult;

/// Cumulative auth-replication sub-counter (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthCounters {
    #[serde(rename = "totalUsers")]
    pub total_users: usize,
    #[serde(rename = "syncedUsers")]
    pub synced_users: usize,
    #[serde(rename = "customClaimsPropagated")]
    pub custom_claims_propagated: usize,
    #[serde(rename = "authErrors")]
    pub auth_errors: usize,
    #[serde(rename = "lastAuthRunAt")]
    pub last_auth_run_at: Option<DateTime<Utc>>,
}

/// Cumulative document-replication counters, persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunCounters {
    #[serde(rename = "totalDocumentsWritten")]
    pub total_documents_written: u64,
    #[serde(rename = "duplicatesSkipped")]
    pub duplicates_skipped: u64,
    pub errors: u64,
    #[serde(rename = "incrementalRunCount")]
    pub incremental_run_count: u64,
    #[serde(rename = "lastRunAt")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastFullRunAt")]
    pub last_full_run_at: Option<DateTime<Utc>>,
    pub auth: AuthCounters,
}

/// The full on-disk shape of `stats.json` (§6 — "one JSON file ... plus a
/// nested object `watermarks` ... and `authWatermark`").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(flatten)]
    pub counters: RunCounters,
    pub watermarks: WatermarkStore,
    #[serde(rename = "authWatermark", skip_serializing_if = "Option::is_none")]
    pub auth_watermark: Option<String>,
}

/// Owns the stats file path and performs atomic read/write.
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted state, or a zero-value default if the file is
    /// missing or cannot be parsed (§8 — "malformed or missing stats.json is
    /// treated as start from zero, not a startup error").
    pub fn load(&self) -> PersistedState {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => PersistedState::default(),
        }
    }

    /// Persists `state` atomically: write temp, fsync, rename, fsync parent.
    pub fn save(&self, state: &PersistedState) -> EngineResult<()> {
        let content = serde_json::to_string_pretty(state)?;

        let temp_path = self.temp_path();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.path)?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(if parent.as_os_str().is_empty() { Path::new(".") } else { parent }) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self.path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "stats.json".to_string());
        self.path.with_file_name(format!("{file_name}.tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_write_then_rename() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));

        let mut state = PersistedState::default();
        state.counters.total_documents_written = 42;
        state.watermarks.advance("appointments", crate::document_replicator::Direction::Forward, "2024-01-01T00:00:00Z");

        store.save(&state).unwrap();
        let loaded = store.load();

        assert_eq!(loaded.counters.total_documents_written, 42);
        assert_eq!(
            loaded.watermarks.get("appointments", crate::document_replicator::Direction::Forward),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn missing_file_loads_as_zero_state() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("does-not-exist.json"));

        let loaded = store.load();
        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn malformed_file_loads_as_zero_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "not json").unwrap();

        let store = StatsStore::new(path);
        let loaded = store.load();
        assert_eq!(loaded, PersistedState::default());
    }

    #[test]
    fn temp_file_is_cleaned_up_by_rename() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));
        store.save(&PersistedState::default()).unwrap();

        assert!(!store.temp_path().exists());
        assert!(dir.path().join("stats.json").exists());
    }
}
