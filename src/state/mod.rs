//! Rotation state persistence.
//!
//! `StateStore` owns the per-repository [`RotationState`] records. It serializes
//! them as JSON and hands the bytes to a [`BlobStore`] backend, which only
//! knows how to get and put named blobs. Backends:
//!
//! | Backend  | Where blobs live                               |
//! |----------|------------------------------------------------|
//! | `local`  | files under a state directory                  |
//! | `gcs`    | objects in a Google Cloud Storage bucket       |
//! | `memory` | a `HashMap`, for tests                         |

mod gcs;
mod local;
mod memory;

pub use gcs::GcsBlobStore;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{StorageConfig, StorageType};
use crate::errors::StateError;
use crate::selector::Selection;

/// Blob holding the summary of the most recent non-dry run.
pub const RUN_SUMMARY_BLOB: &str = "last_run.json";

/// Durable rotation history for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Repository path (`namespace/name`).
    pub repository: String,
    /// Reviewers chosen by the most recent rotation.
    #[serde(default)]
    pub last_selected: Vec<String>,
    /// Reviewers still waiting for a turn in the current cycle, in draw order.
    #[serde(default)]
    pub pending: Vec<String>,
    /// The pool as of the last selection. Used to detect newcomers.
    #[serde(default)]
    pub known_pool: Vec<String>,
    /// Number of cycles started so far.
    #[serde(default)]
    pub cycle: u64,
    /// Rotation epoch of the last advance.
    #[serde(default)]
    pub epoch: i64,
    pub updated_at: DateTime<Utc>,
}

impl RotationState {
    /// State for a repository that has never been rotated.
    pub fn empty(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            last_selected: Vec::new(),
            pending: Vec::new(),
            known_pool: Vec::new(),
            cycle: 0,
            epoch: i64::MIN,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// True when no rotation has ever been committed for this repository.
    pub fn is_fresh(&self) -> bool {
        self.last_selected.is_empty() && self.known_pool.is_empty()
    }

    /// The state after committing `selection` in `epoch`.
    pub fn advanced(&self, selection: &Selection, epoch: i64, now: DateTime<Utc>) -> Self {
        Self {
            repository: self.repository.clone(),
            last_selected: selection.reviewers.clone(),
            pending: selection.pending.clone(),
            known_pool: selection.known_pool.clone(),
            cycle: self.cycle + selection.cycles_started,
            epoch,
            updated_at: now,
        }
    }
}

/// Outcome summary of the most recent non-dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
}

/// Named-blob storage backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob, returning `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Create or replace a blob.
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StateError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Typed access to rotation state on top of a blob backend.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn BlobStore>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        Self { backend }
    }

    /// Build the backend selected in configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self, crate::errors::ConfigError> {
        let backend: Arc<dyn BlobStore> = match config.storage_type {
            StorageType::Local => Arc::new(LocalBlobStore::new(config.state_dir.clone())),
            StorageType::Gcs => {
                let bucket = config.bucket.clone().ok_or_else(|| {
                    crate::errors::ConfigError::Missing("storage.bucket".to_string())
                })?;
                Arc::new(GcsBlobStore::new(
                    bucket,
                    config.prefix.clone(),
                    config.token.clone().unwrap_or_default(),
                ))
            }
        };
        Ok(Self::new(backend))
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Blob name for a repository's state.
    pub fn state_blob_name(repository: &str) -> String {
        format!("repos/{}.json", repository.trim_matches('/'))
    }

    /// Load state for a repository, `None` if it was never rotated.
    pub async fn get_state(&self, repository: &str) -> Result<Option<RotationState>, StateError> {
        let name = Self::state_blob_name(repository);
        let Some(bytes) = self.backend.get(&name).await? else {
            debug!(repository, blob = %name, "No rotation state found");
            return Ok(None);
        };
        let state = serde_json::from_slice(&bytes)
            .map_err(|source| StateError::Decode { name, source })?;
        Ok(Some(state))
    }

    pub async fn put_state(
        &self,
        repository: &str,
        state: &RotationState,
    ) -> Result<(), StateError> {
        let name = Self::state_blob_name(repository);
        let bytes = serde_json::to_vec_pretty(state).map_err(|source| StateError::Encode {
            name: name.clone(),
            source,
        })?;
        self.backend.put(&name, bytes).await?;
        info!(repository, blob = %name, "Saved rotation state");
        Ok(())
    }

    pub async fn get_run_summary(&self) -> Result<Option<RunSummary>, StateError> {
        let Some(bytes) = self.backend.get(RUN_SUMMARY_BLOB).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StateError::Decode {
                name: RUN_SUMMARY_BLOB.to_string(),
                source,
            })
    }

    pub async fn put_run_summary(&self, summary: &RunSummary) -> Result<(), StateError> {
        let bytes = serde_json::to_vec_pretty(summary).map_err(|source| StateError::Encode {
            name: RUN_SUMMARY_BLOB.to_string(),
            source,
        })?;
        self.backend.put(RUN_SUMMARY_BLOB, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(reviewers: &[&str], pending: &[&str], cycles: u64) -> Selection {
        Selection {
            reviewers: reviewers.iter().map(|s| s.to_string()).collect(),
            pending: pending.iter().map(|s| s.to_string()).collect(),
            known_pool: vec!["a".into(), "b".into(), "c".into()],
            cycles_started: cycles,
        }
    }

    #[test]
    fn test_empty_state_is_fresh() {
        let state = RotationState::empty("group/app");
        assert!(state.is_fresh());
        assert_eq!(state.repository, "group/app");
    }

    #[test]
    fn test_advanced_accumulates_cycles() {
        let now = Utc::now();
        let mut state = RotationState::empty("group/app");
        state.cycle = 2;
        let next = state.advanced(&selection(&["a", "b"], &["c"], 1), 42, now);
        assert_eq!(next.last_selected, vec!["a", "b"]);
        assert_eq!(next.pending, vec!["c"]);
        assert_eq!(next.cycle, 3);
        assert_eq!(next.epoch, 42);
        assert_eq!(next.updated_at, now);
        assert!(!next.is_fresh());
    }

    #[test]
    fn test_state_blob_name_nests_namespace() {
        assert_eq!(
            StateStore::state_blob_name("group/sub/app"),
            "repos/group/sub/app.json"
        );
    }

    #[test]
    fn test_state_deserializes_with_missing_optional_fields() {
        let json = r#"{"repository":"group/app","updated_at":"2026-01-01T00:00:00Z"}"#;
        let state: RotationState = serde_json::from_str(json).unwrap();
        assert!(state.pending.is_empty());
        assert_eq!(state.epoch, 0);
    }

    #[tokio::test]
    async fn test_state_round_trip_through_memory_backend() {
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        assert!(store.get_state("group/app").await.unwrap().is_none());

        let state = RotationState::empty("group/app").advanced(
            &selection(&["a", "b"], &["c"], 0),
            7,
            Utc::now(),
        );
        store.put_state("group/app", &state).await.unwrap();

        let loaded = store.get_state("group/app").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(store.get_state("group/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_decode_error() {
        let backend = Arc::new(MemoryBlobStore::new());
        backend.insert("repos/group/app.json", b"not json".to_vec());
        let store = StateStore::new(backend);
        let err = store.get_state("group/app").await.unwrap_err();
        assert!(matches!(err, StateError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_run_summary_round_trip() {
        let store = StateStore::new(Arc::new(MemoryBlobStore::new()));
        assert!(store.get_run_summary().await.unwrap().is_none());
        let summary = RunSummary {
            timestamp: Utc::now(),
            updated: vec!["group/a".into()],
            unchanged: vec![],
            failed: vec!["group/b".into()],
        };
        store.put_run_summary(&summary).await.unwrap();
        assert_eq!(store.get_run_summary().await.unwrap(), Some(summary));
    }
}
