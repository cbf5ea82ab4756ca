//! In-memory blob storage for tests and dry experiments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::BlobStore;
use crate::errors::StateError;

/// Blobs held in a `HashMap`. All state is lost when dropped.
///
/// Writes can be made to fail with [`MemoryBlobStore::fail_writes`], which lets
/// tests exercise the orchestrator's state-write failure path.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob directly, bypassing failure injection.
    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.lock().insert(name.to_string(), data);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.lock().get(name).cloned())
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StateError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateError::Write {
                name: name.to_string(),
                message: "write rejected".to_string(),
            });
        }
        self.lock().insert(name.to_string(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
