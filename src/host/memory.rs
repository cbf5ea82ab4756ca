//! In-memory source host for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::SourceHost;
use crate::errors::HostError;

/// A recorded `put_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub repository: String,
    pub path: String,
    pub branch: String,
    pub content: String,
    pub commit_message: String,
}

#[derive(Default)]
struct Inner {
    files: HashMap<(String, String, String), String>,
    default_branches: HashMap<String, String>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    writes: Vec<FileWrite>,
}

/// Files keyed by (repository, path, branch). Default branch is `main` unless
/// overridden. Reads or writes can be made to fail per repository.
#[derive(Default)]
pub struct MemoryHost {
    inner: Mutex<Inner>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_file(&self, repository: &str, path: &str, branch: &str, content: &str) {
        self.lock().files.insert(
            (repository.to_string(), path.to_string(), branch.to_string()),
            content.to_string(),
        );
    }

    pub fn file(&self, repository: &str, path: &str, branch: &str) -> Option<String> {
        self.lock()
            .files
            .get(&(repository.to_string(), path.to_string(), branch.to_string()))
            .cloned()
    }

    pub fn set_default_branch(&self, repository: &str, branch: &str) {
        self.lock()
            .default_branches
            .insert(repository.to_string(), branch.to_string());
    }

    pub fn fail_reads(&self, repository: &str) {
        self.lock().failing_reads.insert(repository.to_string());
    }

    pub fn fail_writes(&self, repository: &str) {
        self.lock().failing_writes.insert(repository.to_string());
    }

    pub fn heal(&self, repository: &str) {
        let mut inner = self.lock();
        inner.failing_reads.remove(repository);
        inner.failing_writes.remove(repository);
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<FileWrite> {
        self.lock().writes.clone()
    }
}

#[async_trait]
impl SourceHost for MemoryHost {
    async fn resolve_default_branch(&self, repository: &str) -> Result<String, HostError> {
        let inner = self.lock();
        if inner.failing_reads.contains(repository) {
            return Err(HostError::Rejected {
                repository: repository.to_string(),
                operation: "resolve default branch",
                reason: "unavailable".to_string(),
            });
        }
        Ok(inner
            .default_branches
            .get(repository)
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }

    async fn get_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, HostError> {
        let inner = self.lock();
        if inner.failing_reads.contains(repository) {
            return Err(HostError::Rejected {
                repository: repository.to_string(),
                operation: "get file",
                reason: "unavailable".to_string(),
            });
        }
        Ok(inner
            .files
            .get(&(repository.to_string(), path.to_string(), branch.to_string()))
            .cloned())
    }

    async fn put_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), HostError> {
        let mut inner = self.lock();
        if inner.failing_writes.contains(repository) {
            return Err(HostError::Rejected {
                repository: repository.to_string(),
                operation: "put file",
                reason: "protected branch".to_string(),
            });
        }
        inner.files.insert(
            (repository.to_string(), path.to_string(), branch.to_string()),
            content.to_string(),
        );
        inner.writes.push(FileWrite {
            repository: repository.to_string(),
            path: path.to_string(),
            branch: branch.to_string(),
            content: content.to_string(),
            commit_message: commit_message.to_string(),
        });
        Ok(())
    }
}
