//! Source-control host collaborator.
//!
//! The rotation core only needs to read and write one file on one branch and
//! to resolve a repository's default branch. Real implementation:
//! [`GitLabHost`]. Test double: [`MemoryHost`].

mod gitlab;
mod memory;

pub use gitlab::GitLabHost;
pub use memory::{FileWrite, MemoryHost};

use async_trait::async_trait;

use crate::errors::HostError;

#[async_trait]
pub trait SourceHost: Send + Sync {
    /// The branch the ownership file is maintained on.
    async fn resolve_default_branch(&self, repository: &str) -> Result<String, HostError>;

    /// Raw file content, `None` if the file does not exist on `branch`.
    async fn get_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, HostError>;

    /// Create or update a file with a single commit.
    async fn put_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), HostError>;
}

/// Find the first existing ownership file among `candidates`.
///
/// Returns the path and its content, or the first candidate with `None` when
/// the repository has no ownership file yet.
pub async fn find_ownership_file(
    host: &dyn SourceHost,
    repository: &str,
    branch: &str,
    candidates: &[String],
) -> Result<(String, Option<String>), HostError> {
    for path in candidates {
        if let Some(content) = host.get_file(repository, path, branch).await? {
            return Ok((path.clone(), Some(content)));
        }
    }
    let default = candidates
        .first()
        .cloned()
        .unwrap_or_else(|| "CODEOWNERS".to_string());
    Ok((default, None))
}
