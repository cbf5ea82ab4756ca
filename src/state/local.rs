//! Blob storage in a local directory.

use std::path::PathBuf;

use async_trait::async_trait;

use super::BlobStore;
use crate::errors::StateError;

/// Stores each blob as a file under `root`. Writes go to a sibling temporary
/// file first and are renamed into place, so readers never see a partial blob.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StateError> {
        let path = self.path_for(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::Read {
                name: name.to_string(),
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), StateError> {
        let path = self.path_for(name);
        let write_err = |e: std::io::Error| StateError::Write {
            name: name.to_string(),
            message: format!("{}: {}", path.display(), e),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &data).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_err)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
