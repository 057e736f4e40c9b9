//! Cloud backup collaborator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Remote storage the auto-save worker uploads exports to.
///
/// Folder and file ids are opaque strings owned by the implementation.
#[async_trait]
pub trait CloudSync: Send + Sync {
    fn has_credentials(&self) -> bool;

    /// Find or create a top-level folder, returning its id.
    async fn ensure_folder(&self, name: &str) -> StoreResult<String>;

    /// Upload `path` as `target_name` inside the folder, replacing any file
    /// with that name. Returns the remote file id.
    async fn upload_or_replace(
        &self,
        path: &Path,
        folder_id: &str,
        target_name: &str,
    ) -> StoreResult<String>;
}

/// Mirrors uploads into a local directory (a synced drive folder, a NAS
/// mount). Having a root configured stands in for having credentials.
#[derive(Debug, Clone, Default)]
pub struct DirectorySync {
    root: Option<PathBuf>,
}

impl DirectorySync {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn root(&self) -> StoreResult<&Path> {
        self.root.as_deref().ok_or(StoreError::CredentialMissing)
    }
}

#[async_trait]
impl CloudSync for DirectorySync {
    fn has_credentials(&self) -> bool {
        self.root.is_some()
    }

    async fn ensure_folder(&self, name: &str) -> StoreResult<String> {
        let folder = self.root()?.join(name);
        tokio::fs::create_dir_all(&folder).await?;
        Ok(folder.to_string_lossy().into_owned())
    }

    async fn upload_or_replace(
        &self,
        path: &Path,
        folder_id: &str,
        target_name: &str,
    ) -> StoreResult<String> {
        self.root()?;
        let target = Path::new(folder_id).join(target_name);
        tokio::fs::copy(path, &target).await?;
        Ok(target.to_string_lossy().into_owned())
    }
}
