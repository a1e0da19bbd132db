//! FsMetadataSource - ディスク上のタスクパッケージを読む
//!
//! レイアウト: `<root>/<name>/<version>/<manifest_file>`

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{PrepareError, TaskInstance, TaskMetadata, TaskPackage};
use crate::ports::TaskMetadataSource;

#[derive(Debug, Clone)]
pub struct FsMetadataSource {
    root: PathBuf,
    manifest_file: String,
}

impl FsMetadataSource {
    pub fn new(root: impl Into<PathBuf>, manifest_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            manifest_file: manifest_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_dir(&self, task: &TaskInstance) -> PathBuf {
        self.root.join(&task.name).join(&task.version)
    }
}

#[async_trait]
impl TaskMetadataSource for FsMetadataSource {
    async fn load(&self, task: &TaskInstance) -> Result<TaskPackage, PrepareError> {
        let dir = self.package_dir(task);
        let path = dir.join(&self.manifest_file);

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PrepareError::MetadataUnreadable {
                path: path.clone(),
                source,
            })?;
        let metadata: TaskMetadata =
            serde_json::from_str(&raw).map_err(|source| PrepareError::MetadataInvalid {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(target: "relay.prepare", manifest = %path.display(), "task metadata loaded");
        Ok(TaskPackage::new(dir, path, metadata))
    }
}
