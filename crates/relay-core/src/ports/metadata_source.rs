//! TaskMetadataSource port - タスクパッケージの読み込み
//!
//! # 実装
//! - **FsMetadataSource**: `<root>/<name>/<version>/task.json` を読む

use async_trait::async_trait;

use crate::domain::{PrepareError, TaskInstance, TaskPackage};

#[async_trait]
pub trait TaskMetadataSource: Send + Sync {
    /// Load the package backing `task`.
    async fn load(&self, task: &TaskInstance) -> Result<TaskPackage, PrepareError>;
}
