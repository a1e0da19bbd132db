//! WorkspacePlugin - ジョブのワークスペースを用意する組み込みプラグイン
//!
//! - before_job: ソースフォルダ変数（既定 `sys.sourceFolder`）を確定して作成し、
//!   `sys.workingFolder` をジョブの作業フォルダに設定
//! - after_job: 結果のサマリを 1 行出す

use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::JobContext;
use crate::config::AgentConfig;
use crate::domain::vars::lookup;
use crate::domain::{HookId, PluginError};
use crate::ports::{IdGenerator, Plugin};

pub const WORKING_FOLDER_VARIABLE: &str = "sys.workingFolder";

/// Source folder used when the job does not name one: `<job working folder>/s`.
const DEFAULT_SOURCE_DIR: &str = "s";

pub struct WorkspacePlugin {
    before_id: HookId,
    after_id: HookId,
}

impl WorkspacePlugin {
    pub const NAME: &'static str = "workspace";

    pub fn new(ids: &dyn IdGenerator) -> Self {
        Self {
            before_id: ids.generate_hook_id(),
            after_id: ids.generate_hook_id(),
        }
    }
}

#[async_trait]
impl Plugin for WorkspacePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn before_id(&self) -> Option<HookId> {
        Some(self.before_id)
    }

    fn after_id(&self) -> Option<HookId> {
        Some(self.after_id)
    }

    async fn before_job(&self, job: &mut JobContext, agent: &AgentConfig) -> Result<bool, PluginError> {
        let variable = agent.source_folder_variable.as_str();
        let source = match lookup(job.variables(), variable).map(PathBuf::from) {
            Some(source) => source,
            None => {
                let source = job.working_folder().join(DEFAULT_SOURCE_DIR);
                job.set_variable(variable, source.to_string_lossy());
                source
            }
        };

        tokio::fs::create_dir_all(&source).await.map_err(|e| {
            PluginError::new(
                Self::NAME,
                format!("could not create source folder {}: {e}", source.display()),
            )
        })?;

        let working = job.working_folder().to_string_lossy().into_owned();
        job.set_variable(WORKING_FOLDER_VARIABLE, working);
        job.info(format!("Source folder: {}", source.display()));
        Ok(true)
    }

    async fn after_job(
        &self,
        job: &mut JobContext,
        _agent: &AgentConfig,
        job_success: bool,
    ) -> Result<bool, PluginError> {
        let summary = if job_success { "succeeded" } else { "has failures" };
        job.info(format!("Job {} {summary}", job.job_id()));
        Ok(true)
    }
}
