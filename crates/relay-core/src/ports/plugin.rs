//! Plugin port - ジョブの前後で動く拡張
//!
//! プラグインはジョブに属さず、job type（例: "build"）ごとの
//! レジストリからロードされます。
//!
//! # フック
//! - before_job: タスクより前。変数を追加してよい（2 回目の置換で反映）
//! - after_job: 必ず最後に実行。それまでの成否を受け取る

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::JobContext;
use crate::config::AgentConfig;
use crate::domain::{HookId, JobError, PluginError};

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Timeline id of the before-job hook; `None` if the plugin has none.
    fn before_id(&self) -> Option<HookId> {
        None
    }

    /// Timeline id of the after-job hook; `None` if the plugin has none.
    fn after_id(&self) -> Option<HookId> {
        None
    }

    /// `Ok(false)` is a reported failure; `Err` is recorded as a plugin error.
    async fn before_job(&self, _job: &mut JobContext, _agent: &AgentConfig) -> Result<bool, PluginError> {
        Ok(true)
    }

    async fn after_job(
        &self,
        _job: &mut JobContext,
        _agent: &AgentConfig,
        _job_success: bool,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }
}

/// One hook of one plugin, as it appears in a phase.
#[derive(Clone)]
pub struct PluginHook {
    pub hook_id: HookId,
    pub plugin: Arc<dyn Plugin>,
}

impl PluginHook {
    pub fn name(&self) -> &str {
        self.plugin.name()
    }
}

/// Plugins for one job type, split into ordered phases.
#[derive(Clone, Default)]
pub struct PluginSet {
    pub before_job: Vec<PluginHook>,
    pub after_job: Vec<PluginHook>,
}

impl PluginSet {
    /// Split plugins into phases, keeping registration order in each.
    pub fn from_plugins(plugins: &[Arc<dyn Plugin>]) -> Self {
        let mut set = Self::default();
        for plugin in plugins {
            if let Some(hook_id) = plugin.before_id() {
                set.before_job.push(PluginHook {
                    hook_id,
                    plugin: Arc::clone(plugin),
                });
            }
            if let Some(hook_id) = plugin.after_id() {
                set.after_job.push(PluginHook {
                    hook_id,
                    plugin: Arc::clone(plugin),
                });
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.before_job.is_empty() && self.after_job.is_empty()
    }
}

/// Process-wide plugin registry keyed by job type.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    async fn load(&self, job_type: &str) -> Result<PluginSet, JobError>;
}
