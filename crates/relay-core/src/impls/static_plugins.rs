//! StaticPluginRegistry - 起動時に固定されるプラグイン表
//!
//! job type ごとにプラグインを登録順で持ちます。未知の job type は空のセット。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::JobError;
use crate::ports::{Plugin, PluginRegistry, PluginSet};

#[derive(Default, Clone)]
pub struct StaticPluginRegistry {
    by_job_type: HashMap<String, Vec<Arc<dyn Plugin>>>,
}

impl StaticPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `plugin` to the set for `job_type`.
    pub fn register(mut self, job_type: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        self.by_job_type.entry(job_type.into()).or_default().push(plugin);
        self
    }

    pub fn job_types(&self) -> impl Iterator<Item = &str> {
        self.by_job_type.keys().map(String::as_str)
    }
}

#[async_trait]
impl PluginRegistry for StaticPluginRegistry {
    async fn load(&self, job_type: &str) -> Result<PluginSet, JobError> {
        Ok(self
            .by_job_type
            .get(job_type)
            .map(|plugins| PluginSet::from_plugins(plugins))
            .unwrap_or_default())
    }
}
