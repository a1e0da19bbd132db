//! EngineBuilder - JobRunner の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 期待するハンドラが揃っていなければ build() で失敗

use std::sync::Arc;

use crate::config::{AgentConfig, ConfigError};
use crate::domain::HandlerKind;
use crate::impls::{FsMetadataSource, StaticPluginRegistry};
use crate::ports::{
    Clock, HandlerRegistry, PluginRegistry, RegistryError, SystemClock, TaskHandler,
    TaskMetadataSource,
};

use super::runner::JobRunner;

/// EngineBuilder は JobRunner を構築
///
/// # 使用例
/// ```ignore
/// let runner = EngineBuilder::new(agent)
///     .handler(HandlerKind::ShellScript, Arc::new(CommandHandler::new(CommandSpec::new("sh"))))?
///     .expect_handlers(&[HandlerKind::ShellScript])
///     .build()?;
/// ```
///
/// 省略時のデフォルト:
/// - metadata source: `FsMetadataSource`（`<work_folder>/tasks`）
/// - plugin registry: 空の `StaticPluginRegistry`
/// - clock: `SystemClock`
pub struct EngineBuilder {
    agent: AgentConfig,
    handlers: HandlerRegistry,
    source: Option<Arc<dyn TaskMetadataSource>>,
    plugins: Option<Arc<dyn PluginRegistry>>,
    clock: Arc<dyn Clock>,
    expected_handlers: Option<Vec<HandlerKind>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing handlers: {0:?}. These handler kinds were expected but not registered.")]
    MissingHandlers(Vec<HandlerKind>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineBuilder {
    pub fn new(agent: AgentConfig) -> Self {
        Self {
            agent,
            handlers: HandlerRegistry::new(),
            source: None,
            plugins: None,
            clock: Arc::new(SystemClock),
            expected_handlers: None,
        }
    }

    /// Register the runtime for one handler kind.
    pub fn handler(
        mut self,
        kind: HandlerKind,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self, RegistryError> {
        self.handlers.register(kind, handler)?;
        Ok(self)
    }

    pub fn metadata_source(mut self, source: Arc<dyn TaskMetadataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn plugin_registry(mut self, plugins: Arc<dyn PluginRegistry>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// build() 時に、ここで渡した kind が全て登録済みかをチェック
    pub fn expect_handlers(mut self, kinds: &[HandlerKind]) -> Self {
        self.expected_handlers = Some(kinds.to_vec());
        self
    }

    pub fn build(self) -> Result<JobRunner, BuildError> {
        if let Some(expected) = &self.expected_handlers {
            let registered = self.handlers.registered_kinds();
            let missing: Vec<HandlerKind> = expected
                .iter()
                .filter(|k| !registered.contains(*k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }

        // 相対パスのままだと子プロセスの cwd から見えなくなる
        let agent = self.agent.with_absolute_work_folder()?;

        let source: Arc<dyn TaskMetadataSource> = match self.source {
            Some(source) => source,
            None => Arc::new(FsMetadataSource::new(
                agent.package_root(),
                agent.manifest_file.clone(),
            )),
        };
        let plugins: Arc<dyn PluginRegistry> = match self.plugins {
            Some(plugins) => plugins,
            None => Arc::new(StaticPluginRegistry::new()),
        };

        tracing::debug!(
            target: "relay.job",
            handlers = ?self.handlers.registered_kinds(),
            "engine built"
        );

        Ok(JobRunner {
            agent: Arc::new(agent),
            source,
            handlers: Arc::new(self.handlers),
            plugins,
            clock: self.clock,
        })
    }
}
