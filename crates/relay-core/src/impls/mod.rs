//! Port の実装
//!
//! - command_handler: 子プロセスでエントリポイントを実行する TaskHandler
//! - fs_metadata: ディスク上のタスクパッケージを読む TaskMetadataSource
//! - static_plugins: job type ごとの固定プラグイン表
//! - workspace_plugin: 組み込みのワークスペースプラグイン
//! - feedback: InMemoryFeedback / TracingFeedback

pub mod command_handler;
pub mod feedback;
pub mod fs_metadata;
pub mod static_plugins;
pub mod workspace_plugin;

pub use command_handler::{CommandHandler, input_env_name};
pub use feedback::{InMemoryFeedback, TracingFeedback};
pub use fs_metadata::FsMetadataSource;
pub use static_plugins::StaticPluginRegistry;
pub use workspace_plugin::WorkspacePlugin;
