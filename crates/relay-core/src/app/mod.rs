//! App layer - ジョブ実行のオーケストレーション
//!
//! - builder: EngineBuilder（起動時検証つきのワイヤリング）
//! - runner: JobRunner（1 ジョブの全フェーズ）
//! - prepare: タスク準備（上限つき並行）
//! - plugins: before/after プラグインフェーズ
//! - job_context / task_context: 実行中の状態

pub mod builder;
pub mod job_context;
pub mod plugins;
pub mod prepare;
pub mod runner;
pub mod task_context;

pub use builder::{BuildError, EngineBuilder};
pub use job_context::{JobContext, LogLevel};
pub use plugins::{PhaseOutcome, PluginLifecycle};
pub use prepare::{PreparedTask, PreparedTasks, prepare_tasks};
pub use runner::JobRunner;
pub use task_context::TaskContext;
