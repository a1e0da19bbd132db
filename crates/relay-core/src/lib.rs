//! relay-core
//!
//! Job execution engine for a build/release agent.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, metadata, state, timeline, vars, inputs, errors）
//! - **ports**: 抽象化レイヤー（TaskMetadataSource, TaskHandler, PluginRegistry, FeedbackSink, Clock）
//! - **app**: アプリケーションロジック（builder, runner, prepare, plugins, job/task context）
//! - **impls**: 実装（FsMetadataSource, CommandHandler, StaticPluginRegistry, WorkspacePlugin, feedback）
//! - **config**: エージェント設定（agent.toml）
//! - **observability**: timeline の集計ビュー

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;
