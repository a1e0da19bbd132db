//! Errors - エラー型と分類
//!
//! 準備時のエラー（PrepareError）はジョブ全体を止めます。
//! プラグインのエラーは集計されるだけで、兄弟プラグインは止めません。
//! ハンドラのディスパッチエラーはタスクループを止めます。

use std::path::PathBuf;

use thiserror::Error;

use super::ids::{RecordId, TaskInstanceId};
use super::metadata::HandlerKind;
use super::state::RecordState;

/// ErrorKind は実行エラーの運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Task metadata could not be loaded; nothing ran.
    Preparation,
    /// A plugin failed or could not be loaded.
    Plugin,
    /// A task handler failed hard.
    Dispatch,
    /// Anything else (timeline misuse, filesystem setup, ...).
    Orchestration,
}

/// Failure to prepare one task.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("could not read task metadata @ {path}: {source}")]
    MetadataUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid task metadata @ {path}: {source}")]
    MetadataInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no supported handler for task @ {path}")]
    NoSupportedHandler { path: PathBuf },
}

/// Error raised by a plugin hook.
#[derive(Debug, Clone, Error)]
#[error("plugin {plugin}: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Hard failure from a task handler runtime (not a reported task failure).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for kind {0}")]
    HandlerNotFound(HandlerKind),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("timeline record {0} is already registered")]
    DuplicateRecord(RecordId),

    #[error("timeline record {0} is not registered")]
    UnknownRecord(RecordId),

    #[error("timeline record {id}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: RecordId,
        from: RecordState,
        to: RecordState,
    },
}

/// Job-level error: why a job failed or a phase reported trouble.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("error preparing task {task} ({instance}): {source}")]
    Prepare {
        task: String,
        instance: TaskInstanceId,
        #[source]
        source: PrepareError,
    },

    #[error("error loading plugins for job type '{job_type}': {message}")]
    PluginLoad { job_type: String, message: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("task {task} ({instance}) failed to dispatch: {source}")]
    Dispatch {
        task: String,
        instance: TaskInstanceId,
        #[source]
        source: DispatchError,
    },

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("could not prepare working folder {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Orchestration(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Prepare { .. } => ErrorKind::Preparation,
            JobError::PluginLoad { .. } | JobError::Plugin(_) => ErrorKind::Plugin,
            JobError::Dispatch { .. } => ErrorKind::Dispatch,
            JobError::Timeline(_) | JobError::Setup { .. } | JobError::Orchestration(_) => {
                ErrorKind::Orchestration
            }
        }
    }
}
