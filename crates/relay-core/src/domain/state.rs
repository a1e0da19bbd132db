//! Job status and timeline record states.

use serde::{Deserialize, Serialize};

/// Job status.
///
/// State transitions:
/// - Pending -> InProgress -> Succeeded | Failed
/// - Pending -> Failed (preparation or setup failed before anything ran)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// State of one timeline record (a task or a plugin hook).
///
/// State transitions:
/// - Pending -> InProgress -> Succeeded | Failed
/// - Pending -> Skipped (never ran: earlier phase failed or the task loop was cut short)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Skipped,
}

impl RecordState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecordState::Succeeded | RecordState::Failed | RecordState::Skipped
        )
    }

    pub fn can_transition_to(self, next: RecordState) -> bool {
        use RecordState::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Skipped) | (InProgress, Succeeded) | (InProgress, Failed)
        )
    }
}

/// Final result of a task or plugin hook run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskResult {
    Succeeded,
    Failed,
}

impl TaskResult {
    pub fn from_success(success: bool) -> Self {
        if success {
            TaskResult::Succeeded
        } else {
            TaskResult::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == TaskResult::Succeeded
    }
}

impl From<TaskResult> for RecordState {
    fn from(result: TaskResult) -> Self {
        match result {
            TaskResult::Succeeded => RecordState::Succeeded,
            TaskResult::Failed => RecordState::Failed,
        }
    }
}
