//! JobContext - 1 ジョブ分の可変状態
//!
//! ジョブのステータス、timeline、作業フォルダ、フィードバック出力を持ちます。
//! ジョブ開始時に作られ、結果（JobReport）を出したら捨てられます。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::task_context::TaskContext;
use crate::domain::{
    JobError, JobId, JobReport, JobRequest, JobStatus, RecordId, RecordKind, RecordState,
    TaskInstance, TaskResult, Timeline, TimelineError, Variables,
};
use crate::observability::TimelineCounts;
use crate::ports::{Clock, FeedbackSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Verbose,
    Info,
    Error,
}

pub(crate) fn format_line(level: LogLevel, message: &str) -> String {
    match level {
        LogLevel::Verbose => format!("[verbose] {message}"),
        LogLevel::Info => message.to_string(),
        LogLevel::Error => format!("[error] {message}"),
    }
}

pub struct JobContext {
    job: JobRequest,
    status: JobStatus,
    timeline: Timeline,
    working_folder: PathBuf,
    feedback: Arc<dyn FeedbackSink>,
    clock: Arc<dyn Clock>,
    has_errors: bool,
}

impl JobContext {
    pub fn new(
        job: JobRequest,
        working_folder: impl Into<PathBuf>,
        feedback: Arc<dyn FeedbackSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            job,
            status: JobStatus::Pending,
            timeline: Timeline::new(),
            working_folder: working_folder.into(),
            feedback,
            clock,
            has_errors: false,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.job_id
    }

    pub fn job(&self) -> &JobRequest {
        &self.job
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [TaskInstance] {
        &mut self.job.tasks
    }

    pub fn variables(&self) -> &Variables {
        &self.job.environment.variables
    }

    /// Plugins contribute variables through this; tasks see them after the second substitution pass.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        tracing::debug!(target: "relay.job", %name, %value, "variable set");
        self.job.environment.variables.insert(name, value);
    }

    pub fn working_folder(&self) -> &Path {
        &self.working_folder
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn feedback(&self) -> Arc<dyn FeedbackSink> {
        Arc::clone(&self.feedback)
    }

    // ────────────────────────────────────────────────────────────────────────
    // ジョブステータス
    // ────────────────────────────────────────────────────────────────────────

    pub fn set_job_in_progress(&mut self) -> Result<(), JobError> {
        if self.status != JobStatus::Pending {
            return Err(JobError::Orchestration(format!(
                "job {} cannot start from {:?}",
                self.job.job_id, self.status
            )));
        }
        self.status = JobStatus::InProgress;
        tracing::info!(target: "relay.job", job_id = %self.job.job_id, "job in progress");
        Ok(())
    }

    /// Move to a terminal status. A job that never started can only fail;
    /// a terminal status is never overwritten.
    pub fn finalize(&mut self, success: bool) -> JobStatus {
        self.status = match (self.status, success) {
            (JobStatus::InProgress, true) => JobStatus::Succeeded,
            (JobStatus::Pending | JobStatus::InProgress, _) => JobStatus::Failed,
            (terminal, _) => terminal,
        };
        tracing::info!(target: "relay.job", job_id = %self.job.job_id, status = ?self.status, "job finished");
        self.status
    }

    // ────────────────────────────────────────────────────────────────────────
    // Timeline
    // ────────────────────────────────────────────────────────────────────────

    pub fn register_pending_task(
        &mut self,
        id: impl Into<RecordId>,
        name: &str,
        kind: RecordKind,
    ) -> Result<(), TimelineError> {
        let record = self.timeline.register(id.into(), name, kind)?;
        self.feedback.timeline_updated(record);
        Ok(())
    }

    pub fn set_task_started(&mut self, id: impl Into<RecordId>) -> Result<(), TimelineError> {
        let record = self.timeline.start(id.into(), self.clock.now())?;
        self.feedback.timeline_updated(record);
        Ok(())
    }

    pub fn set_task_result(
        &mut self,
        id: impl Into<RecordId>,
        result: TaskResult,
    ) -> Result<(), TimelineError> {
        let record = self.timeline.finish(id.into(), result, self.clock.now())?;
        tracing::info!(target: "relay.job", name = %record.name, ?result, "timeline record finished");
        self.feedback.timeline_updated(record);
        Ok(())
    }

    pub fn set_task_skipped(&mut self, id: impl Into<RecordId>) -> Result<(), TimelineError> {
        let record = self.timeline.skip(id.into(), self.clock.now())?;
        self.feedback.timeline_updated(record);
        Ok(())
    }

    /// Give every record still open a terminal state: Pending becomes Skipped,
    /// InProgress becomes Failed.
    pub(crate) fn close_open_records(&mut self) -> Result<(), TimelineError> {
        let open: Vec<(RecordId, RecordState)> = self
            .timeline
            .records()
            .iter()
            .filter(|r| !r.state.is_terminal())
            .map(|r| (r.id, r.state))
            .collect();
        for (id, state) in open {
            match state {
                RecordState::InProgress => self.set_task_result(id, TaskResult::Failed)?,
                _ => self.set_task_skipped(id)?,
            }
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Feedback
    // ────────────────────────────────────────────────────────────────────────

    /// Mark a boundary in the console stream (e.g. before each task).
    pub fn write_console_section(&self, title: &str) {
        self.feedback.queue_console_line(String::new());
        self.feedback.queue_console_line(format!("******** {title} ********"));
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        tracing::debug!(target: "relay.job", "{}", message.as_ref());
        self.feedback
            .queue_console_line(format_line(LogLevel::Verbose, message.as_ref()));
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(target: "relay.job", "{}", message.as_ref());
        self.feedback
            .queue_console_line(format_line(LogLevel::Info, message.as_ref()));
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        tracing::error!(target: "relay.job", "{}", message.as_ref());
        self.has_errors = true;
        self.feedback
            .queue_console_line(format_line(LogLevel::Error, message.as_ref()));
    }

    /// Set once any job-level error was logged.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Create the task's working folder and open its context.
    pub(crate) async fn create_task_context(
        &self,
        task: &TaskInstance,
    ) -> Result<TaskContext, JobError> {
        let folder = self.working_folder.join(task.instance_id.as_ulid().to_string());
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|source| JobError::Setup {
                path: folder.clone(),
                source,
            })?;
        Ok(TaskContext::open(
            task.instance_id,
            task.name.clone(),
            task.inputs.clone(),
            folder,
            self.feedback(),
        ))
    }

    pub fn report(&self, errors: Vec<String>) -> JobReport {
        let timeline = self.timeline.records().to_vec();
        JobReport {
            job_id: self.job.job_id,
            status: self.status,
            counts: TimelineCounts::from_records(&timeline),
            timeline,
            errors,
        }
    }
}
