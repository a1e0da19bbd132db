//! TaskContext - 1 タスク分の実行コンテキスト
//!
//! タスク実行の直前に作られ、直後に `end()` で閉じられます。
//! メッセージはチャネル経由で JobContext の FeedbackSink に流れます。
//! `end()` を呼ばずに drop されてもチャネルは閉じます（Drop 実装）。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::job_context::{LogLevel, format_line};
use crate::domain::TaskInstanceId;
use crate::ports::FeedbackSink;

pub struct TaskContext {
    instance_id: TaskInstanceId,
    name: String,
    inputs: HashMap<String, String>,
    working_folder: PathBuf,
    has_errors: AtomicBool,
    tx: Option<mpsc::UnboundedSender<String>>,
    forwarder: Option<JoinHandle<()>>,
}

impl TaskContext {
    /// Open the message stream. Must be called inside a tokio runtime.
    pub(crate) fn open(
        instance_id: TaskInstanceId,
        name: impl Into<String>,
        inputs: HashMap<String, String>,
        working_folder: PathBuf,
        sink: Arc<dyn FeedbackSink>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forwarder = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                sink.queue_console_line(line);
            }
        });
        Self {
            instance_id,
            name: name.into(),
            inputs,
            working_folder,
            has_errors: AtomicBool::new(false),
            tx: Some(tx),
            forwarder: Some(forwarder),
        }
    }

    pub fn instance_id(&self) -> TaskInstanceId {
        self.instance_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inputs after substitution and file-path resolution.
    pub fn inputs(&self) -> &HashMap<String, String> {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    /// Task-scoped working folder; exists on disk while the task runs.
    pub fn working_folder(&self) -> &Path {
        &self.working_folder
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        tracing::debug!(target: "relay.task", task = %self.name, "{}", message.as_ref());
        self.send(LogLevel::Verbose, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(target: "relay.task", task = %self.name, "{}", message.as_ref());
        self.send(LogLevel::Info, message.as_ref());
    }

    /// Log an error; the task will be recorded as Failed.
    pub fn error(&self, message: impl AsRef<str>) {
        tracing::warn!(target: "relay.task", task = %self.name, "{}", message.as_ref());
        self.has_errors.store(true, Ordering::SeqCst);
        self.send(LogLevel::Error, message.as_ref());
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors.load(Ordering::SeqCst)
    }

    /// Close the message stream and wait until every line reached the sink.
    pub async fn end(mut self) {
        self.tx.take();
        if let Some(forwarder) = self.forwarder.take() {
            // forwarder が panic しても結果は捨てる（行が欠けるだけ）
            let _ = forwarder.await;
        }
    }

    fn send(&self, level: LogLevel, message: &str) {
        if let Some(tx) = &self.tx {
            // receiver は forwarder が持っているので end() 前は失敗しない
            let _ = tx.send(format_line(level, message));
        }
    }

    /// Context wired to an in-memory sink, for handler tests.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, Arc<crate::impls::InMemoryFeedback>) {
        let sink = Arc::new(crate::impls::InMemoryFeedback::new());
        let ctx = Self::open(
            TaskInstanceId::generate(),
            "detached",
            HashMap::new(),
            std::env::temp_dir(),
            sink.clone(),
        );
        (ctx, sink)
    }
}

impl Drop for TaskContext {
    fn drop(&mut self) {
        // sender を落とせば forwarder は残りを流して終わる
        self.tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_sets_has_errors() {
        let (ctx, _sink) = TaskContext::detached();
        assert!(!ctx.has_errors());

        ctx.verbose("quiet");
        ctx.info("hello");
        assert!(!ctx.has_errors());

        ctx.error("boom");
        assert!(ctx.has_errors());
        ctx.end().await;
    }

    #[tokio::test]
    async fn end_flushes_lines_in_order() {
        let (ctx, sink) = TaskContext::detached();
        ctx.info("one");
        ctx.verbose("two");
        ctx.error("three");
        ctx.end().await;

        assert_eq!(
            sink.lines(),
            vec![
                "one".to_string(),
                "[verbose] two".to_string(),
                "[error] three".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dropping_without_end_still_delivers() {
        let (ctx, sink) = TaskContext::detached();
        ctx.info("late");
        drop(ctx);

        // forwarder が走るまで譲る
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.lines(), vec!["late".to_string()]);
    }
}
