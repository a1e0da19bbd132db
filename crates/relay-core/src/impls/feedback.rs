//! FeedbackSink の実装
//!
//! - **InMemoryFeedback**: 行と timeline イベントをメモリに貯める（テスト、CLI のレポート用）
//! - **TracingFeedback**: 行を tracing に流すだけ

use std::sync::{Mutex, MutexGuard};

use crate::domain::TimelineRecord;
use crate::ports::FeedbackSink;

#[derive(Default)]
struct Recorded {
    lines: Vec<String>,
    timeline: Vec<TimelineRecord>,
}

#[derive(Default)]
pub struct InMemoryFeedback {
    recorded: Mutex<Recorded>,
}

impl InMemoryFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console lines in arrival order.
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Every timeline change, as a snapshot of the record at that moment.
    pub fn timeline_events(&self) -> Vec<TimelineRecord> {
        self.lock().timeline.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // 記録だけなので poison されても中身はそのまま使う
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FeedbackSink for InMemoryFeedback {
    fn queue_console_line(&self, line: String) {
        self.lock().lines.push(line);
    }

    fn timeline_updated(&self, record: &TimelineRecord) {
        self.lock().timeline.push(record.clone());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn queue_console_line(&self, line: String) {
        tracing::info!(target: "relay.console", "{line}");
    }

    fn timeline_updated(&self, record: &TimelineRecord) {
        tracing::debug!(
            target: "relay.timeline",
            id = %record.id,
            name = %record.name,
            state = ?record.state,
            "timeline"
        );
    }
}
