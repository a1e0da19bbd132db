//! FeedbackSink port - ジョブの進捗を外部へ流す
//!
//! コンソール行（順序付き）と timeline の更新を受け取ります。
//! 結果の送信先（サーバー、ファイル、テスト用メモリ）は実装側の責務です。

use crate::domain::TimelineRecord;

pub trait FeedbackSink: Send + Sync {
    /// Append one console line to the ordered feedback stream.
    fn queue_console_line(&self, line: String);

    /// A timeline record was registered or changed state.
    fn timeline_updated(&self, _record: &TimelineRecord) {}
}
