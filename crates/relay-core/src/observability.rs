use serde::{Deserialize, Serialize};

use crate::domain::{RecordState, TimelineRecord};

/// Per-state tally of timeline records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TimelineCounts {
    pub fn from_records(records: &[TimelineRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.state {
                RecordState::Pending => counts.pending += 1,
                RecordState::InProgress => counts.in_progress += 1,
                RecordState::Succeeded => counts.succeeded += 1,
                RecordState::Failed => counts.failed += 1,
                RecordState::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}
