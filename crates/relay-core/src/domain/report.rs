//! Job report: the externally observable outcome of one job.

use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::state::JobStatus;
use super::timeline::TimelineRecord;
use crate::observability::TimelineCounts;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub timeline: Vec<TimelineRecord>,
    pub counts: TimelineCounts,

    /// Errors recorded while the job ran, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}
