//! Timeline: ordered record of every plugin hook and task in a job.
//!
//! Design:
//! - Records are append-only; an id is registered at most once.
//! - State only moves forward (see `RecordState::can_transition_to`).
//! - All transitions happen here, callers never touch `state` directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TimelineError;
use super::ids::RecordId;
use super::state::{RecordState, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Plugin,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: RecordId,
    pub name: String,
    pub kind: RecordKind,
    /// Position in the planned work list.
    pub order: usize,
    pub state: RecordState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    records: Vec<TimelineRecord>,
    index: HashMap<RecordId, usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Pending record.
    pub fn register(
        &mut self,
        id: RecordId,
        name: impl Into<String>,
        kind: RecordKind,
    ) -> Result<&TimelineRecord, TimelineError> {
        if self.index.contains_key(&id) {
            return Err(TimelineError::DuplicateRecord(id));
        }
        let order = self.records.len();
        self.records.push(TimelineRecord {
            id,
            name: name.into(),
            kind,
            order,
            state: RecordState::Pending,
            started_at: None,
            finished_at: None,
        });
        self.index.insert(id, order);
        Ok(&self.records[order])
    }

    pub fn start(&mut self, id: RecordId, now: DateTime<Utc>) -> Result<&TimelineRecord, TimelineError> {
        let record = self.transition(id, RecordState::InProgress)?;
        record.started_at = Some(now);
        Ok(record)
    }

    pub fn finish(
        &mut self,
        id: RecordId,
        result: TaskResult,
        now: DateTime<Utc>,
    ) -> Result<&TimelineRecord, TimelineError> {
        let record = self.transition(id, result.into())?;
        record.finished_at = Some(now);
        Ok(record)
    }

    pub fn skip(&mut self, id: RecordId, now: DateTime<Utc>) -> Result<&TimelineRecord, TimelineError> {
        let record = self.transition(id, RecordState::Skipped)?;
        record.finished_at = Some(now);
        Ok(record)
    }

    pub fn get(&self, id: RecordId) -> Option<&TimelineRecord> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[TimelineRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn transition(&mut self, id: RecordId, to: RecordState) -> Result<&mut TimelineRecord, TimelineError> {
        let &i = self.index.get(&id).ok_or(TimelineError::UnknownRecord(id))?;
        let record = &mut self.records[i];
        if !record.state.can_transition_to(to) {
            return Err(TimelineError::InvalidTransition {
                id,
                from: record.state,
                to,
            });
        }
        record.state = to;
        Ok(record)
    }
}
