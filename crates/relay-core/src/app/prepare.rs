//! Task preparation: load every task's package before anything runs.
//!
//! All tasks are prepared concurrently, at most `limit` at a time
//! (`None` races them all). There is no ordering among tasks here.
//! The first failure fails the whole job; in-flight loads are dropped.

use std::collections::HashMap;
use std::collections::HashSet;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;

use crate::domain::{ExecutionDescriptor, JobError, TaskInstance, TaskInstanceId, TaskPackage};
use crate::ports::TaskMetadataSource;

/// Everything the execution loop needs about one task.
#[derive(Debug, Clone)]
pub struct PreparedTask {
    pub descriptor: ExecutionDescriptor,
    pub package: TaskPackage,
}

#[derive(Debug, Clone, Default)]
pub struct PreparedTasks {
    tasks: HashMap<TaskInstanceId, PreparedTask>,
}

impl PreparedTasks {
    pub fn get(&self, id: TaskInstanceId) -> Option<&PreparedTask> {
        self.tasks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub async fn prepare_tasks(
    source: &dyn TaskMetadataSource,
    tasks: &[TaskInstance],
    limit: Option<usize>,
) -> Result<PreparedTasks, JobError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.instance_id) {
            return Err(JobError::Orchestration(format!(
                "task instance id {} appears more than once",
                task.instance_id
            )));
        }
    }

    tracing::info!(target: "relay.prepare", tasks = tasks.len(), limit = ?limit, "preparing tasks");

    let semaphore = limit.map(|n| Semaphore::new(n.max(1)));
    let semaphore = semaphore.as_ref();

    let mut futs: FuturesUnordered<_> = tasks
        .iter()
        .map(|task| async move {
            let _permit = match semaphore {
                Some(sem) => Some(sem.acquire().await.map_err(|_| {
                    JobError::Orchestration("preparation semaphore closed unexpectedly".into())
                })?),
                None => None,
            };
            prepare_one(source, task).await
        })
        .collect();

    let mut prepared = PreparedTasks::default();
    while let Some(res) = futs.next().await {
        let (id, task) = res?;
        prepared.tasks.insert(id, task);
    }

    tracing::info!(target: "relay.prepare", prepared = prepared.len(), "task preparations complete");
    Ok(prepared)
}

async fn prepare_one(
    source: &dyn TaskMetadataSource,
    task: &TaskInstance,
) -> Result<(TaskInstanceId, PreparedTask), JobError> {
    let wrap = |source| JobError::Prepare {
        task: task.name.clone(),
        instance: task.instance_id,
        source,
    };

    tracing::debug!(target: "relay.prepare", task = %task.name, version = %task.version, "preparing task");
    let package = source.load(task).await.map_err(wrap)?;
    let descriptor = package.descriptor().map_err(wrap)?;
    tracing::debug!(
        target: "relay.prepare",
        task = %task.name,
        handler = %descriptor.handler,
        entry_point = %descriptor.entry_point.display(),
        "task prepared"
    );

    Ok((task.instance_id, PreparedTask { descriptor, package }))
}
