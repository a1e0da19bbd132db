//! Job request: what the engine is asked to run.
//!
//! The request is the input to one job run: an environment of variables plus
//! an ordered task list. Task order is execution order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::{JobId, TaskInstanceId};

/// Variable mapping used for `$(name)` substitution.
pub type Variables = HashMap<String, String>;

/// A job submitted to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Generated when the request does not carry one.
    #[serde(default = "JobId::generate")]
    pub job_id: JobId,

    /// Plugin set selector (e.g. "build"). Falls back to the agent config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    #[serde(default)]
    pub environment: JobEnvironment,

    pub tasks: Vec<TaskInstance>,
}

impl JobRequest {
    pub fn new(tasks: Vec<TaskInstance>) -> Self {
        Self {
            job_id: JobId::generate(),
            job_type: None,
            environment: JobEnvironment::default(),
            tasks,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobEnvironment {
    #[serde(default)]
    pub variables: Variables,
}

/// One task in the job, referencing a versioned task package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub instance_id: TaskInstanceId,
    pub name: String,
    pub version: String,

    /// Raw input values; may contain `$(name)` tokens until substituted.
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

impl TaskInstance {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            instance_id: TaskInstanceId::generate(),
            name: name.into(),
            version: version.into(),
            inputs: HashMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}
