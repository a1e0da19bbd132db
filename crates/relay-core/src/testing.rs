//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::{JobContext, TaskContext};
use crate::config::AgentConfig;
use crate::domain::{
    DispatchError, ExecutionEntry, HandlerKind, HookId, InputDefinition, InputType, JobError,
    PluginError, PrepareError, TaskInstance, TaskMetadata, TaskPackage,
};
use crate::ports::{Plugin, PluginRegistry, PluginSet, TaskHandler, TaskMetadataSource};

/// Ordered record of what ran, shared between fakes.
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Metadata source
// ────────────────────────────────────────────────────────────────────────────

pub(crate) struct FakeSource {
    invalid: HashSet<String>,
    unsupported: HashSet<String>,
    file_inputs: HashMap<String, Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self {
            invalid: HashSet::new(),
            unsupported: HashSet::new(),
            file_inputs: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// The manifest of `task` will not parse.
    pub(crate) fn invalid(mut self, task: &str) -> Self {
        self.invalid.insert(task.to_string());
        self
    }

    /// The manifest of `task` names no supported handler kind.
    pub(crate) fn without_handler(mut self, task: &str) -> Self {
        self.unsupported.insert(task.to_string());
        self
    }

    /// Declare `input` of `task` as a `filePath` input.
    pub(crate) fn with_file_input(mut self, task: &str, input: &str) -> Self {
        self.file_inputs
            .entry(task.to_string())
            .or_default()
            .push(input.to_string());
        self
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskMetadataSource for FakeSource {
    async fn load(&self, task: &TaskInstance) -> Result<TaskPackage, PrepareError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let dir = PathBuf::from("/pkgs").join(&task.name).join(&task.version);
        let manifest_path = dir.join("task.json");

        if self.invalid.contains(&task.name) {
            let source = serde_json::from_str::<TaskMetadata>("{").unwrap_err();
            return Err(PrepareError::MetadataInvalid {
                path: manifest_path,
                source,
            });
        }

        let mut execution = HashMap::new();
        if !self.unsupported.contains(&task.name) {
            execution.insert(
                HandlerKind::JavaScript.manifest_key().to_string(),
                ExecutionEntry {
                    target: "index.js".to_string(),
                },
            );
        }
        let inputs = self
            .file_inputs
            .get(&task.name)
            .into_iter()
            .flatten()
            .map(|name| InputDefinition {
                name: name.clone(),
                input_type: InputType::FilePath,
            })
            .collect();

        Ok(TaskPackage::new(
            dir,
            manifest_path,
            TaskMetadata { inputs, execution },
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Task handler
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerBehavior {
    Succeed,
    /// Returns `Ok(())` after logging an error on the task context.
    LogError,
    /// Returns a hard dispatch error.
    Hard,
}

/// What a handler saw for one dispatch.
#[derive(Debug, Clone)]
pub(crate) struct Dispatched {
    pub name: String,
    pub entry_point: PathBuf,
    pub inputs: HashMap<String, String>,
    pub working_folder: PathBuf,
    pub working_folder_existed: bool,
}

pub(crate) struct FakeHandler {
    behaviors: HashMap<String, HandlerBehavior>,
    dispatched: Mutex<Vec<Dispatched>>,
    log: CallLog,
}

impl FakeHandler {
    pub(crate) fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            dispatched: Mutex::new(Vec::new()),
            log: CallLog::default(),
        }
    }

    pub(crate) fn on(mut self, task: &str, behavior: HandlerBehavior) -> Self {
        self.behaviors.insert(task.to_string(), behavior);
        self
    }

    pub(crate) fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn dispatched(&self) -> Vec<Dispatched> {
        self.dispatched.lock().unwrap().clone()
    }

    pub(crate) fn dispatched_names(&self) -> Vec<String> {
        self.dispatched().into_iter().map(|d| d.name).collect()
    }
}

#[async_trait]
impl TaskHandler for FakeHandler {
    async fn dispatch(&self, entry_point: &Path, ctx: &TaskContext) -> Result<(), DispatchError> {
        self.log.push(format!("task:{}", ctx.name()));
        self.dispatched.lock().unwrap().push(Dispatched {
            name: ctx.name().to_string(),
            entry_point: entry_point.to_path_buf(),
            inputs: ctx.inputs().clone(),
            working_folder: ctx.working_folder().to_path_buf(),
            working_folder_existed: ctx.working_folder().is_dir(),
        });

        match self
            .behaviors
            .get(ctx.name())
            .copied()
            .unwrap_or(HandlerBehavior::Succeed)
        {
            HandlerBehavior::Succeed => {
                ctx.info("done");
                Ok(())
            }
            HandlerBehavior::LogError => {
                ctx.error("something went wrong");
                Ok(())
            }
            HandlerBehavior::Hard => Err(DispatchError::Failed("handler crashed".into())),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plugins
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PluginBehavior {
    Succeed,
    ReportFailure,
    /// Logs a job-level error but still reports success.
    LogError,
    Error,
}

pub(crate) struct FakePlugin {
    name: String,
    before_id: Option<HookId>,
    after_id: Option<HookId>,
    behavior: PluginBehavior,
    variables: Vec<(String, String)>,
    before_calls: AtomicUsize,
    after_signals: Mutex<Vec<bool>>,
    log: CallLog,
}

impl FakePlugin {
    fn with_hooks(name: &str, before: bool, after: bool) -> Self {
        Self {
            name: name.to_string(),
            before_id: before.then(HookId::generate),
            after_id: after.then(HookId::generate),
            behavior: PluginBehavior::Succeed,
            variables: Vec::new(),
            before_calls: AtomicUsize::new(0),
            after_signals: Mutex::new(Vec::new()),
            log: CallLog::default(),
        }
    }

    pub(crate) fn both(name: &str) -> Self {
        Self::with_hooks(name, true, true)
    }

    pub(crate) fn before_only(name: &str) -> Self {
        Self::with_hooks(name, true, false)
    }

    pub(crate) fn after_only(name: &str) -> Self {
        Self::with_hooks(name, false, true)
    }

    pub(crate) fn behaving(mut self, behavior: PluginBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set `name` in the job environment during before-job.
    pub(crate) fn setting(mut self, name: &str, value: &str) -> Self {
        self.variables.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn before_calls(&self) -> usize {
        self.before_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn after_signals(&self) -> Vec<bool> {
        self.after_signals.lock().unwrap().clone()
    }

    fn complain(&self, job: &mut JobContext) {
        if self.behavior == PluginBehavior::LogError {
            job.error(format!("plugin {}: complained", self.name));
        }
    }

    fn outcome(&self) -> Result<bool, PluginError> {
        match self.behavior {
            PluginBehavior::Succeed | PluginBehavior::LogError => Ok(true),
            PluginBehavior::ReportFailure => Ok(false),
            PluginBehavior::Error => Err(PluginError::new(&self.name, "exploded")),
        }
    }
}

#[async_trait]
impl Plugin for FakePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_id(&self) -> Option<HookId> {
        self.before_id
    }

    fn after_id(&self) -> Option<HookId> {
        self.after_id
    }

    async fn before_job(&self, job: &mut JobContext, _agent: &AgentConfig) -> Result<bool, PluginError> {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("before:{}", self.name));
        for (name, value) in &self.variables {
            job.set_variable(name, value);
        }
        self.complain(job);
        self.outcome()
    }

    async fn after_job(
        &self,
        job: &mut JobContext,
        _agent: &AgentConfig,
        job_success: bool,
    ) -> Result<bool, PluginError> {
        self.after_signals.lock().unwrap().push(job_success);
        self.log.push(format!("after:{}", self.name));
        self.complain(job);
        self.outcome()
    }
}

/// Build a plugin set from fakes, in the given order.
pub(crate) fn plugin_set(plugins: &[&Arc<FakePlugin>]) -> PluginSet {
    let plugins: Vec<Arc<dyn Plugin>> = plugins
        .iter()
        .map(|p| Arc::clone(*p) as Arc<dyn Plugin>)
        .collect();
    PluginSet::from_plugins(&plugins)
}

/// Registry whose every load fails.
pub(crate) struct BrokenRegistry;

#[async_trait]
impl PluginRegistry for BrokenRegistry {
    async fn load(&self, job_type: &str) -> Result<PluginSet, JobError> {
        Err(JobError::PluginLoad {
            job_type: job_type.to_string(),
            message: "registry unavailable".to_string(),
        })
    }
}
