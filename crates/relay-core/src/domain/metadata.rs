//! Task package metadata (`task.json`) and the execution descriptor derived from it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::PrepareError;

/// Runtime category needed to execute a task's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    JavaScript,
    Python,
    ShellScript,
}

impl HandlerKind {
    /// Selection order: the first kind present in a manifest wins.
    pub const PRIORITY: [HandlerKind; 3] = [
        HandlerKind::JavaScript,
        HandlerKind::Python,
        HandlerKind::ShellScript,
    ];

    /// Key of this kind in the manifest's `execution` block.
    pub fn manifest_key(self) -> &'static str {
        match self {
            HandlerKind::JavaScript => "JavaScript",
            HandlerKind::Python => "Python",
            HandlerKind::ShellScript => "ShellScript",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// Declared type of a task input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputType {
    /// Rewritten to an absolute path against the source folder before the task runs.
    FilePath,
    /// Anything else; passed through untouched.
    Plain(String),
}

impl From<String> for InputType {
    fn from(tag: String) -> Self {
        if tag == "filePath" {
            InputType::FilePath
        } else {
            InputType::Plain(tag)
        }
    }
}

impl From<InputType> for String {
    fn from(t: InputType) -> Self {
        match t {
            InputType::FilePath => "filePath".to_string(),
            InputType::Plain(tag) => tag,
        }
    }
}

impl Default for InputType {
    fn default() -> Self {
        InputType::Plain("string".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDefinition {
    pub name: String,

    #[serde(rename = "type", default)]
    pub input_type: InputType,
}

/// One entry of the manifest's execution block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    /// Entry point, relative to the task's package directory.
    pub target: String,
}

/// Parsed `task.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub inputs: Vec<InputDefinition>,

    /// Keyed by handler kind name; unknown kinds are kept but never selected.
    pub execution: HashMap<String, ExecutionEntry>,
}

impl TaskMetadata {
    pub fn file_path_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|i| i.input_type == InputType::FilePath)
            .map(|i| i.name.as_str())
    }

    /// Pick the first supported handler kind in priority order.
    pub fn select_handler(&self) -> Option<(HandlerKind, &ExecutionEntry)> {
        HandlerKind::PRIORITY
            .into_iter()
            .find_map(|kind| self.execution.get(kind.manifest_key()).map(|e| (kind, e)))
    }
}

/// Which runtime to use and what to run. One per task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDescriptor {
    pub handler: HandlerKind,
    pub entry_point: PathBuf,
}

/// A loaded task package: where it lives and what its manifest says.
#[derive(Debug, Clone)]
pub struct TaskPackage {
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub metadata: TaskMetadata,
}

impl TaskPackage {
    pub fn new(dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>, metadata: TaskMetadata) -> Self {
        Self {
            dir: dir.into(),
            manifest_path: manifest_path.into(),
            metadata,
        }
    }

    /// Resolve the execution descriptor, entry point made relative to the package dir.
    pub fn descriptor(&self) -> Result<ExecutionDescriptor, PrepareError> {
        let (handler, entry) =
            self.metadata
                .select_handler()
                .ok_or_else(|| PrepareError::NoSupportedHandler {
                    path: self.manifest_path.clone(),
                })?;
        Ok(ExecutionDescriptor {
            handler,
            entry_point: self.dir.join(Path::new(&entry.target)),
        })
    }
}
