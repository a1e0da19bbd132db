//! Agent configuration (`agent.toml`).
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Environment overrides: `RELAY_WORK_FOLDER`, `RELAY_LOG_LEVEL`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::inputs::normalize;
use crate::domain::{HandlerKind, JobId};

pub const DEFAULT_PREPARE_CONCURRENCY: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not resolve work folder {path}: {source}")]
    WorkFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Root for task packages (`tasks/`) and job working folders (`work/`).
    #[serde(default = "default_work_folder")]
    pub work_folder: PathBuf,

    /// Plugin set used when the job request does not name one.
    #[serde(default = "default_job_type")]
    pub job_type: String,

    /// Max tasks prepared at once; 0 means unbounded.
    #[serde(default = "default_prepare_concurrency")]
    pub prepare_concurrency: usize,

    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Variable holding the checked-out sources; `filePath` inputs resolve against it.
    #[serde(default = "default_source_folder_variable")]
    pub source_folder_variable: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub handlers: HandlersConfig,
}

fn default_work_folder() -> PathBuf {
    PathBuf::from("./_work")
}

fn default_job_type() -> String {
    "build".to_string()
}

fn default_prepare_concurrency() -> usize {
    DEFAULT_PREPARE_CONCURRENCY
}

fn default_manifest_file() -> String {
    "task.json".to_string()
}

fn default_source_folder_variable() -> String {
    "sys.sourceFolder".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            work_folder: default_work_folder(),
            job_type: default_job_type(),
            prepare_concurrency: default_prepare_concurrency(),
            manifest_file: default_manifest_file(),
            source_folder_variable: default_source_folder_variable(),
            logging: LoggingConfig::default(),
            handlers: HandlersConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Parse a config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.apply_env_overrides();
        cfg.with_absolute_work_folder()
    }

    /// Load `path` if given, otherwise defaults (environment overrides apply either way).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg.with_absolute_work_folder()
            }
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELAY_WORK_FOLDER")
            && !v.trim().is_empty()
        {
            self.work_folder = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RELAY_LOG_LEVEL")
            && !v.trim().is_empty()
        {
            self.logging.level = v;
        }
    }

    /// Anchor `work_folder` at the current directory.
    ///
    /// Task processes run in their own working folder, so every path derived
    /// from here (entry points, job folders, resolved inputs) must be absolute.
    pub fn with_absolute_work_folder(mut self) -> Result<Self, ConfigError> {
        let absolute = std::path::absolute(&self.work_folder).map_err(|source| {
            ConfigError::WorkFolder {
                path: self.work_folder.clone(),
                source,
            }
        })?;
        self.work_folder = normalize(&absolute);
        Ok(self)
    }

    /// `None` when preparation should race every task.
    pub fn prepare_limit(&self) -> Option<usize> {
        (self.prepare_concurrency > 0).then_some(self.prepare_concurrency)
    }

    pub fn package_root(&self) -> PathBuf {
        self.work_folder.join("tasks")
    }

    pub fn job_working_folder(&self, job_id: JobId) -> PathBuf {
        self.work_folder.join("work").join(job_id.as_ulid().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub console: bool,

    /// Also write a log file here when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: true,
            directory: None,
        }
    }
}

/// Program used to launch a task entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersConfig {
    #[serde(default = "default_javascript")]
    pub javascript: CommandSpec,

    #[serde(default = "default_python")]
    pub python: CommandSpec,

    #[serde(default = "default_shell")]
    pub shell: CommandSpec,
}

fn default_javascript() -> CommandSpec {
    CommandSpec::new("node")
}

fn default_python() -> CommandSpec {
    CommandSpec::new("python3")
}

fn default_shell() -> CommandSpec {
    CommandSpec::new("sh")
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            javascript: default_javascript(),
            python: default_python(),
            shell: default_shell(),
        }
    }
}

impl HandlersConfig {
    pub fn command_for(&self, kind: HandlerKind) -> &CommandSpec {
        match kind {
            HandlerKind::JavaScript => &self.javascript,
            HandlerKind::Python => &self.python,
            HandlerKind::ShellScript => &self.shell,
        }
    }
}
