//! PluginLifecycle - プラグインの before/after フェーズ
//!
//! # 学習ポイント
//! - フェーズ内は登録順に直列実行
//! - プラグインのエラーは記録して集計するだけ（兄弟プラグインは止めない）
//! - timeline の不整合だけはオーケストレーションエラーとして返す

use crate::config::AgentConfig;
use crate::domain::{JobError, PluginError, RecordKind, TaskResult};
use crate::ports::{PluginHook, PluginRegistry, PluginSet};

use super::job_context::JobContext;

/// Result of one plugin phase.
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    /// `true` only if every hook ran, returned `Ok(true)`, and none errored.
    pub success: bool,
    pub errors: Vec<PluginError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After { job_success: bool },
}

pub struct PluginLifecycle {
    plugins: PluginSet,
}

impl PluginLifecycle {
    pub fn new(plugins: PluginSet) -> Self {
        Self { plugins }
    }

    /// Load the plugin set for `job_type` from the registry.
    pub async fn load(registry: &dyn PluginRegistry, job_type: &str) -> Result<Self, JobError> {
        let plugins = registry.load(job_type).await?;
        tracing::info!(
            target: "relay.plugin",
            job_type,
            before = plugins.before_job.len(),
            after = plugins.after_job.len(),
            "plugins loaded"
        );
        Ok(Self::new(plugins))
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Register the whole planned work list as Pending:
    /// before-job hooks, then tasks in declared order, then after-job hooks.
    pub fn register_timeline(&self, job: &mut JobContext) -> Result<(), JobError> {
        for hook in &self.plugins.before_job {
            job.register_pending_task(hook.hook_id, hook.name(), RecordKind::Plugin)?;
        }
        let tasks: Vec<_> = job
            .job()
            .tasks
            .iter()
            .map(|t| (t.instance_id, t.name.clone()))
            .collect();
        for (id, name) in tasks {
            job.register_pending_task(id, &name, RecordKind::Task)?;
        }
        for hook in &self.plugins.after_job {
            job.register_pending_task(hook.hook_id, hook.name(), RecordKind::Plugin)?;
        }
        Ok(())
    }

    pub async fn run_before_phase(
        &self,
        job: &mut JobContext,
        agent: &AgentConfig,
    ) -> Result<PhaseOutcome, JobError> {
        run_phase(&self.plugins.before_job, Phase::Before, job, agent).await
    }

    /// Runs every after-job hook no matter what happened before.
    pub async fn run_after_phase(
        &self,
        job: &mut JobContext,
        agent: &AgentConfig,
        job_success: bool,
    ) -> Result<PhaseOutcome, JobError> {
        run_phase(
            &self.plugins.after_job,
            Phase::After { job_success },
            job,
            agent,
        )
        .await
    }
}

async fn run_phase(
    hooks: &[PluginHook],
    phase: Phase,
    job: &mut JobContext,
    agent: &AgentConfig,
) -> Result<PhaseOutcome, JobError> {
    let mut outcome = PhaseOutcome {
        success: true,
        errors: Vec::new(),
    };

    for hook in hooks {
        job.set_task_started(hook.hook_id)?;
        tracing::info!(target: "relay.plugin", plugin = hook.name(), ?phase, "running plugin");

        let result = match phase {
            Phase::Before => hook.plugin.before_job(job, agent).await,
            Phase::After { job_success } => hook.plugin.after_job(job, agent, job_success).await,
        };

        let ok = match result {
            Ok(true) => true,
            Ok(false) => {
                job.error(format!("plugin {} reported failure", hook.name()));
                false
            }
            Err(err) => {
                job.error(err.to_string());
                tracing::warn!(target: "relay.plugin", plugin = hook.name(), error = %err, "plugin error");
                outcome.errors.push(err);
                false
            }
        };

        outcome.success &= ok;
        job.set_task_result(hook.hook_id, TaskResult::from_success(ok))?;
    }

    Ok(outcome)
}
