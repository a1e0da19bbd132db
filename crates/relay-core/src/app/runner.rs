//! JobRunner - 1 ジョブの実行
//!
//! # 実行順
//! 1. 入力に変数を置換（1 回目）
//! 2. 全タスクを並行して準備。1 つでも失敗したらジョブは Failed で終了
//! 3. timeline を登録（before プラグイン → タスク → after プラグイン）
//! 4. ジョブの作業フォルダを作成
//! 5. ジョブを InProgress に
//! 6. before プラグイン、その後で変数を再置換（2 回目）
//! 7. before が成功したときだけタスクを順に実行
//! 8. after プラグインは必ず実行
//! 9. 最後に残った Pending は Skipped、InProgress は Failed で閉じる
//!
//! # 失敗の扱い
//! - タスクが `error` を記録しただけなら Failed にして次のタスクへ進む
//! - ハンドラのハードエラーはループを止める（残りは Skipped）
//! - timeline の不整合などのオーケストレーションエラーは必ず Failed

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::domain::inputs::resolve_file_path_inputs;
use crate::domain::vars::{lookup, substitute_inputs};
use crate::domain::{DispatchError, JobError, JobReport, JobRequest, TaskInstance, TaskResult};
use crate::ports::{Clock, FeedbackSink, HandlerRegistry, PluginRegistry, TaskMetadataSource};

use super::job_context::JobContext;
use super::plugins::{PhaseOutcome, PluginLifecycle};
use super::prepare::{PreparedTask, PreparedTasks, prepare_tasks};

/// Runs jobs. Built by [`EngineBuilder`](super::EngineBuilder); shareable across jobs.
pub struct JobRunner {
    pub(crate) agent: Arc<AgentConfig>,
    pub(crate) source: Arc<dyn TaskMetadataSource>,
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) plugins: Arc<dyn PluginRegistry>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl JobRunner {
    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Run one job to completion. Never fails: every outcome is in the report.
    #[tracing::instrument(skip(self, job, feedback), fields(job_id = %job.job_id))]
    pub async fn run(&self, mut job: JobRequest, feedback: Arc<dyn FeedbackSink>) -> JobReport {
        let job_type = job
            .job_type
            .clone()
            .unwrap_or_else(|| self.agent.job_type.clone());
        let working_folder = self.agent.job_working_folder(job.job_id);

        let vars = job.environment.variables.clone();
        substitute_inputs(&mut job.tasks, &vars);

        let mut ctx = JobContext::new(job, working_folder, feedback, Arc::clone(&self.clock));
        let mut errors = Vec::new();

        let success = match self.execute(&mut ctx, &job_type, &mut errors).await {
            Ok(success) => success,
            Err(err) => {
                record(&mut ctx, &mut errors, err);
                false
            }
        };

        if let Err(err) = ctx.close_open_records() {
            record(&mut ctx, &mut errors, err.into());
        }

        let status = ctx.finalize(success && errors_allow_success(&errors) && !ctx.has_errors());
        ctx.info(format!("Job {} finished: {status:?}", ctx.job_id()));

        ctx.report(errors.iter().map(ToString::to_string).collect())
    }

    /// Steps after pass-1 substitution. `Err` means nothing after the failing step ran.
    async fn execute(
        &self,
        ctx: &mut JobContext,
        job_type: &str,
        errors: &mut Vec<JobError>,
    ) -> Result<bool, JobError> {
        let prepared = prepare_tasks(
            self.source.as_ref(),
            &ctx.job().tasks,
            self.agent.prepare_limit(),
        )
        .await?;

        let lifecycle = PluginLifecycle::load(self.plugins.as_ref(), job_type).await?;
        lifecycle.register_timeline(ctx)?;

        tokio::fs::create_dir_all(ctx.working_folder())
            .await
            .map_err(|source| JobError::Setup {
                path: ctx.working_folder().to_path_buf(),
                source,
            })?;

        ctx.set_job_in_progress()?;

        let mut success = true;

        let before = lifecycle.run_before_phase(ctx, &self.agent).await;
        success &= absorb_phase(ctx, errors, before);

        let vars = ctx.variables().clone();
        substitute_inputs(ctx.tasks_mut(), &vars);

        if success {
            match self.run_tasks(ctx, &prepared, errors).await {
                Ok(tasks_ok) => success &= tasks_ok,
                Err(err) => {
                    record(ctx, errors, err);
                    success = false;
                }
            }
        } else {
            ctx.info("Skipping tasks: a before-job plugin did not succeed");
        }

        let after = lifecycle.run_after_phase(ctx, &self.agent, success).await;
        success &= absorb_phase(ctx, errors, after);

        Ok(success)
    }

    /// Execute tasks one at a time in declared order.
    ///
    /// `Ok(false)` if any task failed; `Err` on the first hard dispatch error.
    async fn run_tasks(
        &self,
        ctx: &mut JobContext,
        prepared: &PreparedTasks,
        errors: &mut Vec<JobError>,
    ) -> Result<bool, JobError> {
        let mut success = true;
        let tasks: Vec<TaskInstance> = ctx.job().tasks.clone();

        for mut task in tasks {
            let prep = prepared.get(task.instance_id).ok_or_else(|| {
                JobError::Orchestration(format!("task {} was never prepared", task.instance_id))
            })?;

            ctx.write_console_section(&format!("Task: {}", task.name));
            ctx.set_task_started(task.instance_id)?;
            self.resolve_inputs(ctx, &mut task, prep);

            let task_ctx = ctx.create_task_context(&task).await?;
            let dispatched = self.handlers.dispatch(&prep.descriptor, &task_ctx).await;
            let ok = dispatched.is_ok() && !task_ctx.has_errors();
            task_ctx.end().await;

            close_task(ctx, errors, &task, dispatched, ok)?;
            success &= ok;
        }

        Ok(success)
    }

    /// Rewrite `filePath` inputs against the source folder.
    fn resolve_inputs(&self, ctx: &JobContext, task: &mut TaskInstance, prep: &PreparedTask) {
        let metadata = &prep.package.metadata;
        if metadata.file_path_inputs().next().is_none() {
            return;
        }

        let variable = &self.agent.source_folder_variable;
        let base = match lookup(ctx.variables(), variable) {
            // 相対パスはジョブの作業フォルダ基準
            Some(folder) => ctx.working_folder().join(folder),
            None => {
                ctx.verbose(format!(
                    "{variable} is not set; resolving file paths against {}",
                    ctx.working_folder().display()
                ));
                ctx.working_folder().to_path_buf()
            }
        };

        for name in resolve_file_path_inputs(task, metadata, &base) {
            if let Some(value) = task.inputs.get(&name) {
                ctx.verbose(format!("{name}: {value}"));
            }
        }
    }
}

/// Give a dispatched task its final state. A dispatch error is returned even
/// when the timeline update fails too; the timeline error is recorded alongside.
fn close_task(
    ctx: &mut JobContext,
    errors: &mut Vec<JobError>,
    task: &TaskInstance,
    dispatched: Result<(), DispatchError>,
    ok: bool,
) -> Result<(), JobError> {
    let closed = ctx.set_task_result(task.instance_id, TaskResult::from_success(ok));
    match dispatched {
        Ok(()) => Ok(closed?),
        Err(source) => {
            if let Err(err) = closed {
                record(ctx, errors, err.into());
            }
            Err(JobError::Dispatch {
                task: task.name.clone(),
                instance: task.instance_id,
                source,
            })
        }
    }
}

fn record(ctx: &mut JobContext, errors: &mut Vec<JobError>, err: JobError) {
    ctx.error(err.to_string());
    tracing::warn!(target: "relay.job", kind = ?err.kind(), error = %err, "job error");
    errors.push(err);
}

/// Fold a phase result into the job. Plugin errors were already logged by the phase.
fn absorb_phase(
    ctx: &mut JobContext,
    errors: &mut Vec<JobError>,
    phase: Result<PhaseOutcome, JobError>,
) -> bool {
    match phase {
        Ok(outcome) => {
            errors.extend(outcome.errors.into_iter().map(JobError::from));
            outcome.success
        }
        Err(err) => {
            record(ctx, errors, err);
            false
        }
    }
}

/// Any recorded error fails the job, whatever the phase booleans say.
fn errors_allow_success(errors: &[JobError]) -> bool {
    errors.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EngineBuilder;
    use crate::domain::{ErrorKind, HandlerKind, JobStatus, RecordKind, RecordState, TimelineRecord};
    use crate::config::CommandSpec;
    use crate::impls::{CommandHandler, InMemoryFeedback, StaticPluginRegistry};
    use crate::ports::SystemClock;
    use std::path::PathBuf;
    use crate::testing::{
        BrokenRegistry, CallLog, FakeHandler, FakePlugin, FakeSource, HandlerBehavior, PluginBehavior,
    };
    use rstest::rstest;
    use tempfile::TempDir;

    struct Harness {
        _work: TempDir,
        runner: JobRunner,
        handler: Arc<FakeHandler>,
        feedback: Arc<InMemoryFeedback>,
    }

    impl Harness {
        fn new(source: FakeSource, handler: FakeHandler, plugins: StaticPluginRegistry) -> Self {
            Self::with_agent(source, handler, plugins, |_| {})
        }

        fn with_agent(
            source: FakeSource,
            handler: FakeHandler,
            plugins: StaticPluginRegistry,
            tweak: impl FnOnce(&mut AgentConfig),
        ) -> Self {
            let work = TempDir::new().unwrap();
            let mut agent = AgentConfig {
                work_folder: work.path().to_path_buf(),
                ..AgentConfig::default()
            };
            tweak(&mut agent);

            let handler = handler.shared();
            let runner = EngineBuilder::new(agent)
                .handler(HandlerKind::JavaScript, handler.clone())
                .unwrap()
                .metadata_source(Arc::new(source))
                .plugin_registry(Arc::new(plugins))
                .build()
                .unwrap();

            Self {
                _work: work,
                runner,
                handler,
                feedback: Arc::new(InMemoryFeedback::new()),
            }
        }

        async fn run(&self, job: JobRequest) -> JobReport {
            self.runner.run(job, self.feedback.clone()).await
        }

        /// States each task record passed through, in order of first appearance.
        fn task_history(&self, name: &str) -> Vec<RecordState> {
            self.feedback
                .timeline_events()
                .into_iter()
                .filter(|r: &TimelineRecord| r.kind == RecordKind::Task && r.name == name)
                .map(|r| r.state)
                .collect()
        }
    }

    fn job(names: &[&str]) -> JobRequest {
        JobRequest::new(names.iter().map(|n| TaskInstance::new(*n, "1.0.0")).collect())
    }

    fn state_of(report: &JobReport, name: &str) -> RecordState {
        report
            .timeline
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.state)
            .expect("record present")
    }

    #[rstest]
    #[case::none(&[])]
    #[case::one(&["A"])]
    #[case::several(&["A", "B", "C", "D", "E"])]
    #[tokio::test]
    async fn every_task_is_dispatched_once_in_declared_order(#[case] names: &[&str]) {
        let h = Harness::new(FakeSource::new(), FakeHandler::new(), StaticPluginRegistry::new());

        let report = h.run(job(names)).await;

        assert_eq!(report.status, JobStatus::Succeeded);
        assert_eq!(h.handler.dispatched_names(), names.to_vec());
    }

    #[tokio::test]
    async fn successful_job_walks_each_task_through_the_timeline() {
        let h = Harness::new(FakeSource::new(), FakeHandler::new(), StaticPluginRegistry::new());

        let report = h.run(job(&["A", "B", "C"])).await;

        assert_eq!(report.status, JobStatus::Succeeded);
        assert!(report.errors.is_empty());
        for name in ["A", "B", "C"] {
            assert_eq!(
                h.task_history(name),
                vec![RecordState::Pending, RecordState::InProgress, RecordState::Succeeded]
            );
        }

        let started: Vec<String> = h
            .feedback
            .timeline_events()
            .into_iter()
            .filter(|r| r.state == RecordState::InProgress)
            .map(|r| r.name)
            .collect();
        assert_eq!(started, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn whole_plan_is_visible_before_anything_starts() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new().register("build", FakePlugin::both("workspace").shared()),
        );

        h.run(job(&["A", "B"])).await;

        let events = h.feedback.timeline_events();
        let first_start = events
            .iter()
            .position(|r| r.state == RecordState::InProgress)
            .expect("something started");
        let registered: Vec<&str> = events[..first_start].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(registered, vec!["workspace", "A", "B", "workspace"]);
    }

    #[rstest]
    #[case::serial(1)]
    #[case::bounded(5)]
    #[case::unbounded(0)]
    #[tokio::test]
    async fn preparation_failure_dispatches_nothing(#[case] concurrency: usize) {
        let h = Harness::with_agent(
            FakeSource::new().invalid("A"),
            FakeHandler::new(),
            StaticPluginRegistry::new().register("build", FakePlugin::both("workspace").shared()),
            |agent| agent.prepare_concurrency = concurrency,
        );

        let report = h.run(job(&["A", "B"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert!(h.handler.dispatched().is_empty());
        assert!(report.timeline.is_empty());
        assert!(h.task_history("B").is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("A"));
    }

    #[rstest]
    #[case::serial(1)]
    #[case::bounded(5)]
    #[case::unbounded(0)]
    #[tokio::test]
    async fn outcome_does_not_depend_on_preparation_bound(#[case] concurrency: usize) {
        let h = Harness::with_agent(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new(),
            |agent| agent.prepare_concurrency = concurrency,
        );
        let names = ["A", "B", "C", "D", "E", "F", "G"];

        let report = h.run(job(&names)).await;

        assert_eq!(report.status, JobStatus::Succeeded);
        assert_eq!(h.handler.dispatched_names(), names.to_vec());
    }

    #[tokio::test]
    async fn logged_error_fails_the_task_but_not_the_loop() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new().on("A", HandlerBehavior::LogError),
            StaticPluginRegistry::new(),
        );

        let report = h.run(job(&["A", "B"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(h.handler.dispatched_names(), vec!["A", "B"]);
        assert_eq!(state_of(&report, "A"), RecordState::Failed);
        assert_eq!(state_of(&report, "B"), RecordState::Succeeded);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn hard_dispatch_error_halts_the_loop() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new().on("B", HandlerBehavior::Hard),
            StaticPluginRegistry::new(),
        );

        let report = h.run(job(&["A", "B", "C"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(h.handler.dispatched_names(), vec!["A", "B"]);
        assert_eq!(state_of(&report, "A"), RecordState::Succeeded);
        assert_eq!(state_of(&report, "B"), RecordState::Failed);
        assert_eq!(state_of(&report, "C"), RecordState::Skipped);
        assert_eq!(h.task_history("C"), vec![RecordState::Pending, RecordState::Skipped]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("failed to dispatch"));
    }

    #[tokio::test]
    async fn hard_error_still_runs_after_job_plugins() {
        let after = FakePlugin::after_only("publish").shared();
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new().on("A", HandlerBehavior::Hard),
            StaticPluginRegistry::new().register("build", after.clone()),
        );

        let report = h.run(job(&["A"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(after.after_signals(), vec![false]);
        assert_eq!(state_of(&report, "publish"), RecordState::Succeeded);
    }

    #[rstest]
    #[case::reported(PluginBehavior::ReportFailure)]
    #[case::errored(PluginBehavior::Error)]
    #[tokio::test]
    async fn before_plugin_failure_skips_tasks_and_still_runs_after_plugins(
        #[case] behavior: PluginBehavior,
    ) {
        let log = CallLog::default();
        let setup = FakePlugin::before_only("setup")
            .behaving(behavior)
            .with_log(log.clone())
            .shared();
        let cleanup = FakePlugin::after_only("cleanup").with_log(log.clone()).shared();
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new().with_log(log.clone()),
            StaticPluginRegistry::new()
                .register("build", setup.clone())
                .register("build", cleanup.clone()),
        );

        let report = h.run(job(&["A", "B"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(log.entries(), vec!["before:setup", "after:cleanup"]);
        assert_eq!(cleanup.after_signals(), vec![false]);
        for name in ["A", "B"] {
            assert!(!h.task_history(name).contains(&RecordState::InProgress));
            assert_eq!(state_of(&report, name), RecordState::Skipped);
        }
    }

    #[tokio::test]
    async fn after_plugins_run_once_everything_else_finished() {
        let log = CallLog::default();
        let workspace = FakePlugin::both("workspace").with_log(log.clone()).shared();
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new().with_log(log.clone()),
            StaticPluginRegistry::new().register("build", workspace.clone()),
        );

        let report = h.run(job(&["A", "B"])).await;

        assert_eq!(report.status, JobStatus::Succeeded);
        assert_eq!(
            log.entries(),
            vec!["before:workspace", "task:A", "task:B", "after:workspace"]
        );
        assert_eq!(workspace.after_signals(), vec![true]);
    }

    #[tokio::test]
    async fn failing_after_plugin_fails_an_otherwise_good_job() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new().register(
                "build",
                FakePlugin::after_only("publish")
                    .behaving(PluginBehavior::Error)
                    .shared(),
            ),
        );

        let report = h.run(job(&["A"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(state_of(&report, "A"), RecordState::Succeeded);
        assert_eq!(state_of(&report, "publish"), RecordState::Failed);
        assert_eq!(report.errors, vec!["plugin publish: exploded".to_string()]);
    }

    #[tokio::test]
    async fn job_level_error_from_a_succeeding_plugin_fails_the_job() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new()
                .register("build", FakePlugin::after_only("audit").behaving(PluginBehavior::LogError).shared()),
        );

        let report = h.run(job(&["A"])).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(state_of(&report, "A"), RecordState::Succeeded);
        assert_eq!(state_of(&report, "audit"), RecordState::Succeeded);
        assert!(
            h.feedback
                .lines()
                .contains(&"[error] plugin audit: complained".to_string())
        );
    }

    #[tokio::test]
    async fn plugin_load_failure_fails_before_any_timeline() {
        let work = TempDir::new().unwrap();
        let handler = FakeHandler::new().shared();
        let runner = EngineBuilder::new(AgentConfig {
            work_folder: work.path().to_path_buf(),
            ..AgentConfig::default()
        })
        .handler(HandlerKind::JavaScript, handler.clone())
        .unwrap()
        .metadata_source(Arc::new(FakeSource::new()))
        .plugin_registry(Arc::new(BrokenRegistry))
        .build()
        .unwrap();

        let report = runner.run(job(&["A"]), Arc::new(InMemoryFeedback::new())).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.timeline.is_empty());
        assert!(handler.dispatched().is_empty());
    }

    #[tokio::test]
    async fn job_type_selects_the_plugin_set() {
        let release = FakePlugin::both("release-only").shared();
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new().register("release", release.clone()),
        );

        h.run(job(&["A"])).await;
        assert_eq!(release.before_calls(), 0);

        h.run(job(&["A"]).with_job_type("release")).await;
        assert_eq!(release.before_calls(), 1);
    }

    #[tokio::test]
    async fn variables_are_substituted_before_and_after_plugins() {
        let h = Harness::new(
            FakeSource::new(),
            FakeHandler::new(),
            StaticPluginRegistry::new().register(
                "build",
                FakePlugin::before_only("tools").setting("tool.path", "/opt/tool").shared(),
            ),
        );
        let job = JobRequest::new(vec![
            TaskInstance::new("A", "1")
                .with_input("config", "$(build.configuration)")
                .with_input("tool", "$(tool.path)/bin")
                .with_input("other", "$(nobody.knows)"),
        ])
        .with_variable("build.configuration", "Release");

        h.run(job).await;

        let seen = &h.handler.dispatched()[0].inputs;
        assert_eq!(seen["config"], "Release");
        assert_eq!(seen["tool"], "/opt/tool/bin");
        assert_eq!(seen["other"], "$(nobody.knows)");
    }

    #[tokio::test]
    async fn file_path_inputs_resolve_against_the_source_folder() {
        let h = Harness::new(
            FakeSource::new().with_file_input("A", "project"),
            FakeHandler::new(),
            StaticPluginRegistry::new(),
        );
        let job = JobRequest::new(vec![
            TaskInstance::new("A", "1")
                .with_input("project", "src/../app/app.csproj")
                .with_input("args", "src/app.csproj"),
        ])
        .with_variable("sys.sourceFolder", "/agent/s");

        h.run(job).await;

        let seen = &h.handler.dispatched()[0].inputs;
        assert_eq!(seen["project"], "/agent/s/app/app.csproj");
        assert_eq!(seen["args"], "src/app.csproj");
    }

    #[tokio::test]
    async fn file_path_inputs_fall_back_to_the_job_working_folder() {
        let h = Harness::new(
            FakeSource::new().with_file_input("A", "project"),
            FakeHandler::new(),
            StaticPluginRegistry::new(),
        );
        let job = JobRequest::new(vec![TaskInstance::new("A", "1").with_input("project", "app.csproj")]);
        let job_folder = h.runner.agent().job_working_folder(job.job_id);

        h.run(job).await;

        let seen = &h.handler.dispatched()[0].inputs;
        assert_eq!(
            seen["project"],
            job_folder.join("app.csproj").to_string_lossy()
        );
        assert!(
            h.feedback
                .lines()
                .iter()
                .any(|l| l.starts_with("[verbose] sys.sourceFolder is not set"))
        );
    }

    #[tokio::test]
    async fn relative_source_folder_resolves_under_the_job_working_folder() {
        let h = Harness::new(
            FakeSource::new().with_file_input("A", "project"),
            FakeHandler::new(),
            StaticPluginRegistry::new(),
        );
        let job = JobRequest::new(vec![TaskInstance::new("A", "1").with_input("project", "app.csproj")])
            .with_variable("sys.sourceFolder", "s");
        let job_folder = h.runner.agent().job_working_folder(job.job_id);

        h.run(job).await;

        let seen = &h.handler.dispatched()[0].inputs;
        let project = PathBuf::from(&seen["project"]);
        assert!(project.is_absolute());
        assert_eq!(project, job_folder.join("s").join("app.csproj"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_task_runs_with_a_relative_work_folder() {
        let tmp = TempDir::new_in(".").unwrap();
        let relative = PathBuf::from(".").join(tmp.path().file_name().unwrap());
        let package = tmp.path().join("tasks").join("Build").join("1.0.0");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(
            package.join("task.json"),
            r#"{"inputs":[{"name":"project","type":"filePath"}],"execution":{"ShellScript":{"target":"run.sh"}}}"#,
        )
        .unwrap();
        std::fs::write(package.join("run.sh"), "echo \"project=$INPUT_PROJECT\"\n").unwrap();

        let runner = EngineBuilder::new(AgentConfig {
            work_folder: relative,
            ..AgentConfig::default()
        })
        .handler(
            HandlerKind::ShellScript,
            Arc::new(CommandHandler::new(CommandSpec::new("sh"))),
        )
        .unwrap()
        .build()
        .unwrap();
        let feedback = Arc::new(InMemoryFeedback::new());
        let job = JobRequest::new(vec![
            TaskInstance::new("Build", "1.0.0").with_input("project", "app.csproj"),
        ])
        .with_variable("sys.sourceFolder", "s");
        let job_folder = runner.agent().job_working_folder(job.job_id);

        let report = runner.run(job, feedback.clone()).await;

        assert_eq!(report.status, JobStatus::Succeeded, "{:?}", feedback.lines());
        assert!(job_folder.is_absolute());
        let expected = format!("project={}", job_folder.join("s").join("app.csproj").display());
        assert!(feedback.lines().contains(&expected), "{:?}", feedback.lines());
    }

    #[tokio::test]
    async fn each_task_gets_its_own_existing_working_folder() {
        let h = Harness::new(FakeSource::new(), FakeHandler::new(), StaticPluginRegistry::new());
        let job = job(&["A", "B"]);
        let job_folder = h.runner.agent().job_working_folder(job.job_id);

        h.run(job).await;

        let seen = h.handler.dispatched();
        assert!(seen.iter().all(|d| d.working_folder_existed));
        assert!(seen.iter().all(|d| d.working_folder.starts_with(&job_folder)));
        assert_ne!(seen[0].working_folder, seen[1].working_folder);
        assert_eq!(seen[0].entry_point, PathBuf::from("/pkgs/A/1.0.0/index.js"));
    }

    #[tokio::test]
    async fn console_stream_marks_task_boundaries() {
        let h = Harness::new(FakeSource::new(), FakeHandler::new(), StaticPluginRegistry::new());

        h.run(job(&["A", "B"])).await;

        let lines = h.feedback.lines();
        let a = lines.iter().position(|l| l.contains("Task: A")).expect("A section");
        let b = lines.iter().position(|l| l.contains("Task: B")).expect("B section");
        let done = lines.iter().position(|l| l == "done").expect("task output");
        assert!(a < done && done < b);
    }

    #[tokio::test]
    async fn unregistered_handler_kind_is_a_dispatch_error() {
        let work = TempDir::new().unwrap();
        let runner = EngineBuilder::new(AgentConfig {
            work_folder: work.path().to_path_buf(),
            ..AgentConfig::default()
        })
        .metadata_source(Arc::new(FakeSource::new()))
        .build()
        .unwrap();

        let report = runner
            .run(job(&["A", "B"]), Arc::new(InMemoryFeedback::new()))
            .await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(state_of(&report, "A"), RecordState::Failed);
        assert_eq!(state_of(&report, "B"), RecordState::Skipped);
        assert!(report.errors[0].contains("no handler registered"));
    }

    #[test]
    fn dispatch_error_survives_a_failed_timeline_update() {
        let mut ctx = JobContext::new(
            JobRequest::new(vec![]),
            std::env::temp_dir(),
            Arc::new(InMemoryFeedback::new()),
            Arc::new(SystemClock),
        );
        let task = TaskInstance::new("A", "1.0.0");
        let mut errors = Vec::new();

        // A 用の record は登録されていないので timeline の更新は失敗する
        let err = close_task(
            &mut ctx,
            &mut errors,
            &task,
            Err(DispatchError::Failed("handler crashed".into())),
            false,
        )
        .unwrap_err();

        assert!(matches!(err, JobError::Dispatch { ref task, .. } if task == "A"));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], JobError::Timeline(_)));
        assert!(ctx.has_errors());
    }

    #[test]
    fn timeline_error_alone_is_returned_when_dispatch_succeeded() {
        let mut ctx = JobContext::new(
            JobRequest::new(vec![]),
            std::env::temp_dir(),
            Arc::new(InMemoryFeedback::new()),
            Arc::new(SystemClock),
        );
        let mut errors = Vec::new();

        let err = close_task(&mut ctx, &mut errors, &TaskInstance::new("A", "1.0.0"), Ok(()), true)
            .unwrap_err();

        assert!(matches!(err, JobError::Timeline(_)));
        assert!(errors.is_empty());
    }

    #[test]
    fn recorded_errors_forbid_success() {
        assert!(errors_allow_success(&[]));
        let err = JobError::Orchestration("boom".into());
        assert_eq!(err.kind(), ErrorKind::Orchestration);
        assert!(!errors_allow_success(&[err]));
    }
}
