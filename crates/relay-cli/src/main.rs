use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use relay_core::app::{EngineBuilder, JobRunner, prepare_tasks};
use relay_core::config::AgentConfig;
use relay_core::domain::vars::substitute_inputs;
use relay_core::domain::{HandlerKind, JobRequest};
use relay_core::impls::{
    CommandHandler, FsMetadataSource, StaticPluginRegistry, TracingFeedback, WorkspacePlugin,
};
use relay_core::ports::{SystemClock, UlidGenerator};

mod args;
mod logging;

use args::{Cli, Commands, JobArgs};

#[tokio::main]
async fn main() {
    let code = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            2
        }
    };
    std::process::exit(code);
}

async fn real_main() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let agent = AgentConfig::load_or_default(cli.config.as_deref())?;
    logging::init(&agent.logging)?;

    match cli.command {
        Commands::Run(args) => run(agent, &args).await,
        Commands::Prepare(args) => prepare(agent, &args).await,
    }
}

fn read_job(path: &Path) -> anyhow::Result<JobRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read job file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid job file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

/// Engine with a command handler per kind and the workspace plugin under the default job type.
fn build_engine(agent: AgentConfig) -> anyhow::Result<JobRunner> {
    let ids = UlidGenerator::new(SystemClock);
    let plugins = StaticPluginRegistry::new()
        .register(agent.job_type.clone(), Arc::new(WorkspacePlugin::new(&ids)));

    let mut builder = EngineBuilder::new(agent.clone()).plugin_registry(Arc::new(plugins));
    for kind in HandlerKind::PRIORITY {
        builder = builder.handler(kind, Arc::new(CommandHandler::for_kind(&agent.handlers, kind)))?;
    }
    Ok(builder.expect_handlers(&HandlerKind::PRIORITY).build()?)
}

async fn run(agent: AgentConfig, args: &JobArgs) -> anyhow::Result<i32> {
    let job = read_job(&args.job)?;
    let runner = build_engine(agent)?;

    tracing::info!(job_id = %job.job_id, tasks = job.tasks.len(), "running job");
    let report = runner.run(job, Arc::new(TracingFeedback)).await;
    print_json(&report, args.pretty)?;

    Ok(if report.succeeded() { 0 } else { 1 })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreparedTaskView {
    name: String,
    version: String,
    handler: HandlerKind,
    entry_point: PathBuf,
}

async fn prepare(agent: AgentConfig, args: &JobArgs) -> anyhow::Result<i32> {
    let mut job = read_job(&args.job)?;
    let vars = job.environment.variables.clone();
    substitute_inputs(&mut job.tasks, &vars);

    let source = FsMetadataSource::new(agent.package_root(), agent.manifest_file.clone());
    let prepared = match prepare_tasks(&source, &job.tasks, agent.prepare_limit()).await {
        Ok(prepared) => prepared,
        Err(err) => {
            eprintln!("preparation failed: {err}");
            return Ok(1);
        }
    };

    let view: BTreeMap<String, PreparedTaskView> = job
        .tasks
        .iter()
        .filter_map(|task| {
            prepared.get(task.instance_id).map(|p| {
                (
                    task.instance_id.to_string(),
                    PreparedTaskView {
                        name: task.name.clone(),
                        version: task.version.clone(),
                        handler: p.descriptor.handler,
                        entry_point: p.descriptor.entry_point.clone(),
                    },
                )
            })
        })
        .collect();
    print_json(&view, args.pretty)?;

    Ok(0)
}
