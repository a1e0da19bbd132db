use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Run build/release jobs on this agent")]
pub struct Cli {
    /// Agent config (agent.toml). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job and print its report as JSON.
    Run(JobArgs),
    /// Only prepare the job's tasks and print their execution descriptors.
    Prepare(JobArgs),
}

#[derive(Args, Debug)]
pub struct JobArgs {
    /// Job request file (JSON).
    #[arg(long, short = 'j')]
    pub job: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,
}
