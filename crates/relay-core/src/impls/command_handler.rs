//! CommandHandler - エントリポイントを子プロセスとして実行する TaskHandler
//!
//! `<program> <args..> <entry point>` を起動します。
//!
//! - 作業ディレクトリは TaskContext の working folder を毎回明示的に渡す
//! - 入力は `INPUT_<NAME>` 環境変数として渡す
//! - stdout の各行は info、stderr の各行は verbose
//! - 0 以外の終了コードは `ctx.error`（タスクは Failed、ループは続く）
//! - 出力は UTF-8 でなくてもよい（不正なバイトは置換して記録）
//! - 起動や I/O の失敗は DispatchError（ループは止まる）

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::app::TaskContext;
use crate::config::{CommandSpec, HandlersConfig};
use crate::domain::{DispatchError, HandlerKind};
use crate::ports::TaskHandler;

#[derive(Debug, Clone)]
pub struct CommandHandler {
    command: CommandSpec,
}

impl CommandHandler {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }

    /// Handler for `kind` as configured in `[handlers]`.
    pub fn for_kind(handlers: &HandlersConfig, kind: HandlerKind) -> Self {
        Self::new(handlers.command_for(kind).clone())
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }
}

/// `INPUT_` + upper-cased name, every non-alphanumeric replaced by `_`.
pub fn input_env_name(name: &str) -> String {
    let mut var = String::from("INPUT_");
    var.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    var
}

/// One output line as text. Tasks may print any encoding; invalid UTF-8 is replaced, never fatal.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[async_trait]
impl TaskHandler for CommandHandler {
    async fn dispatch(&self, entry_point: &Path, ctx: &TaskContext) -> Result<(), DispatchError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg(entry_point)
            .current_dir(ctx.working_folder())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in ctx.inputs() {
            cmd.env(input_env_name(name), value);
        }

        tracing::debug!(
            target: "relay.task",
            task = ctx.name(),
            program = %self.command.program,
            entry_point = %entry_point.display(),
            cwd = %ctx.working_folder().display(),
            "spawning task process"
        );

        let mut child = cmd.spawn().map_err(|source| DispatchError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DispatchError::Failed("task stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DispatchError::Failed("task stderr was not captured".into()))?;

        let mut out = BufReader::new(stdout).split(b'\n');
        let mut err = BufReader::new(stderr).split(b'\n');
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                line = out.next_segment(), if out_open => match line? {
                    Some(raw) => ctx.info(decode_line(&raw)),
                    None => out_open = false,
                },
                line = err.next_segment(), if err_open => match line? {
                    Some(raw) => ctx.verbose(decode_line(&raw)),
                    None => err_open = false,
                },
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            match status.code() {
                Some(code) => ctx.error(format!(
                    "{} exited with code {code}",
                    entry_point.display()
                )),
                None => ctx.error(format!(
                    "{} was terminated by a signal",
                    entry_point.display()
                )),
            }
        }

        Ok(())
    }
}
