use core::fmt;
use std::{collections::VecDeque, fmt::Debug, process::Stdio};

use owo_colors::{AnsiColors, OwoColorize};
use stacked_errors::{Result, StackableErr};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    process::{self, Child},
    task::{self, JoinHandle},
};
use tracing::warn;

use crate::{acquire_dir_path, next_terminal_color, Command, CommandResult};

/// Used as the engine in the stdout and stderr recording tasks. Keeps the
/// last `record_limit` bytes and forwards lines with a prefix if requested.
async fn recorder<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    std_read: BufReader<R>,
    record_limit: Option<usize>,
    // write point, prefix, and color of the prefix
    mut std_forward: Option<(W, String, AnsiColors)>,
) -> Vec<u8> {
    let mut record = VecDeque::new();
    let mut lines = std_read.split(b'\n');
    loop {
        let mut line = match lines.next_segment().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("command stream recorder stopped early: {e}");
                break
            }
        };
        line.push(b'\n');
        record.extend(line.iter().copied());
        if let Some(limit) = record_limit {
            if record.len() > limit {
                let excess = record.len() - limit;
                record.drain(..excess);
            }
        }
        if let Some((ref mut forward, ref prefix, color)) = std_forward {
            let s = format!("{} {}", prefix.color(color), String::from_utf8_lossy(&line));
            // a closed terminal should not take down the command
            if forward.write_all(s.as_bytes()).await.is_err() {
                std_forward = None;
                continue
            }
            let _ = forward.flush().await;
        }
    }
    record.into()
}

/// A running [Command], finished with [CommandRunner::wait_with_output].
/// Dropping an unfinished runner kills the child and issues a warning.
#[must_use]
pub(crate) struct CommandRunner {
    // kept around for failures and the final result
    command: Option<Command>,
    child_process: Option<Child>,
    stdout_handle: Option<JoinHandle<Vec<u8>>>,
    stderr_handle: Option<JoinHandle<Vec<u8>>>,
}

impl Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("command", &self.command)
            .field("child_process", &self.child_process)
            .finish()
    }
}

impl Drop for CommandRunner {
    fn drop(&mut self) {
        if self.child_process.is_some() && (!std::thread::panicking()) {
            warn!(
                "A `CommandRunner` was dropped without being properly finished, the command was: \
                 {}",
                self.command
                    .as_ref()
                    .map(|c| c.get_unified_command())
                    .unwrap_or_default()
            )
        }
    }
}

/// Spawns `command` and the tasks that drain its standard streams
pub(crate) async fn spawn_runner<C: Into<Stdio>>(
    command: Command,
    stdin_cfg: C,
) -> Result<CommandRunner> {
    let mut cmd = process::Command::new(&command.program);
    if let Some(ref cwd) = command.cwd {
        let cwd = acquire_dir_path(cwd)
            .await
            .stack_err_with_locationless(|| format!("{command:?}.run_to_completion()"))?;
        cmd.current_dir(cwd);
    }
    cmd.args(&command.args)
        .envs(command.envs.iter().map(|x| (&x.0, &x.1)))
        .kill_on_drop(true);
    let mut child = cmd
        .stdin(stdin_cfg)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .stack_err_with_locationless(|| format!("{command:?}.run_to_completion() -> failed to spawn"))?;

    let prefix = format!(
        "{} {}",
        command.program.to_string_lossy(),
        child.id().unwrap_or_default()
    );
    let color = if command.debug {
        next_terminal_color()
    } else {
        AnsiColors::Default
    };

    let stdout = child
        .stdout
        .take()
        .stack_err_locationless("CommandRunner -> stdout was not piped")?;
    let stdout_handle = task::spawn(recorder(
        BufReader::new(stdout),
        command.record_limit,
        command
            .debug
            .then(|| (tokio::io::stdout(), format!("{prefix}  |"), color)),
    ));
    let stderr = child
        .stderr
        .take()
        .stack_err_locationless("CommandRunner -> stderr was not piped")?;
    let stderr_handle = task::spawn(recorder(
        BufReader::new(stderr),
        command.record_limit,
        command
            .debug
            .then(|| (tokio::io::stderr(), format!("{prefix} E|"), color)),
    ));

    Ok(CommandRunner {
        command: Some(command),
        child_process: Some(child),
        stdout_handle: Some(stdout_handle),
        stderr_handle: Some(stderr_handle),
    })
}

impl CommandRunner {
    /// Waits for the process to exit and for the stream recorders to finish
    pub(crate) async fn wait_with_output(mut self) -> Result<CommandResult> {
        let mut child = self
            .child_process
            .take()
            .stack_err_locationless("`CommandRunner` has already been finished")?;
        let status = child.wait().await.stack_err_with_locationless(|| {
            format!("{self:?}.wait_with_output() -> failed when waiting on child")
        })?;
        let mut records = vec![];
        for handle in [self.stdout_handle.take(), self.stderr_handle.take()]
            .into_iter()
            .flatten()
        {
            records.push(handle.await.stack_err_with_locationless(|| {
                format!("{self:?}.wait_with_output() -> recorder task panicked")
            })?);
        }
        let stderr = records.pop().unwrap_or_default();
        let stdout = records.pop().unwrap_or_default();
        Ok(CommandResult {
            command: self.command.take().unwrap_or_default(),
            status: Some(status),
            stdout,
            stderr,
        })
    }
}
