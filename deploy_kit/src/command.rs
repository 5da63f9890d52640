use core::fmt;
use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    str::Utf8Error,
};

use stacked_errors::{DisplayStr, Result, StackableErr};

use crate::command_runner::spawn_runner;

/// An OS program with its arguments, extra environment, and working
/// directory. Both standard streams are always recorded into the
/// [CommandResult], up to `record_limit` trailing bytes each.
#[derive(Clone, Default)]
pub struct Command {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Added on top of the inherited environment
    pub envs: Vec<(OsString, OsString)>,
    /// `acquire_dir_path` is used on this before spawning
    pub cwd: Option<PathBuf>,
    /// Forward stdout and stderr to this process, prefixed by program and pid
    pub debug: bool,
    /// Keeps only the last `record_limit` bytes of each stream. `None` keeps
    /// everything.
    pub record_limit: Option<usize>,
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "Command {{ program: {:?},",
            DisplayStr(&self.get_unified_command()),
        ))?;
        if !self.envs.is_empty() {
            f.write_fmt(format_args!(" envs: {:?},", self.envs))?;
        }
        if let Some(cwd) = &self.cwd {
            f.write_fmt(format_args!(" cwd: {cwd:?},"))?;
        }
        if let Some(limit) = self.record_limit {
            f.write_fmt(format_args!(" record_limit: {limit},"))?;
        }
        f.write_fmt(format_args!(" }}"))
    }
}

impl Command {
    pub fn new_os_str(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().into()));
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs.extend(
            envs.into_iter()
                .map(|(k, v)| (k.as_ref().into(), v.as_ref().into())),
        );
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn record_limit(mut self, record_limit: Option<usize>) -> Self {
        self.record_limit = record_limit;
        self
    }

    pub(crate) fn get_unified_command(&self) -> String {
        let mut command = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            command.push(' ');
            command += arg.to_string_lossy().as_ref();
        }
        command
    }

    /// Runs the command with a null stdin and waits for it to exit. An `Ok`
    /// only means the OS calls succeeded, check [CommandResult::successful]
    /// for the exit status.
    pub async fn run_to_completion(self) -> Result<CommandResult> {
        spawn_runner(self, Stdio::null())
            .await
            .stack_err_locationless("Command::run_to_completion")?
            .wait_with_output()
            .await
    }
}

#[must_use]
#[derive(Clone, Default)]
pub struct CommandResult {
    // the command information is kept around for failures
    pub command: Command,
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Debug for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "CommandResult {{\ncommand: {:?},\nstatus: {:?},\n",
            self.command, self.status
        ))?;
        let stdout = self.stdout_as_utf8_lossy();
        if !stdout.is_empty() {
            f.write_fmt(format_args!("stdout: {}\n,", stdout))?;
        }
        let stderr = self.stderr_as_utf8_lossy();
        if !stderr.is_empty() {
            f.write_fmt(format_args!("stderr: {}\n,", stderr))?;
        }
        f.write_fmt(format_args!("}}"))
    }
}

impl Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:#?}", self))
    }
}

impl CommandResult {
    pub fn successful(&self) -> bool {
        self.status.as_ref().is_some_and(|status| status.success())
    }

    pub fn stdout_as_utf8(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.stdout)
    }

    pub fn stdout_as_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_as_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}
