// ABOUTME: Process-execution seam for external tools (systemctl, ostree, skopeo, runc).
// ABOUTME: Workflows describe commands; a CommandRunner decides how they are spawned.

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// A command line to run, plus its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`CommandError::Failed`].
    pub fn checked(self, spec: &CommandSpec) -> Result<Self, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            FailedSnafu {
                program: spec.program().to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            }
            .fail()
        }
    }
}

/// Errors from running external commands.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CommandError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("{program} exited with status {}: {stderr}", describe_code(code)))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

/// Runs external commands on behalf of the workflows.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr.
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Run attached to the caller's stdio and return the exit code.
    async fn status(&self, spec: &CommandSpec) -> Result<i32, CommandError>;
}

/// Spawns commands on the local host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %spec, "running");
        let output = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context(SpawnSnafu {
                program: spec.program(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn status(&self, spec: &CommandSpec) -> Result<i32, CommandError> {
        use std::os::unix::process::ExitStatusExt;

        tracing::debug!(command = %spec, "running attached");
        let status = spec
            .to_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .context(SpawnSnafu {
                program: spec.program(),
            })?;

        Ok(status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(1))
    }
}
