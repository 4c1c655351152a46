//! External command invocation.
//!
//! Commands are described as a program plus an argument vector and executed
//! without a shell, so paths and snapshot names reach the tool verbatim.
//! [`CommandRunner`] is the seam between the drivers and the operating
//! system.

mod kopia;
mod zfs;

pub use kopia::Kopia;
pub use zfs::Zfs;

use std::fmt::{self, Debug, Display};
use std::io;
use std::process::Stdio;

use async_trait::async_trait;

use crate::ExporterError;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`ExporterError::ToolInvocation`].
    pub fn check(self, action: &'static str) -> Result<Self, ExporterError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExporterError::ToolInvocation {
                action,
                stderr: self.stderr.trim_end().to_string(),
            })
        }
    }
}

/// Runs external commands to completion and captures their output.
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `invocation`, mapping a failure to start into [`ExporterError::Spawn`].
pub async fn run_command(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
) -> Result<CommandOutput, ExporterError> {
    runner
        .run(invocation)
        .await
        .map_err(|source| ExporterError::Spawn {
            command: invocation.to_string(),
            source,
        })
}
