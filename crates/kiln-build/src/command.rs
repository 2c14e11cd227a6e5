use kiln_process::{run_command, BoundedOutput, CommandSpec, RunOptions};
use std::fmt;
use std::io;
use std::process::ExitStatus;

/// Captured output from a command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub output: BoundedOutput,
}

impl CommandOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Seam for every external program a build starts, so tests can script them.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultCommandRunner {
    /// Forward child output to our stderr while capturing it.
    pub echo: bool,
}

impl DefaultCommandRunner {
    pub fn echoing() -> Self {
        Self { echo: true }
    }
}

impl CommandRunner for DefaultCommandRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        let opts = RunOptions {
            echo: self.echo,
            ..RunOptions::default()
        };
        tracing::debug!(target: "kiln.build", command = %command, "running command");
        let result = run_command(command, &opts)?;
        if result.output.truncated {
            tracing::debug!(
                target: "kiln.build",
                command = %command,
                "command output truncated"
            );
        }
        Ok(CommandOutput {
            status: result.status,
            output: result.output,
        })
    }
}
