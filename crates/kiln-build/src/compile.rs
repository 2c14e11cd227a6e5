use crate::command::CommandRunner;
use crate::layout::{descriptors_dir, ProjectLayout};
use kiln_process::CommandSpec;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the compile service for one project whose descriptor is already
/// persisted.
///
/// `Ok(None)` means the compilation failed; the invoker reports the
/// diagnostics itself. `Err` is reserved for not being able to talk to the
/// service at all.
pub trait CompileInvoker: Send + Sync + fmt::Debug {
    fn compile(&self, workspace: &Path, project: &str) -> io::Result<Option<PathBuf>>;
}

/// Drives an external compile-server client:
/// `<program> <args..> compile <project> --config-dir <workspace>/.kiln/projects`.
#[derive(Debug, Clone)]
pub struct CompileServerInvoker {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
    args: Vec<String>,
}

impl CompileServerInvoker {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn command(&self, workspace: &Path, project: &str) -> CommandSpec {
        CommandSpec::new(workspace, &self.program)
            .args(self.args.iter().cloned())
            .arg("compile")
            .arg(project)
            .arg("--config-dir")
            .path_arg(&descriptors_dir(workspace))
    }
}

impl CompileInvoker for CompileServerInvoker {
    fn compile(&self, workspace: &Path, project: &str) -> io::Result<Option<PathBuf>> {
        let command = self.command(workspace, project);
        let output = self.runner.run(&command)?;
        if output.success() {
            return Ok(Some(ProjectLayout::new(workspace, project).classes_dir()));
        }
        tracing::error!(
            target: "kiln.build",
            project,
            exit_code = ?output.exit_code(),
            output_truncated = output.output.truncated,
            "compilation failed\n{}",
            output.output.combined().trim_end()
        );
        Ok(None)
    }
}
