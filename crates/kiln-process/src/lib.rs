//! Running the external programs Kiln drives.
//!
//! Two kinds of processes are launched during a build: the compile server
//! client (once per compile) and the benchmark code generator (once per
//! secondary pass). Both can be noisy, so stdout/stderr are captured with a
//! per-stream cap instead of `Command::output()`, and can optionally be echoed
//! to our own stderr as they arrive so compiler diagnostics show up live in
//! watch mode.
//!
//! No timeout is imposed: both invocations are bounded by the lifetime of the
//! external process.

use std::{
    fmt,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
};

/// Captured stdout/stderr from a command, truncated to a maximum size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream produced more bytes than were kept.
    pub truncated: bool,
}

impl BoundedOutput {
    /// stdout followed by stderr, separated by a newline when needed.
    pub fn combined(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.stdout);
        if !self.stderr.is_empty() {
            if !s.is_empty() && !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

/// Options controlling command execution.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum bytes to keep *per stream* (stdout and stderr).
    pub max_bytes: usize,
    /// Forward the child's output to our stderr while it runs.
    pub echo: bool,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            // 4MiB per stream is plenty for compiler diagnostics.
            max_bytes: 4 * 1024 * 1024,
            echo: false,
            env: Vec::new(),
        }
    }
}

/// A full command invocation (cwd + program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(cwd: impl Into<PathBuf>, program: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            program: program.into(),
            args: Vec::new(),
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

    /// Convenience for a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Human-readable, not a round-trippable shell snippet.
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('\t') {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Result of running a command with bounded output capture.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub output: BoundedOutput,
}

impl CommandResult {
    /// The exit code, or `None` when the process was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Error returned by [`run_command_checked`].
#[derive(Debug)]
pub enum RunCommandError {
    Io {
        command: CommandSpec,
        source: io::Error,
    },
    Failed {
        command: CommandSpec,
        status: ExitStatus,
        output: BoundedOutput,
    },
}

impl RunCommandError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Io { .. } => None,
            Self::Failed { status, .. } => status.code(),
        }
    }
}

impl fmt::Display for RunCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { command, source } => write!(f, "failed to run `{command}`: {source}"),
            Self::Failed {
                command,
                status,
                output,
            } => {
                write!(f, "`{command}` exited with {status}")?;
                if output.truncated {
                    write!(f, " (output truncated)")?;
                }
                if !output.stderr.is_empty() {
                    write!(f, "\nstderr:\n{}", output.stderr)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RunCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Failed { .. } => None,
        }
    }
}

/// Run `command`, capturing at most `opts.max_bytes` of stdout and stderr
/// each. A non-zero exit is *not* an error here; see [`run_command_checked`].
pub fn run_command(command: &CommandSpec, opts: &RunOptions) -> io::Result<CommandResult> {
    tracing::debug!(target: "kiln.process", cwd = %command.cwd.display(), "running `{command}`");

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &opts.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;

    let Some(stdout) = child.stdout.take() else {
        return Err(io::Error::other("child stdout was not captured"));
    };
    let Some(stderr) = child.stderr.take() else {
        return Err(io::Error::other("child stderr was not captured"));
    };

    let max_bytes = opts.max_bytes;
    let echo = opts.echo;
    let stdout_handle = thread::spawn(move || read_bounded(stdout, max_bytes, echo));
    let stderr_handle = thread::spawn(move || read_bounded(stderr, max_bytes, echo));

    let status = child.wait()?;

    let (stdout_bytes, stdout_truncated) = join_reader(stdout_handle, "stdout")??;
    let (stderr_bytes, stderr_truncated) = join_reader(stderr_handle, "stderr")??;

    tracing::debug!(
        target: "kiln.process",
        %status,
        stdout_bytes = stdout_bytes.len(),
        stderr_bytes = stderr_bytes.len(),
        "`{command}` finished"
    );

    Ok(CommandResult {
        status,
        output: BoundedOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            truncated: stdout_truncated || stderr_truncated,
        },
    })
}

/// Run a command and treat a non-zero exit as an error.
pub fn run_command_checked(
    command: &CommandSpec,
    opts: &RunOptions,
) -> Result<CommandResult, RunCommandError> {
    let result = run_command(command, opts).map_err(|source| RunCommandError::Io {
        command: command.clone(),
        source,
    })?;

    if !result.status.success() {
        return Err(RunCommandError::Failed {
            command: command.clone(),
            status: result.status,
            output: result.output,
        });
    }

    Ok(result)
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<(Vec<u8>, bool)>>,
    stream: &'static str,
) -> io::Result<io::Result<(Vec<u8>, bool)>> {
    handle
        .join()
        .map_err(|_| io::Error::other(format!("{stream} reader thread panicked")))
}

fn read_bounded(mut reader: impl Read, max_bytes: usize, echo: bool) -> io::Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }

        if echo {
            // Echo is best effort; a closed stderr must not fail the build.
            let mut err = io::stderr().lock();
            let _ = err.write_all(&buf[..n]);
            let _ = err.flush();
        }

        if out.len() < max_bytes {
            let remaining = max_bytes - out.len();
            let to_store = remaining.min(n);
            out.extend_from_slice(&buf[..to_store]);
            if to_store < n {
                truncated = true;
            }
        } else {
            truncated = true;
        }
    }

    Ok((out, truncated))
}
