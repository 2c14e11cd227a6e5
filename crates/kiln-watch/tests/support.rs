use crossbeam_channel::{Receiver, Sender};
use kiln_build::{
    ArtifactResolver, Artifacts, Builder, CommandOutput, CommandRunner, CompileInvoker,
    DirectiveMaterializer, Inputs, ProjectLayout, ResolveError, ResolveRequest,
};
use kiln_process::CommandSpec;
use kiln_test_utils::ClassFixture;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Long enough that a burst of injected events always lands inside one
/// window, short enough to keep the suite quick.
pub const DEBOUNCE: Duration = Duration::from_millis(150);

/// How long to wait before concluding that no rebuild is coming.
pub const QUIET: Duration = Duration::from_millis(500);

pub const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct EmptyResolver;

impl ArtifactResolver for EmptyResolver {
    fn resolve(&self, _request: &ResolveRequest) -> Result<Artifacts, ResolveError> {
        Ok(Artifacts::default())
    }
}

#[derive(Debug)]
struct NoRunner;

impl CommandRunner for NoRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unexpected command {command}"),
        ))
    }
}

/// Emits one class per compile and reports every compile on a channel.
#[derive(Debug)]
struct ReportingCompiler {
    compiled: Sender<String>,
}

impl CompileInvoker for ReportingCompiler {
    fn compile(&self, workspace: &Path, project: &str) -> io::Result<Option<PathBuf>> {
        let classes = ProjectLayout::new(workspace, project).classes_dir();
        std::fs::create_dir_all(&classes)?;
        ClassFixture::new("Main").main_method(&[1]).write_to(&classes)?;
        let _ = self.compiled.send(project.to_string());
        Ok(Some(classes))
    }
}

pub struct Compiles {
    rx: Receiver<String>,
}

impl Compiles {
    /// Blocks until the next compile.
    pub fn next(&self) -> String {
        self.rx
            .recv_timeout(TIMEOUT)
            .expect("expected a rebuild")
    }

    pub fn assert_quiet(&self) {
        if let Ok(project) = self.rx.recv_timeout(QUIET) {
            panic!("unexpected rebuild of {project}");
        }
    }
}

pub fn builder() -> (Builder, Compiles) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let builder = Builder::new(
        Arc::new(DirectiveMaterializer),
        Arc::new(EmptyResolver),
        Arc::new(ReportingCompiler { compiled: tx }),
        Arc::new(NoRunner),
    );
    (builder, Compiles { rx })
}

pub fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// A workspace with `src/Main.scala`, `resources/app.conf` and `hello.sc`.
pub fn workspace() -> tempfile::TempDir {
    let ws = tempfile::tempdir().unwrap();
    write(&ws.path().join("src/Main.scala"), "object Main\n");
    write(&ws.path().join("resources/app.conf"), "a = 1\n");
    write(&ws.path().join("hello.sc"), "println(1)\n");
    ws
}

pub fn inputs(ws: &Path, elements: Vec<kiln_build::InputElement>) -> Inputs {
    Inputs::new(ws, "watched", elements)
}
