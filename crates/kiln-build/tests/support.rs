use kiln_build::{
    ArtifactResolver, Artifacts, Builder, CommandOutput, CommandRunner, CompileInvoker,
    DirectiveMaterializer, ProjectLayout, ResolveError, ResolveRequest,
};
use kiln_process::{BoundedOutput, CommandSpec};
use kiln_test_utils::ClassFixture;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

pub fn exit_status(code: i32) -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }
}

pub fn output(code: i32) -> CommandOutput {
    CommandOutput {
        status: exit_status(code),
        output: BoundedOutput::default(),
    }
}

#[derive(Debug, Default)]
pub struct RecordingResolver {
    pub requests: Mutex<Vec<ResolveRequest>>,
}

impl ArtifactResolver for RecordingResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<Artifacts, ResolveError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Artifacts::default())
    }
}

/// Writes the configured classes into the project's classes dir, or fails.
#[derive(Debug)]
pub struct FakeCompiler {
    classes: Vec<ClassFixture>,
    succeed: bool,
    pub projects: Mutex<Vec<String>>,
}

impl FakeCompiler {
    pub fn succeeding(classes: Vec<ClassFixture>) -> Self {
        Self {
            classes,
            succeed: true,
            projects: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            classes: Vec::new(),
            succeed: false,
            projects: Mutex::new(Vec::new()),
        }
    }

    pub fn projects(&self) -> Vec<String> {
        self.projects.lock().unwrap().clone()
    }
}

impl CompileInvoker for FakeCompiler {
    fn compile(&self, workspace: &Path, project: &str) -> io::Result<Option<PathBuf>> {
        self.projects.lock().unwrap().push(project.to_string());
        if !self.succeed {
            return Ok(None);
        }
        let classes = ProjectLayout::new(workspace, project).classes_dir();
        std::fs::create_dir_all(&classes)?;
        for class in &self.classes {
            class.write_to(&classes)?;
        }
        Ok(Some(classes))
    }
}

/// Stands in for the benchmark generator. On success it writes one source
/// file into the sources directory it is handed.
#[derive(Debug)]
pub struct ScriptedGenerator {
    exit_code: i32,
    pub commands: Mutex<Vec<CommandSpec>>,
}

impl ScriptedGenerator {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedGenerator {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());
        if self.exit_code == 0 {
            let n = command.args.len();
            let sources = PathBuf::from(&command.args[n - 3]);
            std::fs::write(sources.join("Bench.scala"), "class Bench\n")?;
        }
        Ok(output(self.exit_code))
    }
}

pub struct Harness {
    pub resolver: Arc<RecordingResolver>,
    pub compiler: Arc<FakeCompiler>,
    pub generator: Arc<ScriptedGenerator>,
    pub builder: Builder,
}

impl Harness {
    pub fn new(compiler: FakeCompiler, generator: ScriptedGenerator) -> Self {
        let resolver = Arc::new(RecordingResolver::default());
        let compiler = Arc::new(compiler);
        let generator = Arc::new(generator);
        let builder = Builder::new(
            Arc::new(DirectiveMaterializer),
            resolver.clone(),
            compiler.clone(),
            generator.clone(),
        );
        Self {
            resolver,
            compiler,
            generator,
            builder,
        }
    }

    pub fn compiling(classes: Vec<ClassFixture>) -> Self {
        Self::new(FakeCompiler::succeeding(classes), ScriptedGenerator::exiting_with(0))
    }
}
