use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kiln_build::{BuildResult, Builder, EntryPointError, Inputs, Options, ProjectLayout};
use kiln_cli::{collect_inputs, default_builder, BuildReport};
use kiln_config::{init_tracing, load_for_workspace, KilnConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln", version, about = "Build scripts and small JVM projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the inputs (defaults to the whole workspace)
    Compile(CompileArgs),
    /// Print the class `kiln` would run
    MainClass(InputArgs),
    /// Print where the project descriptor was persisted
    Descriptor(DescriptorArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Source files and directories; a directory named `resources` is added as resources
    inputs: Vec<PathBuf>,
    /// Base project name (defaults to the workspace directory name)
    #[arg(long)]
    project: Option<String>,
    /// Workspace root (defaults to current directory)
    #[arg(long, default_value = ".")]
    workspace: PathBuf,
}

#[derive(Args)]
struct CompileArgs {
    #[command(flatten)]
    inputs: InputArgs,
    /// Rebuild whenever an input changes
    #[arg(long)]
    watch: bool,
    /// Generate and compile benchmarks after a successful build
    #[arg(long)]
    bench: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DescriptorArgs {
    #[command(flatten)]
    inputs: InputArgs,
    /// Print the descriptor itself instead of its path
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

struct Session {
    config: KilnConfig,
    builder: Builder,
    inputs: Inputs,
    workspace: PathBuf,
}

impl Session {
    fn open(args: &InputArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        let workspace = cwd.join(&args.workspace);
        let workspace = workspace
            .canonicalize()
            .with_context(|| format!("workspace {} not found", workspace.display()))?;
        let (config, config_path) = load_for_workspace(&workspace)?;
        init_tracing(&config.logging);
        if let Some(path) = config_path {
            tracing::debug!(target: "kiln.cli", path = %path.display(), "loaded config");
        }
        let builder = default_builder(&workspace, &config)?;
        let inputs = collect_inputs(&workspace, &cwd, args.project.as_deref(), &args.inputs)?;
        Ok(Self {
            config,
            builder,
            inputs,
            workspace,
        })
    }

    fn build(&self, options: &Options) -> Result<BuildResult> {
        let result = self
            .builder
            .build(&self.inputs, options, &self.workspace)
            .with_context(|| format!("build of {} failed", self.inputs.project_name()))?;
        Ok(result)
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Compile(args) => {
            let session = Session::open(&args.inputs)?;
            let mut options = session.config.options();
            options.benchmark = args.bench;
            if args.watch {
                return watch(session, options, args.json);
            }
            let result = session.build(&options)?;
            report(&result, args.json)?;
            Ok(if result.is_success() { 0 } else { 1 })
        }
        Command::MainClass(args) => {
            let session = Session::open(&args)?;
            let result = session.build(&session.config.options())?;
            let Some(successful) = result.successful() else {
                eprintln!("Compilation failed");
                return Ok(1);
            };
            match successful.entry_point() {
                Ok(main_class) => {
                    println!("{main_class}");
                    Ok(0)
                }
                Err(EntryPointError::Ambiguous { candidates }) => {
                    eprintln!("Found several main classes:");
                    for candidate in candidates {
                        println!("{candidate}");
                    }
                    Ok(1)
                }
                Err(EntryPointError::NotFound) => {
                    eprintln!("No main class found");
                    Ok(1)
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Descriptor(args) => {
            let session = Session::open(&args.inputs)?;
            let result = session.build(&session.config.options())?;
            let path = ProjectLayout::new(&session.workspace, result.common().project_name())
                .descriptor_path();
            if args.json {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                print!("{text}");
            } else {
                println!("{}", path.display());
            }
            Ok(0)
        }
    }
}

fn report(result: &BuildResult, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(&BuildReport::new(result))?;
        println!("{out}");
    } else if let Some(output) = result.output() {
        println!(
            "Compiled {} to {}",
            result.common().project_name(),
            output.display()
        );
    } else {
        eprintln!("Compilation of {} failed", result.common().project_name());
    }
    Ok(())
}

fn watch(session: Session, options: Options, json: bool) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let watcher = kiln_watch::watch(
        session.builder,
        session.inputs,
        options,
        move |result| {
            if let Err(err) = report(result, json) {
                tracing::error!(target: "kiln.cli", error = %err, "failed to report build");
            }
        },
        Some(|| eprintln!("Watching sources, press Ctrl+C to exit.")),
    )
    .context("failed to start watching")?;

    let interrupted = runtime.block_on(tokio::signal::ctrl_c());
    watcher.dispose();
    interrupted.context("failed to wait for Ctrl+C")?;
    Ok(0)
}
