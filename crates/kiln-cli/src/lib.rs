//! Plumbing shared by the `kiln` binary: turning command-line paths into
//! [`Inputs`] and wiring the default collaborators into a [`Builder`].

use anyhow::{bail, Context, Result};
use kiln_build::{
    BuildResult, Builder, CompileServerInvoker, DefaultCommandRunner, DirectiveMaterializer,
    InputElement, Inputs, LocalRepositoryResolver,
};
use kiln_config::KilnConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FALLBACK_PROJECT_NAME: &str = "project";

/// `resources` directories hold resources; other directories hold sources.
pub fn infer_element(path: &Path) -> Result<InputElement> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("input {} not found", path.display()))?;
    if metadata.is_file() {
        return Ok(InputElement::SingleFile(path.to_path_buf()));
    }
    if path.file_name().is_some_and(|name| name == "resources") {
        return Ok(InputElement::ResourceDirectory(path.to_path_buf()));
    }
    Ok(InputElement::Directory(path.to_path_buf()))
}

pub fn default_project_name(workspace: &Path) -> String {
    workspace
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            name.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect::<String>()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string())
}

/// Paths are taken relative to `cwd`; no paths means the whole workspace.
pub fn collect_inputs(
    workspace: &Path,
    cwd: &Path,
    project: Option<&str>,
    paths: &[PathBuf],
) -> Result<Inputs> {
    let elements = if paths.is_empty() {
        vec![InputElement::Directory(workspace.to_path_buf())]
    } else {
        paths
            .iter()
            .map(|path| {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    cwd.join(path)
                };
                infer_element(&path)
            })
            .collect::<Result<Vec<_>>>()?
    };
    let name = project
        .map(str::to_owned)
        .unwrap_or_else(|| default_project_name(workspace));
    Ok(Inputs::new(workspace, name, elements))
}

/// A [`Builder`] backed by the local repository, the configured compile
/// server and real child processes.
pub fn default_builder(workspace: &Path, config: &KilnConfig) -> Result<Builder> {
    let Some(repository) = config.repository.resolve(workspace) else {
        bail!("cannot locate a local repository; set `[repository] path` in kiln.toml");
    };
    let runner = Arc::new(DefaultCommandRunner::echoing());
    let compiler = CompileServerInvoker::new(runner.clone(), &config.compile_server.program)
        .with_args(config.compile_server.args.clone());
    Ok(Builder::new(
        Arc::new(DirectiveMaterializer),
        Arc::new(LocalRepositoryResolver::new(repository)),
        Arc::new(compiler),
        runner,
    ))
}

/// What `kiln compile --json` prints.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub project: String,
    pub success: bool,
    pub output: Option<PathBuf>,
    pub sources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

impl BuildReport {
    pub fn new(result: &BuildResult) -> Self {
        let common = result.common();
        Self {
            project: common.project_name().to_owned(),
            success: result.is_success(),
            output: result.output().map(Path::to_path_buf),
            sources: common.sources.paths.clone(),
            classpath: result
                .successful()
                .map(|ok| ok.runtime_classpath())
                .unwrap_or_default(),
        }
    }
}
