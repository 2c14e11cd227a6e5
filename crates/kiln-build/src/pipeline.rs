//! The build pipeline.
//!
//! `materialize -> resolve -> descriptor -> compile -> remap`, each step
//! feeding the next. Collaborators are trait objects so the watcher, the CLI
//! and tests can share one [`Builder`] with different backends.

use crate::bench;
use crate::command::CommandRunner;
use crate::compile::CompileInvoker;
use crate::dependency::Dependency;
use crate::descriptor::{DescriptorInputs, ProjectDescriptor};
use crate::inputs::Inputs;
use crate::layout::ProjectLayout;
use crate::materialize::{SourceMaterializer, Sources};
use crate::options::Options;
use crate::remap::{generated_key, remap_positions, ShiftTable};
use crate::resolve::{ArtifactResolver, Artifacts, ResolveRequest};
use crate::result::{BuildCommon, BuildResult, Failed, Successful};
use crate::{BuildError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub const BASE_COMPILER_OPTIONS: &[&str] = &["-encoding", "UTF-8", "-deprecation", "-feature"];
pub const LINE_CORRECTION_HEADERS_OPTION: &str = "-P:line-correction:headers:";

#[derive(Debug, Clone)]
pub struct Builder {
    materializer: Arc<dyn SourceMaterializer>,
    resolver: Arc<dyn ArtifactResolver>,
    compiler: Arc<dyn CompileInvoker>,
    runner: Arc<dyn CommandRunner>,
}

impl Builder {
    /// `runner` starts the benchmark generator.
    pub fn new(
        materializer: Arc<dyn SourceMaterializer>,
        resolver: Arc<dyn ArtifactResolver>,
        compiler: Arc<dyn CompileInvoker>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            materializer,
            resolver,
            compiler,
            runner,
        }
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Runs one build. With `options.benchmark` a successful build is
    /// followed by the benchmark pass, whose result is returned instead.
    ///
    /// A compile error is `Ok(BuildResult::Failed)`; `Err` means the build
    /// could not be carried out at all.
    pub fn build(&self, inputs: &Inputs, options: &Options, cwd: &Path) -> Result<BuildResult> {
        let result = self.build_once(inputs, options)?;
        match result {
            BuildResult::Successful(primary) if options.benchmark => {
                bench::secondary_build(self, &primary, cwd)
            }
            other => Ok(other),
        }
    }

    fn build_once(&self, inputs: &Inputs, options: &Options) -> Result<BuildResult> {
        let project = inputs.project_name();
        let layout = ProjectLayout::new(inputs.workspace(), project.as_str());
        let span = tracing::info_span!(target: "kiln.build", "build", project = %project);
        let _guard = span.enter();

        let sources = self
            .materializer
            .materialize(inputs, options.wrapper, options.platform())?;

        let request = ResolveRequest {
            compiler: options.compiler_dependencies(),
            plugins: options.plugin_dependencies(),
            dependencies: combined_dependencies(&sources, options),
            binary_version: options.binary_version(),
            platform_suffix: options.platform_suffix().map(str::to_string),
        };
        let artifacts = self.resolver.resolve(&request)?;

        let descriptor = ProjectDescriptor::new(DescriptorInputs {
            layout: &layout,
            sources: sources.paths.clone(),
            resources: sources.resource_dirs.clone(),
            classpath: artifacts.classpath.clone(),
            compiler_version: options.language_version.clone(),
            compiler_jars: artifacts.toolchain.clone(),
            compiler_options: compiler_options(options, &sources, &artifacts, inputs.workspace()),
            platform: options.platform().map(str::to_string),
        });
        descriptor.persist(&layout.descriptor_path())?;

        let started = Instant::now();
        let output = self
            .compiler
            .compile(inputs.workspace(), &project)
            .map_err(BuildError::Compile)?;

        let common = BuildCommon {
            inputs: inputs.clone(),
            options: options.clone(),
            sources,
            artifacts,
            descriptor,
        };

        let Some(output) = output else {
            tracing::info!(
                target: "kiln.build",
                elapsed_ms = started.elapsed().as_millis() as u64,
                "compilation failed"
            );
            return Ok(BuildResult::Failed(Failed { common }));
        };

        let table = ShiftTable::new(&common.sources, options.line_correction_active());
        remap_positions(&output, &table)?;

        tracing::info!(
            target: "kiln.build",
            output = %output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled"
        );
        Ok(BuildResult::Successful(Successful { common, output }))
    }
}

/// Directive dependencies, configured dependencies, platform dependencies,
/// benchmark dependencies, runtime library, test runner. First occurrence
/// wins.
pub fn combined_dependencies(sources: &Sources, options: &Options) -> Vec<Dependency> {
    let mut all: Vec<Dependency> = Vec::new();
    all.extend(sources.dependencies.iter().cloned());
    all.extend(options.dependencies.iter().cloned());
    if let Some(target) = &options.cross_target {
        all.extend(target.dependencies.iter().cloned());
    }
    if options.benchmark {
        all.extend(options.benchmark_dependencies.iter().cloned());
    }
    if options.add_runtime_library {
        all.push(options.runtime_library());
    }
    if options.add_test_runner {
        all.push(options.test_runner.clone());
    }

    let mut seen = HashSet::new();
    all.retain(|dep| seen.insert(dep.clone()));
    all
}

pub fn compiler_options(
    options: &Options,
    sources: &Sources,
    artifacts: &Artifacts,
    workspace: &Path,
) -> Vec<String> {
    let mut out: Vec<String> = BASE_COMPILER_OPTIONS.iter().map(|s| s.to_string()).collect();

    for jar in &artifacts.plugins {
        out.push(format!("-Xplugin:{}", jar.display()));
    }

    if options.line_correction_active() && !sources.generated.is_empty() {
        let headers = sources
            .generated
            .iter()
            .filter_map(|generated| {
                let key = generated_key(&sources.generated_root, &generated.generated)?;
                Some(format!("{key}={}", generated.header_lines))
            })
            .collect::<Vec<_>>()
            .join(";");
        out.push(format!("{LINE_CORRECTION_HEADERS_OPTION}{headers}"));
    }

    if options.major_version() >= 3 {
        out.push("-sourceroot".to_string());
        out.push(workspace.display().to_string());
    }

    out.extend(options.extra_compiler_options.iter().cloned());
    out
}
