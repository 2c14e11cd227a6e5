//! Benchmark mode: a second build chained onto a successful first one.
//!
//! An external generator inspects the primary output and writes benchmark
//! harness sources and resources into a scratch area. Those are then compiled
//! together with the original inputs as a separate `<project>_bench` project.

use crate::fs_cleanup::recreate_dir;
use crate::inputs::InputElement;
use crate::layout::ProjectLayout;
use crate::pipeline::Builder;
use crate::result::{BuildResult, Successful};
use crate::{BuildError, Result};
use kiln_process::CommandSpec;
use std::path::Path;

pub const BENCH_PROJECT_SUFFIX: &str = "_bench";
const GENERATOR_MODE: &str = "default";

pub(crate) fn secondary_build(
    builder: &Builder,
    primary: &Successful,
    cwd: &Path,
) -> Result<BuildResult> {
    let options = &primary.common.options;
    let Some(generator) = &options.generator else {
        return Err(BuildError::MissingGenerator);
    };

    let inputs = &primary.common.inputs;
    let layout = ProjectLayout::new(inputs.workspace(), primary.common.project_name());
    let scratch = layout.bench_dir();
    let sources_dir = scratch.join("sources");
    let resources_dir = scratch.join("resources");
    recreate_dir(&scratch)?;
    std::fs::create_dir_all(&sources_dir)?;
    std::fs::create_dir_all(&resources_dir)?;

    let command = CommandSpec::new(cwd, &generator.program)
        .args(generator.args.iter().cloned())
        .path_arg(&primary.output)
        .path_arg(&sources_dir)
        .path_arg(&resources_dir)
        .arg(GENERATOR_MODE);

    let output = builder
        .runner()
        .run(&command)
        .map_err(|source| BuildError::Generator {
            command: command.to_string(),
            source,
        })?;
    if !output.success() {
        tracing::error!(
            target: "kiln.build",
            exit_code = ?output.exit_code(),
            "benchmark generator failed\n{}",
            output.output.combined().trim_end()
        );
        return Err(BuildError::SecondaryBuild {
            exit_code: output.exit_code(),
        });
    }

    let bench_inputs = inputs.derive(
        BENCH_PROJECT_SUFFIX,
        [
            InputElement::Directory(sources_dir),
            InputElement::ResourceDirectory(resources_dir),
        ],
    );
    let mut bench_options = options.clone();
    bench_options.benchmark = false;
    bench_options
        .dependencies
        .extend(options.benchmark_dependencies.iter().cloned());

    tracing::info!(
        target: "kiln.build",
        project = %bench_inputs.project_name(),
        "building benchmarks"
    );
    builder.build(&bench_inputs, &bench_options, cwd)
}
