//! Build pipeline for script-friendly JVM projects.
//!
//! A [`Builder`] turns [`Inputs`] and [`Options`] into a [`BuildResult`] by
//! wrapping scripts into compilable sources, resolving jars, persisting a
//! project descriptor for an external compile service, asking that service to
//! compile, and finally correcting the debug positions of the emitted
//! classes so stack traces point into the user's scripts.

mod bench;
mod command;
mod compile;
mod dependency;
mod descriptor;
mod entry_point;
mod fs_cleanup;
mod inputs;
mod layout;
mod materialize;
mod options;
mod pipeline;
mod remap;
mod resolve;
mod result;

pub use bench::BENCH_PROJECT_SUFFIX;
pub use command::{CommandOutput, CommandRunner, DefaultCommandRunner};
pub use compile::{CompileInvoker, CompileServerInvoker};
pub use dependency::{Dependency, DependencyParseError};
pub use descriptor::{
    CompilerSetup, DescriptorError, DescriptorInputs, DescriptorProject, ProjectDescriptor,
};
pub use entry_point::{discover_entry_points, select_entry_point, EntryPointError};
pub use inputs::{InputElement, Inputs};
pub use layout::{descriptors_dir, ProjectLayout, KILN_DIR};
pub use materialize::{
    launcher_name, DirectiveMaterializer, GeneratedSource, MaterializeError, SourceMaterializer,
    Sources, SCRIPT_EXTENSION,
};
pub use options::{CrossTarget, GeneratorCommand, Options, WrapperStrategy, DEFAULT_LANGUAGE_VERSION};
pub use pipeline::{combined_dependencies, compiler_options, Builder};
pub use remap::{remap_positions, LineShift, RemapSummary, ShiftTable};
pub use resolve::{maven_jar_path, ArtifactResolver, Artifacts, LocalRepositoryResolver, ResolveError, ResolveRequest};
pub use result::{BuildCommon, BuildResult, Failed, Successful};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to prepare sources")]
    Materialize(#[from] MaterializeError),

    #[error("dependency resolution failed")]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The compile service could not be reached. Compile errors are reported
    /// as [`BuildResult::Failed`] instead.
    #[error("failed to run the compile service")]
    Compile(#[source] std::io::Error),

    #[error("malformed class file {path}")]
    Remap {
        path: PathBuf,
        #[source]
        source: kiln_classfile::Error,
    },

    #[error("benchmark generator failed with exit code {exit_code:?}")]
    SecondaryBuild { exit_code: Option<i32> },

    #[error("failed to run benchmark generator `{command}`")]
    Generator {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("benchmark mode requires a generator command")]
    MissingGenerator,
}

pub type Result<T> = std::result::Result<T, BuildError>;
