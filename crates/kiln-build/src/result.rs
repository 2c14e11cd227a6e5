use crate::descriptor::ProjectDescriptor;
use crate::entry_point::{discover_entry_points, select_entry_point, EntryPointError};
use crate::inputs::Inputs;
use crate::materialize::Sources;
use crate::options::Options;
use crate::resolve::Artifacts;
use std::io;
use std::path::{Path, PathBuf};

/// What every build produced before the compile step decided its fate.
#[derive(Debug, Clone)]
pub struct BuildCommon {
    pub inputs: Inputs,
    pub options: Options,
    pub sources: Sources,
    pub artifacts: Artifacts,
    pub descriptor: ProjectDescriptor,
}

impl BuildCommon {
    pub fn project_name(&self) -> &str {
        &self.descriptor.project.name
    }
}

#[derive(Debug, Clone)]
pub struct Successful {
    pub common: BuildCommon,
    /// Directory holding the compiled classes.
    pub output: PathBuf,
}

impl Successful {
    pub fn entry_points(&self) -> io::Result<Vec<String>> {
        discover_entry_points(&self.output)
    }

    pub fn entry_point(&self) -> Result<String, EntryPointError> {
        let discovered = self.entry_points()?;
        select_entry_point(
            &discovered,
            self.common.sources.default_entry_point.as_deref(),
        )
    }

    /// Runtime classpath: compiled output, then resource dirs, then jars.
    pub fn runtime_classpath(&self) -> Vec<PathBuf> {
        let mut classpath = vec![self.output.clone()];
        classpath.extend(self.common.sources.resource_dirs.iter().cloned());
        classpath.extend(self.common.artifacts.classpath.iter().cloned());
        classpath
    }
}

/// The compile service reported errors. Diagnostics were already shown.
#[derive(Debug, Clone)]
pub struct Failed {
    pub common: BuildCommon,
}

#[derive(Debug, Clone)]
pub enum BuildResult {
    Successful(Successful),
    Failed(Failed),
}

impl BuildResult {
    pub fn common(&self) -> &BuildCommon {
        match self {
            BuildResult::Successful(ok) => &ok.common,
            BuildResult::Failed(failed) => &failed.common,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Successful(_))
    }

    pub fn successful(&self) -> Option<&Successful> {
        match self {
            BuildResult::Successful(ok) => Some(ok),
            BuildResult::Failed(_) => None,
        }
    }

    pub fn output(&self) -> Option<&Path> {
        self.successful().map(|ok| ok.output.as_path())
    }
}
