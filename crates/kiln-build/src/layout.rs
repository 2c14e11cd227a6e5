use std::path::{Path, PathBuf};

/// Directory under the workspace that holds everything kiln writes.
pub const KILN_DIR: &str = ".kiln";

/// On-disk locations for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    workspace: PathBuf,
    project: String,
}

impl ProjectLayout {
    pub fn new(workspace: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            project: project.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn descriptors_dir(&self) -> PathBuf {
        descriptors_dir(&self.workspace)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.descriptors_dir().join(format!("{}.json", self.project))
    }

    pub fn project_dir(&self) -> PathBuf {
        self.workspace.join(KILN_DIR).join(&self.project)
    }

    pub fn classes_dir(&self) -> PathBuf {
        self.project_dir().join("classes")
    }

    pub fn generated_sources_dir(&self) -> PathBuf {
        self.project_dir().join("src_generated")
    }

    pub fn bench_dir(&self) -> PathBuf {
        self.project_dir().join("bench")
    }
}

pub fn descriptors_dir(workspace: &Path) -> PathBuf {
    workspace.join(KILN_DIR).join("projects")
}
