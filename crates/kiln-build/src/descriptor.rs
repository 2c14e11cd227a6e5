//! Project descriptors: the JSON files the compile service reads to learn
//! what to compile.
//!
//! One descriptor per project name lives under `<workspace>/.kiln/projects/`.
//! Writes are atomic (temp file + rename) and skipped when the serialized
//! bytes are unchanged, so repeated builds of the same inputs do not touch
//! the file and the service can keep its caches.

use crate::fs_cleanup::write_atomic;
use crate::layout::ProjectLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FORMAT_VERSION: &str = "1";

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to serialize descriptor for {project}")]
    Json {
        project: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write descriptor {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub version: String,
    pub project: DescriptorProject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorProject {
    pub name: String,
    pub directory: PathBuf,
    pub workspace_dir: PathBuf,
    pub sources: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub out: PathBuf,
    pub classes_dir: PathBuf,
    pub compiler: CompilerSetup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSetup {
    pub version: String,
    pub jars: Vec<PathBuf>,
    pub options: Vec<String>,
}

/// Everything the descriptor is built from.
#[derive(Debug, Clone)]
pub struct DescriptorInputs<'a> {
    pub layout: &'a ProjectLayout,
    pub sources: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub compiler_version: String,
    pub compiler_jars: Vec<PathBuf>,
    pub compiler_options: Vec<String>,
    pub platform: Option<String>,
}

impl ProjectDescriptor {
    pub fn new(inputs: DescriptorInputs<'_>) -> Self {
        let layout = inputs.layout;
        Self {
            version: DESCRIPTOR_FORMAT_VERSION.to_string(),
            project: DescriptorProject {
                name: layout.project().to_string(),
                directory: layout.workspace().to_path_buf(),
                workspace_dir: layout.workspace().to_path_buf(),
                sources: inputs.sources,
                resources: inputs.resources,
                classpath: inputs.classpath,
                out: layout.project_dir(),
                classes_dir: layout.classes_dir(),
                compiler: CompilerSetup {
                    version: inputs.compiler_version,
                    jars: inputs.compiler_jars,
                    options: inputs.compiler_options,
                },
                platform: inputs.platform,
            },
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DescriptorError> {
        let mut bytes =
            serde_json::to_vec_pretty(self).map_err(|source| DescriptorError::Json {
                project: self.project.name.clone(),
                source,
            })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Writes the descriptor to `path`. Returns `false` when the file already
    /// held exactly these bytes and was left alone.
    pub fn persist(&self, path: &Path) -> Result<bool, DescriptorError> {
        let bytes = self.to_json()?;
        if fs::read(path).is_ok_and(|existing| existing == bytes) {
            tracing::debug!(
                target: "kiln.build",
                path = %path.display(),
                "descriptor unchanged"
            );
            return Ok(false);
        }
        write_atomic(path, &bytes).map_err(|source| DescriptorError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(target: "kiln.build", path = %path.display(), "wrote descriptor");
        Ok(true)
    }
}
