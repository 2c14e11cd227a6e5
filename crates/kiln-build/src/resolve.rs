use crate::dependency::Dependency;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What a build needs fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub compiler: Vec<Dependency>,
    pub plugins: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
    pub binary_version: String,
    pub platform_suffix: Option<String>,
}

/// Local jar files for a [`ResolveRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub toolchain: Vec<PathBuf>,
    pub plugins: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("artifact {dependency} not found (looked in {path})")]
    Missing { dependency: String, path: PathBuf },
    #[error("failed to resolve {dependency}: {message}")]
    Other { dependency: String, message: String },
}

pub trait ArtifactResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, request: &ResolveRequest) -> Result<Artifacts, ResolveError>;
}

/// Resolves coordinates against an already-populated repository in Maven
/// layout. Does not fetch anything and does not follow transitive
/// dependencies.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    repository: PathBuf,
}

impl LocalRepositoryResolver {
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    /// `~/.m2/repository`, when a home directory is known.
    pub fn default_repository() -> Option<PathBuf> {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
        Some(PathBuf::from(home).join(".m2").join("repository"))
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    fn locate(
        &self,
        dependency: &Dependency,
        request: &ResolveRequest,
    ) -> Result<PathBuf, ResolveError> {
        let artifact_id = dependency.artifact_id(
            &request.binary_version,
            request.platform_suffix.as_deref(),
        );
        let path = maven_jar_path(
            &self.repository,
            &dependency.organization,
            &artifact_id,
            &dependency.version,
        );
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolveError::Missing {
                dependency: dependency.to_string(),
                path,
            })
        }
    }

    fn locate_all(
        &self,
        dependencies: &[Dependency],
        request: &ResolveRequest,
    ) -> Result<Vec<PathBuf>, ResolveError> {
        dependencies
            .iter()
            .map(|dependency| self.locate(dependency, request))
            .collect()
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<Artifacts, ResolveError> {
        // Compiler jars are never cross-built for a platform.
        let jvm_request = ResolveRequest {
            platform_suffix: None,
            ..request.clone()
        };
        let artifacts = Artifacts {
            toolchain: self.locate_all(&request.compiler, &jvm_request)?,
            plugins: self.locate_all(&request.plugins, &jvm_request)?,
            classpath: self.locate_all(&request.dependencies, request)?,
        };
        tracing::debug!(
            target: "kiln.build",
            repository = %self.repository.display(),
            toolchain = artifacts.toolchain.len(),
            plugins = artifacts.plugins.len(),
            classpath = artifacts.classpath.len(),
            "resolved artifacts from local repository"
        );
        Ok(artifacts)
    }
}

/// `<repo>/<group path>/<artifact>/<version>/<artifact>-<version>.jar`
pub fn maven_jar_path(repo: &Path, group_id: &str, artifact_id: &str, version: &str) -> PathBuf {
    let group_path = group_id.replace('.', "/");
    repo.join(group_path)
        .join(artifact_id)
        .join(version)
        .join(format!("{artifact_id}-{version}.jar"))
}
