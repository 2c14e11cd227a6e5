//! Workspace configuration (`kiln.toml`) and logging setup.

mod logging;

pub use logging::{init_tracing, LoggingConfig};

use kiln_build::{
    CrossTarget, Dependency, GeneratorCommand, Options, WrapperStrategy, DEFAULT_LANGUAGE_VERSION,
};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub toolchain: ToolchainConfig,

    #[serde(default)]
    pub compile_server: CompileServerConfig,

    #[serde(default)]
    pub bench: BenchConfig,

    /// Compile for a non-JVM platform instead of the JVM.
    #[serde(default)]
    pub cross: Option<CrossTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    #[serde(default = "LanguageConfig::default_version")]
    pub version: String,

    #[serde(default)]
    pub wrapper: WrapperStrategy,

    /// Put the language runtime library on the classpath.
    #[serde(default = "default_true")]
    pub runtime_library: bool,

    /// Put the test runner on the classpath.
    #[serde(default)]
    pub test_runner: bool,

    /// Let a compiler plugin correct script positions instead of rewriting
    /// class files after compilation.
    #[serde(default)]
    pub line_correction: bool,

    #[serde(default)]
    pub compiler_options: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl LanguageConfig {
    fn default_version() -> String {
        DEFAULT_LANGUAGE_VERSION.to_owned()
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            version: Self::default_version(),
            wrapper: WrapperStrategy::default(),
            runtime_library: true,
            test_runner: false,
            line_correction: false,
            compiler_options: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Root of a Maven-layout repository. Relative paths are resolved against
    /// the workspace. Defaults to `~/.m2/repository`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RepositoryConfig {
    pub fn resolve(&self, workspace: &Path) -> Option<PathBuf> {
        match &self.path {
            Some(path) if path.is_absolute() => Some(path.clone()),
            Some(path) => Some(workspace.join(path)),
            None => kiln_build::LocalRepositoryResolver::default_repository(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Overrides the compiler derived from `language.version`.
    #[serde(default)]
    pub compiler: Vec<Dependency>,

    #[serde(default)]
    pub plugins: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileServerConfig {
    #[serde(default = "CompileServerConfig::default_program")]
    pub program: PathBuf,

    /// Arguments placed before `compile <project> ...`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CompileServerConfig {
    fn default_program() -> PathBuf {
        PathBuf::from("kiln-compile-server")
    }
}

impl Default for CompileServerConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default)]
    pub generator: Option<GeneratorCommand>,

    /// Added to both the primary and the benchmark build.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_owned())
    }
}

impl KilnConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Build options described by this config. `benchmark` stays off; it is
    /// a per-invocation choice.
    pub fn options(&self) -> Options {
        let language = &self.language;
        Options {
            language_version: language.version.clone(),
            wrapper: language.wrapper,
            cross_target: self.cross.clone(),
            compiler: self.toolchain.compiler.clone(),
            compiler_plugins: self.toolchain.plugins.clone(),
            dependencies: language.dependencies.clone(),
            add_runtime_library: language.runtime_library,
            add_test_runner: language.test_runner,
            use_line_correction_plugin: language.line_correction,
            benchmark_dependencies: self.bench.dependencies.clone(),
            generator: self.bench.generator.clone(),
            extra_compiler_options: language.compiler_options.clone(),
            ..Options::default()
        }
    }
}

pub const KILN_CONFIG_ENV_VAR: &str = "KILN_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the config environment lock.
///
/// [`KILN_CONFIG_ENV_VAR`] is process-global, so tests that set it must not
/// overlap with discovery running on other threads.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the configuration file for a workspace.
///
/// Search order:
/// 1) `KILN_CONFIG_PATH` (absolute or relative to `workspace`)
/// 2) `kiln.toml`
/// 3) `.kiln.toml`
/// 4) `.kiln/config.toml`
pub fn discover_config_path(workspace: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(KILN_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["kiln.toml", ".kiln.toml", ".kiln/config.toml"]
        .into_iter()
        .map(|name| workspace.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a workspace.
///
/// Without a config file this is [`KilnConfig::default`] and `None`.
pub fn load_for_workspace(workspace: &Path) -> Result<(KilnConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace) else {
        return Ok((KilnConfig::default(), None));
    };
    let config = KilnConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}
