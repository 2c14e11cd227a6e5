use crate::dependency::Dependency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LANGUAGE_VERSION: &str = "3.3.1";

/// How script files are wrapped into compilable units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapperStrategy {
    /// Script body lives in a class instantiated from the launcher object.
    /// Avoids deadlocks when the script starts threads during initialization.
    ClassWrapper,
    /// Script body lives directly in an object initializer.
    #[default]
    ObjectWrapper,
}

/// A non-JVM compilation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTarget {
    /// Platform name used for `Foo.<platform>.scala` source selection.
    pub platform: String,
    /// Artifact suffix for cross-versioned dependencies, e.g. `sjs1`.
    pub artifact_suffix: String,
    /// Extra runtime dependencies the platform needs.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Compiler plugins the platform needs.
    #[serde(default)]
    pub compiler_plugins: Vec<Dependency>,
}

/// External program that produces benchmark sources and resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub language_version: String,
    pub wrapper: WrapperStrategy,
    pub cross_target: Option<CrossTarget>,
    /// Compiler coordinates. Derived from the language version when empty.
    pub compiler: Vec<Dependency>,
    pub compiler_plugins: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
    pub add_runtime_library: bool,
    pub add_test_runner: bool,
    pub test_runner: Dependency,
    pub use_line_correction_plugin: bool,
    pub line_correction_plugin: Dependency,
    pub benchmark: bool,
    pub benchmark_dependencies: Vec<Dependency>,
    pub generator: Option<GeneratorCommand>,
    pub extra_compiler_options: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        let tools_version = env!("CARGO_PKG_VERSION");
        Self {
            language_version: DEFAULT_LANGUAGE_VERSION.to_string(),
            wrapper: WrapperStrategy::default(),
            cross_target: None,
            compiler: Vec::new(),
            compiler_plugins: Vec::new(),
            dependencies: Vec::new(),
            add_runtime_library: true,
            add_test_runner: false,
            test_runner: Dependency::new("dev.kiln", "kiln-test-runner", tools_version)
                .cross_versioned(),
            use_line_correction_plugin: false,
            line_correction_plugin: Dependency::new("dev.kiln", "kiln-line-correction", tools_version)
                .cross_versioned(),
            benchmark: false,
            benchmark_dependencies: Vec::new(),
            generator: None,
            extra_compiler_options: Vec::new(),
        }
    }
}

impl Options {
    /// Major component of the language version; `0` when unparsable.
    pub fn major_version(&self) -> u32 {
        self.language_version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
            .unwrap_or(0)
    }

    /// Suffix used in cross-versioned artifact ids: `3` for any 3.x release,
    /// `major.minor` before that.
    pub fn binary_version(&self) -> String {
        if self.major_version() >= 3 {
            return self.major_version().to_string();
        }
        let mut parts = self.language_version.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{major}.{minor}"),
            _ => self.language_version.clone(),
        }
    }

    pub fn platform_suffix(&self) -> Option<&str> {
        self.cross_target
            .as_ref()
            .map(|target| target.artifact_suffix.as_str())
    }

    pub fn platform(&self) -> Option<&str> {
        self.cross_target.as_ref().map(|target| target.platform.as_str())
    }

    pub fn compiler_dependencies(&self) -> Vec<Dependency> {
        if !self.compiler.is_empty() {
            return self.compiler.clone();
        }
        let version = self.language_version.as_str();
        if self.major_version() >= 3 {
            vec![Dependency::new("org.scala-lang", "scala3-compiler_3", version)]
        } else {
            vec![Dependency::new("org.scala-lang", "scala-compiler", version)]
        }
    }

    pub fn runtime_library(&self) -> Dependency {
        let version = self.language_version.as_str();
        if self.major_version() >= 3 {
            Dependency::new("org.scala-lang", "scala3-library_3", version)
        } else {
            Dependency::new("org.scala-lang", "scala-library", version)
        }
    }

    /// The line-correction plugin is only used when enabled and when no
    /// cross target replaces the JVM backend.
    pub fn line_correction_active(&self) -> bool {
        self.use_line_correction_plugin && self.cross_target.is_none()
    }

    /// Every compiler plugin the build needs, in a stable order.
    pub fn plugin_dependencies(&self) -> Vec<Dependency> {
        let mut plugins = self.compiler_plugins.clone();
        if let Some(target) = &self.cross_target {
            plugins.extend(target.compiler_plugins.iter().cloned());
        }
        if self.line_correction_active() {
            plugins.push(self.line_correction_plugin.clone());
        }
        plugins
    }
}
