//! Turning user inputs into compilable sources.
//!
//! Scripts (`.sc`) are not valid compilation units on their own; they are
//! wrapped into generated `.scala` files under the project's
//! `src_generated/` directory. Each wrapper adds a fixed number of header
//! lines above the script body, recorded in [`GeneratedSource`] so that the
//! compiled line numbers can be shifted back afterwards.

use crate::dependency::Dependency;
use crate::fs_cleanup::remove_file_best_effort;
use crate::inputs::{InputElement, Inputs};
use crate::layout::ProjectLayout;
use crate::options::WrapperStrategy;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SCRIPT_EXTENSION: &str = "sc";
const SOURCE_EXTENSIONS: &[&str] = &["scala", "java"];
const KNOWN_PLATFORMS: &[&str] = &["jvm", "js", "native"];

/// A wrapper file written for one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// The file handed to the compiler.
    pub generated: PathBuf,
    /// The user's script, used in diagnostics and debug metadata.
    pub reporting: PathBuf,
    /// Lines the wrapper inserts above the script body.
    pub header_lines: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    /// Every file to compile, user sources and generated wrappers alike.
    pub paths: Vec<PathBuf>,
    pub generated: Vec<GeneratedSource>,
    /// Root that [`GeneratedSource::generated`] paths live under.
    pub generated_root: PathBuf,
    pub resource_dirs: Vec<PathBuf>,
    pub default_entry_point: Option<String>,
    /// Dependencies declared by `//> using dep` directives.
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("failed to read or write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a .sc, .scala or .java file")]
    UnsupportedFile(PathBuf),
    #[error("{path}:{line}: {message}")]
    Directive {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("conflicting main classes `{first}` and `{second}` declared")]
    ConflictingMainClass { first: String, second: String },
    #[error("scripts {first} and {second} both generate {generated}")]
    DuplicateScript {
        first: PathBuf,
        second: PathBuf,
        generated: PathBuf,
    },
}

/// Produces the sources of a build. `platform` is the cross-target platform
/// name, `None` for the JVM.
pub trait SourceMaterializer: Send + Sync + fmt::Debug {
    fn materialize(
        &self,
        inputs: &Inputs,
        strategy: WrapperStrategy,
        platform: Option<&str>,
    ) -> Result<Sources, MaterializeError>;
}

/// Default materializer: scans directories, wraps scripts and reads
/// `//> using` directives from the leading comment block of each source.
#[derive(Debug, Clone, Default)]
pub struct DirectiveMaterializer;

impl SourceMaterializer for DirectiveMaterializer {
    fn materialize(
        &self,
        inputs: &Inputs,
        strategy: WrapperStrategy,
        platform: Option<&str>,
    ) -> Result<Sources, MaterializeError> {
        let layout = ProjectLayout::new(inputs.workspace(), inputs.project_name());
        let mut collector = Collector {
            strategy,
            platform: platform.unwrap_or("jvm"),
            sources: Sources {
                generated_root: layout.generated_sources_dir(),
                ..Sources::default()
            },
            main_class: None,
            seen_dependencies: HashSet::new(),
            script_names: Vec::new(),
        };

        for element in inputs.elements() {
            match element {
                InputElement::SingleFile(path) => {
                    let Some(name) = path.file_name() else {
                        return Err(MaterializeError::UnsupportedFile(path.clone()));
                    };
                    if !collector.add_file(path, Path::new(name))? {
                        return Err(MaterializeError::UnsupportedFile(path.clone()));
                    }
                }
                InputElement::Directory(dir) => {
                    for path in walk_visible_files(dir)? {
                        let rel = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
                        collector.add_file(&path, &rel)?;
                    }
                }
                InputElement::ResourceDirectory(dir) => {
                    collector.sources.resource_dirs.push(dir.clone())
                }
            }
        }

        collector.finish()
    }
}

struct Collector<'a> {
    strategy: WrapperStrategy,
    platform: &'a str,
    sources: Sources,
    main_class: Option<String>,
    seen_dependencies: HashSet<Dependency>,
    script_names: Vec<String>,
}

impl Collector<'_> {
    /// Returns `false` for files that are neither sources nor scripts.
    fn add_file(&mut self, path: &Path, rel: &Path) -> Result<bool, MaterializeError> {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return Ok(false);
        };
        let is_script = ext == SCRIPT_EXTENSION;
        if !is_script && !SOURCE_EXTENSIONS.contains(&ext) {
            return Ok(false);
        }
        if !self.matches_platform(path) {
            tracing::debug!(
                target: "kiln.build",
                path = %path.display(),
                platform = self.platform,
                "skipping source for another platform"
            );
            return Ok(true);
        }

        let text = fs::read_to_string(path).map_err(|source| MaterializeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_directives(path, &text)?;

        if is_script {
            self.wrap_script(path, rel, &text)?;
        } else {
            self.sources.paths.push(path.to_path_buf());
        }
        Ok(true)
    }

    fn matches_platform(&self, path: &Path) -> bool {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return true;
        };
        match stem.rsplit_once('.') {
            Some((_, platform)) if KNOWN_PLATFORMS.contains(&platform) => platform == self.platform,
            _ => true,
        }
    }

    fn read_directives(&mut self, path: &Path, text: &str) -> Result<(), MaterializeError> {
        for directive in leading_directives(text) {
            let Directive { line, key, values } = directive;
            let err = |message: String| MaterializeError::Directive {
                path: path.to_path_buf(),
                line,
                message,
            };
            match key {
                "dep" | "deps" | "dependency" | "lib" => {
                    if values.is_empty() {
                        return Err(err(format!("`{key}` needs at least one coordinate")));
                    }
                    for value in values {
                        let dep: Dependency =
                            value.parse().map_err(|e| err(format!("{e}")))?;
                        if self.seen_dependencies.insert(dep.clone()) {
                            self.sources.dependencies.push(dep);
                        }
                    }
                }
                "mainClass" | "main-class" => {
                    let [value] = values.as_slice() else {
                        return Err(err(format!("`{key}` takes exactly one class name")));
                    };
                    match &self.main_class {
                        Some(first) if first != value => {
                            return Err(MaterializeError::ConflictingMainClass {
                                first: first.clone(),
                                second: value.to_string(),
                            })
                        }
                        _ => self.main_class = Some(value.to_string()),
                    }
                }
                other => {
                    tracing::debug!(
                        target: "kiln.build",
                        path = %path.display(),
                        line,
                        directive = other,
                        "ignoring unsupported directive"
                    );
                }
            }
        }
        Ok(())
    }

    fn wrap_script(&mut self, path: &Path, rel: &Path, text: &str) -> Result<(), MaterializeError> {
        let name = wrapper_name(path);
        let generated = self.sources.generated_root.join(rel.with_extension("scala"));

        if let Some(existing) = self
            .sources
            .generated
            .iter()
            .find(|source| source.generated == generated)
        {
            return Err(MaterializeError::DuplicateScript {
                first: existing.reporting.clone(),
                second: path.to_path_buf(),
                generated,
            });
        }

        let wrapped = wrap(&name, text, self.strategy);
        write_if_changed(&generated, wrapped.code.as_bytes())?;

        self.sources.paths.push(generated.clone());
        self.sources.generated.push(GeneratedSource {
            generated,
            reporting: path.to_path_buf(),
            header_lines: wrapped.header_lines,
        });
        self.script_names.push(name);
        Ok(())
    }

    fn finish(mut self) -> Result<Sources, MaterializeError> {
        remove_stale_generated(&self.sources);
        self.sources.default_entry_point = match self.main_class {
            Some(main_class) => Some(main_class),
            None if self.script_names.len() == 1 => {
                Some(launcher_name(&self.script_names[0]))
            }
            None => None,
        };
        Ok(self.sources)
    }
}

struct Wrapped {
    code: String,
    header_lines: u32,
}

/// Name of the object holding the script's `main` method.
pub fn launcher_name(wrapper: &str) -> String {
    format!("{wrapper}_sc")
}

fn wrap(name: &str, script: &str, strategy: WrapperStrategy) -> Wrapped {
    let launcher = launcher_name(name);
    let (header, start) = match strategy {
        WrapperStrategy::ObjectWrapper => (
            format!("object {name} {{\ndef args: Array[String] = {launcher}.args\n"),
            format!("{name}.hashCode()"),
        ),
        WrapperStrategy::ClassWrapper => (
            format!("final class {name}Wrapper {{\ndef args: Array[String] = {launcher}.args\n"),
            format!("new {name}Wrapper()"),
        ),
    };
    let header_lines = header.lines().count() as u32;

    let mut code = header;
    for (idx, line) in script.lines().enumerate() {
        // A shebang is not valid source but its line must stay.
        if idx == 0 && line.starts_with("#!") {
            code.push('\n');
            continue;
        }
        code.push_str(line);
        code.push('\n');
    }
    code.push_str("}\n");
    code.push_str(&format!(
        "object {launcher} {{\n\
         private var argv: Array[String] = Array.empty\n\
         def args: Array[String] = argv\n\
         def main(args: Array[String]): Unit = {{ argv = args; {start}; () }}\n\
         }}\n"
    ));

    Wrapped { code, header_lines }
}

/// A valid identifier derived from the script's file stem.
fn wrapper_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

struct Directive<'a> {
    line: usize,
    key: &'a str,
    values: Vec<&'a str>,
}

/// `//> using` directives in the comment block before the first line of code.
fn leading_directives(text: &str) -> Vec<Directive<'_>> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || (idx == 0 && line.starts_with("#!")) {
            continue;
        }
        if let Some(rest) = line.strip_prefix("//>") {
            let mut tokens = split_values(rest.trim());
            if tokens.first() != Some(&"using") {
                continue;
            }
            tokens.remove(0);
            if tokens.is_empty() {
                continue;
            }
            let key = tokens.remove(0);
            out.push(Directive {
                line: idx + 1,
                key,
                values: tokens,
            });
            continue;
        }
        if line.starts_with("//") {
            continue;
        }
        break;
    }
    out
}

/// Splits on whitespace and commas; double-quoted values may contain either.
fn split_values(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            out.push(&quoted[..end]);
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == ',')
                .unwrap_or(rest.len());
            out.push(&rest[..end]);
            rest = &rest[end..];
        }
    }
    out
}

/// Regular files under `dir`, sorted, skipping anything whose path relative
/// to `dir` has a dot-prefixed component.
fn walk_visible_files(dir: &Path) -> Result<Vec<PathBuf>, MaterializeError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });
    for entry in walker {
        let entry = entry.map_err(|err| MaterializeError::Io {
            path: err.path().unwrap_or(dir).to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Leaves the file untouched when its content is already `bytes`, so the
/// compile service sees an unchanged timestamp.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<(), MaterializeError> {
    let io_err = |source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, bytes).map_err(io_err)
}

/// Wrappers of scripts that no longer exist would otherwise keep compiling.
fn remove_stale_generated(sources: &Sources) {
    let root = &sources.generated_root;
    if !root.is_dir() {
        return;
    }
    let current: BTreeSet<&Path> = sources
        .generated
        .iter()
        .map(|source| source.generated.as_path())
        .collect();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() && !current.contains(entry.path()) {
            remove_file_best_effort(entry.path(), "stale generated source");
        }
    }
}
