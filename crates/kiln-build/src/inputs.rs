use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// One user-provided input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum InputElement {
    /// A single source or script file. Watched non-recursively.
    SingleFile(PathBuf),
    /// A source tree. Watched recursively.
    Directory(PathBuf),
    /// A tree copied verbatim onto the runtime classpath. Watched recursively.
    ResourceDirectory(PathBuf),
}

impl InputElement {
    pub fn path(&self) -> &Path {
        match self {
            InputElement::SingleFile(path)
            | InputElement::Directory(path)
            | InputElement::ResourceDirectory(path) => path,
        }
    }

    pub fn is_recursive(&self) -> bool {
        !matches!(self, InputElement::SingleFile(_))
    }

    fn kind_tag(&self) -> &'static str {
        match self {
            InputElement::SingleFile(_) => "file",
            InputElement::Directory(_) => "dir",
            InputElement::ResourceDirectory(_) => "resources",
        }
    }
}

/// Everything a build starts from. Constructed once per invocation and never
/// mutated; the benchmark pass works on a [`Inputs::derive`]d copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inputs {
    elements: Vec<InputElement>,
    workspace: PathBuf,
    base_project_name: String,
    may_append_hash: bool,
}

impl Inputs {
    pub fn new(
        workspace: impl Into<PathBuf>,
        base_project_name: impl Into<String>,
        elements: Vec<InputElement>,
    ) -> Self {
        Self {
            elements,
            workspace: workspace.into(),
            base_project_name: base_project_name.into(),
            may_append_hash: true,
        }
    }

    pub fn with_hash_appended(mut self, may_append_hash: bool) -> Self {
        self.may_append_hash = may_append_hash;
        self
    }

    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn base_project_name(&self) -> &str {
        &self.base_project_name
    }

    pub fn may_append_hash(&self) -> bool {
        self.may_append_hash
    }

    /// Name under which the compile service knows this project.
    ///
    /// Stable across repeated builds of the same inputs, so the service can
    /// reuse its caches.
    pub fn project_name(&self) -> String {
        if self.may_append_hash {
            format!("{}_{}", self.base_project_name, self.inputs_hash())
        } else {
            self.base_project_name.clone()
        }
    }

    /// A copy for a chained build: the project name gets `suffix`, hash
    /// appending is disabled and `extra` elements are appended.
    pub fn derive(&self, suffix: &str, extra: impl IntoIterator<Item = InputElement>) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(extra);
        Self {
            elements,
            workspace: self.workspace.clone(),
            base_project_name: format!("{}{suffix}", self.project_name()),
            may_append_hash: false,
        }
    }

    fn inputs_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for element in &self.elements {
            let path = element.path();
            let rel = path.strip_prefix(&self.workspace).unwrap_or(path);
            hasher.update(element.kind_tag().as_bytes());
            hasher.update([0]);
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update([0]);
        }
        let digest = hex::encode(hasher.finalize());
        digest[..10].to_string()
    }
}
