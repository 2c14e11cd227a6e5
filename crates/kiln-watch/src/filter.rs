use crate::backend::WatchMode;
use kiln_build::{InputElement, SCRIPT_EXTENSION};
use std::path::{Component, Path, PathBuf};

const SOURCE_EXTENSIONS: &[&str] = &[SCRIPT_EXTENSION, "scala", "java"];

/// Which change events on a watched input should trigger a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Visible source files anywhere under the root.
    Sources,
    /// Exactly the watched file.
    ExactPath,
    /// Anything under the root.
    Everything,
}

/// One watched input: what to register with the backend and how to filter
/// what comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    /// The same path with symlinks resolved, when it differs. Some backends
    /// report events under the resolved path.
    resolved: Option<PathBuf>,
    mode: WatchMode,
    filter: EventFilter,
}

impl WatchTarget {
    pub fn for_element(element: &InputElement) -> Self {
        let (mode, filter) = match element {
            InputElement::SingleFile(_) => (WatchMode::NonRecursive, EventFilter::ExactPath),
            InputElement::Directory(_) => (WatchMode::Recursive, EventFilter::Sources),
            InputElement::ResourceDirectory(_) => (WatchMode::Recursive, EventFilter::Everything),
        };
        let path = element.path().to_path_buf();
        let resolved = std::fs::canonicalize(&path)
            .ok()
            .filter(|resolved| *resolved != path);
        Self {
            path,
            resolved,
            mode,
            filter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    pub fn accepts(&self, event_path: &Path) -> bool {
        std::iter::once(&self.path)
            .chain(self.resolved.as_ref())
            .any(|root| accepts_under(&self.filter, root, event_path))
    }
}

fn accepts_under(filter: &EventFilter, root: &Path, event_path: &Path) -> bool {
    match filter {
        EventFilter::ExactPath => event_path == root,
        EventFilter::Everything => event_path.starts_with(root),
        EventFilter::Sources => {
            let Ok(rel) = event_path.strip_prefix(root) else {
                return false;
            };
            let hidden = rel.components().any(|component| match component {
                Component::Normal(name) => name.to_string_lossy().starts_with('.'),
                _ => false,
            });
            if hidden {
                return false;
            }
            event_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        }
    }
}
