use kiln_classfile::ClassFile;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum EntryPointError {
    #[error("no main class found")]
    NotFound,
    #[error("found several main classes: {}", candidates.join(", "))]
    Ambiguous { candidates: Vec<String> },
    #[error("failed to scan compiled classes")]
    Io(#[from] io::Error),
}

/// Binary names (`com.example.Main`) of every class under `output` with a
/// `public static void main(String[])`, sorted.
///
/// Unreadable class files are skipped with a warning; discovery never fails
/// a run because of one odd file.
pub fn discover_entry_points(output: &Path) -> io::Result<Vec<String>> {
    let mut found = Vec::new();
    if !output.is_dir() {
        return Ok(found);
    }
    for entry in WalkDir::new(output) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "class") {
            continue;
        }
        let bytes = fs::read(path)?;
        match ClassFile::parse(&bytes) {
            Ok(class) if class.has_main_method() => found.push(class.binary_name()),
            Ok(_) => {}
            Err(err) => tracing::warn!(
                target: "kiln.build",
                path = %path.display(),
                error = %err,
                "skipping unreadable class file"
            ),
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Picks the class to run: the materializer's default when it was actually
/// compiled, otherwise the only candidate.
pub fn select_entry_point(
    discovered: &[String],
    default: Option<&str>,
) -> Result<String, EntryPointError> {
    if let Some(default) = default {
        if discovered.iter().any(|name| name == default) {
            return Ok(default.to_string());
        }
    }
    match discovered {
        [] => Err(EntryPointError::NotFound),
        [only] => Ok(only.clone()),
        many => {
            let mut candidates = many.to_vec();
            candidates.sort();
            Err(EntryPointError::Ambiguous { candidates })
        }
    }
}
