//! Correcting debug positions in compiled output.
//!
//! Scripts are compiled from generated wrappers that carry extra header
//! lines, so every line number in the emitted classes is off by the header
//! size and `SourceFile` names the wrapper rather than the script. This pass
//! walks the output directory once after each successful compile and fixes
//! both. It is not idempotent: running it twice shifts twice.

use crate::fs_cleanup::write_atomic;
use crate::materialize::Sources;
use crate::{BuildError, Result};
use kiln_classfile::DebugPositions;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineShift {
    /// Generated file path relative to the generated-source root, `/`-separated.
    pub key: String,
    /// File name written into `SourceFile`.
    pub reporting_name: String,
    pub shift: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftTable {
    entries: Vec<LineShift>,
}

impl ShiftTable {
    /// With the line-correction compiler plugin active the compiler already
    /// emits script positions, so every shift is zero.
    pub fn new(sources: &Sources, plugin_active: bool) -> Self {
        let entries = sources
            .generated
            .iter()
            .filter_map(|generated| {
                let key = generated_key(&sources.generated_root, &generated.generated)?;
                let reporting_name = generated.reporting.file_name()?.to_string_lossy().into_owned();
                let shift = if plugin_active {
                    0
                } else {
                    -i32::try_from(generated.header_lines).unwrap_or(i32::MAX)
                };
                Some(LineShift {
                    key,
                    reporting_name,
                    shift,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn from_entries(entries: Vec<LineShift>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LineShift] {
        &self.entries
    }

    /// Matches a `SourceFile` value against the table: the full relative
    /// path first, then a bare file name if it identifies exactly one entry.
    pub fn lookup(&self, source_file: &str) -> Option<&LineShift> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.key == source_file) {
            return Some(entry);
        }
        if source_file.contains('/') {
            return None;
        }
        let mut by_name = self
            .entries
            .iter()
            .filter(|entry| entry.key.rsplit('/').next() == Some(source_file));
        match (by_name.next(), by_name.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }
}

/// `path` relative to `root`, `/`-separated on every platform.
pub(crate) fn generated_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemapSummary {
    pub scanned: usize,
    pub rewritten: usize,
}

/// Rewrites every class file under `output` whose `SourceFile` matches the
/// table. Unmatched files are not written.
pub fn remap_positions(output: &Path, table: &ShiftTable) -> Result<RemapSummary> {
    let mut summary = RemapSummary::default();
    if table.is_empty() || !output.is_dir() {
        return Ok(summary);
    }

    for entry in WalkDir::new(output).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "class") {
            continue;
        }
        summary.scanned += 1;

        let bytes = fs::read(path)?;
        let positions = DebugPositions::read(&bytes).map_err(|source| BuildError::Remap {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(shift) = positions.source_file().and_then(|name| table.lookup(name)) else {
            continue;
        };
        let rewritten = positions
            .rewrite(shift.shift, &shift.reporting_name)
            .map_err(|source| BuildError::Remap {
                path: path.to_path_buf(),
                source,
            })?;
        if rewritten != bytes {
            write_atomic(path, &rewritten)?;
            summary.rewritten += 1;
        }
    }

    tracing::debug!(
        target: "kiln.build",
        output = %output.display(),
        scanned = summary.scanned,
        rewritten = summary.rewritten,
        "remapped debug positions"
    );
    Ok(summary)
}
