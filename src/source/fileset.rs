use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::error::LoopError;

const DEFAULT_INCLUDE: &str = "**/*";

/// Whether a file set yields files or directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSetTarget {
    Files,
    Folders,
}

/// A set of paths under a base directory, selected by glob patterns.
///
/// Patterns are matched against the path relative to the base directory and
/// `*` does not cross `/`; use `**` to recurse. Ignore files (`.gitignore`
/// and friends) and hidden-file rules are not applied: a file set selects
/// exactly what its patterns say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    base: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    target: FileSetTarget,
}

impl FileSet {
    pub fn new(
        base: impl Into<PathBuf>,
        include: Vec<String>,
        exclude: Vec<String>,
        target: FileSetTarget,
    ) -> Self {
        Self {
            base: base.into(),
            include,
            exclude,
            target,
        }
    }

    /// Walk the base directory and return matching paths, sorted.
    pub fn resolve(&self) -> Result<Vec<String>, LoopError> {
        if !self.base.is_dir() {
            return Err(LoopError::configuration(format!(
                "base directory '{}' does not exist or is not a directory",
                self.base.display()
            )));
        }

        let include = if self.include.is_empty() {
            build_globset(&[DEFAULT_INCLUDE.to_string()])?
        } else {
            build_globset(&self.include)?
        };
        let exclude = build_globset(&self.exclude)?;

        let walker = WalkBuilder::new(&self.base)
            .standard_filters(false)
            .follow_links(false)
            .build();

        let mut matches: Vec<PathBuf> = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", self.base.display(), e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let wanted = match (self.target, entry.file_type()) {
                (FileSetTarget::Files, Some(ft)) => ft.is_file(),
                (FileSetTarget::Folders, Some(ft)) => ft.is_dir(),
                (_, None) => false,
            };
            if !wanted {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            if include.is_match(relative) && !exclude.is_match(relative) {
                matches.push(entry.path().to_path_buf());
            }
        }

        matches.sort();
        tracing::trace!(
            "File set {} matched {} {:?}",
            self.base.display(),
            matches.len(),
            self.target
        );
        Ok(matches
            .into_iter()
            .map(|path| path.display().to_string())
            .collect())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, LoopError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| LoopError::configuration(format!("invalid pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| LoopError::configuration(format!("invalid pattern set: {e}")))
}
