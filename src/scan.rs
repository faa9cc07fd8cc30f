use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SourceConfig;

/// A source file found under the sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the root, used for glob matching and reporting.
    pub relative: String,
}

/// Compiled include/exclude filters for a source tree.
pub struct Scanner {
    include_set: GlobSet,
    exclude_set: GlobSet,
    follow_symlinks: bool,
}

impl Scanner {
    /// Compile the globs in `source`. `.git`, `target` and `node_modules`
    /// directories are always excluded.
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let include_set = build_globset(&source.include_globs)?;

        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(source.exclude_globs.clone());
        let exclude_set = build_globset(&default_excludes)?;

        Ok(Self {
            include_set,
            exclude_set,
            follow_symlinks: source.follow_symlinks,
        })
    }

    /// Recursively enumerate matching files under `root`.
    ///
    /// A missing root yields an empty list, and entries the walker cannot
    /// read are skipped with a warning. Results are sorted by relative path
    /// so passes are deterministic.
    pub fn scan(&self, root: &Path) -> Vec<SourceFile> {
        if !root.exists() {
            tracing::warn!(root = %root.display(), "source root does not exist");
            return Vec::new();
        }

        let mut files = Vec::new();

        let walker = WalkDir::new(root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude_set.is_match(&rel_str) {
                continue;
            }

            if !self.include_set.is_match(&rel_str) {
                continue;
            }

            files.push(SourceFile {
                path: path.to_path_buf(),
                relative: rel_str,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        files
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
