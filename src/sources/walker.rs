//! Reproducible directory walking.
//!
//! Entries of every directory are visited files first, then subdirectories,
//! each group ordered by path. The order is stable across platforms and
//! filesystems, so task inputs derived from it are stable too.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::{DirEntry, WalkDir};

/// A file found under a source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Full path of the file
    pub path: PathBuf,
    /// Path relative to the walked root
    pub relative: PathBuf,
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.path().to_string_lossy().cmp(&b.path().to_string_lossy()))
}

/// Walk `root` depth-first and return every non-directory entry.
///
/// A missing root yields no files.
pub fn walk_reproducibly(root: &Path) -> Result<Vec<WalkedFile>> {
    if !root.exists() {
        tracing::trace!("skipping missing source root {}", root.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by(files_first) {
        let entry = entry.with_context(|| {
            format!("could not list contents of directory '{}'", root.display())
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        files.push(WalkedFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_files_before_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/nested")).unwrap();
        fs::write(root.join("z.g4"), "").unwrap();
        fs::write(root.join("a/inner.g"), "").unwrap();
        fs::write(root.join("a/nested/deep.g4"), "").unwrap();
        fs::write(root.join("b.g"), "").unwrap();

        let relative: Vec<_> = walk_reproducibly(root)
            .unwrap()
            .into_iter()
            .map(|f| f.relative)
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("b.g"),
                PathBuf::from("z.g4"),
                PathBuf::from("a/inner.g"),
                PathBuf::from("a/nested/deep.g4"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let files = walk_reproducibly(&tmp.path().join("does-not-exist")).unwrap();
        assert!(files.is_empty());
    }
}
