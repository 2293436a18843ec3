//! Listing the files of a local plugin folder.

use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::error::ProviderError;

/// Directory names never descended into when walking a folder.
pub const SKIPPED_DIRS: &[&str] = &["bin", "obj", "target", ".git"];

/// A file of a local plugin folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFile {
    /// Path relative to the folder, `/`-separated.
    pub relative: String,
    /// Absolute path.
    pub path: PathBuf,
}

/// Lists the files of `folder`, sorted by relative path.
///
/// Inside a git work tree this is every tracked or untracked, non-ignored
/// file. Otherwise the folder is walked, skipping [`SKIPPED_DIRS`].
pub fn folder_files(folder: &Path) -> Result<Vec<FolderFile>, ProviderError> {
    let mut files = match git_files(folder) {
        Some(files) => files,
        None => walk_files(folder)?,
    };
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files.dedup_by(|a, b| a.relative == b.relative);
    Ok(files)
}

fn git_files(folder: &Path) -> Option<Vec<FolderFile>> {
    let output = Command::new("git")
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .current_dir(folder)
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!(folder = %folder.display(), "not a git work tree, walking the folder");
        return None;
    }
    let listing = String::from_utf8_lossy(&output.stdout);
    Some(
        listing
            .lines()
            .filter(|line| !line.is_empty())
            .map(|relative| FolderFile {
                relative: relative.to_string(),
                path: relative.split('/').fold(folder.to_path_buf(), |p, c| p.join(c)),
            })
            // Deleted but still tracked files are listed too.
            .filter(|file| file.path.is_file())
            .collect(),
    )
}

fn walk_files(folder: &Path) -> Result<Vec<FolderFile>, ProviderError> {
    let walker = WalkDir::new(folder).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && SKIPPED_DIRS
                    .iter()
                    .any(|skip| entry.file_name().to_string_lossy().eq_ignore_ascii_case(skip)))
    });
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| folder.to_path_buf());
            ProviderError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(folder) else {
            continue;
        };
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(FolderFile {
            relative,
            path: entry.into_path(),
        });
    }
    Ok(files)
}
