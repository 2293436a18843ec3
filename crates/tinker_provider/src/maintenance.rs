//! Cache maintenance that needs no toolchain.

use std::path::{Path, PathBuf};

use tinker_cache::{origin_cache_dir, CacheManifest, REMOTE_DIR};
use tinker_config::{PluginDescriptor, PluginSource};

use crate::error::ProviderError;

/// Returns the cache directory of a remote plugin below `cache_root`.
pub fn cache_dir(
    cache_root: &Path,
    plugin: &PluginDescriptor,
) -> Result<Option<PathBuf>, ProviderError> {
    match &plugin.plugin.source {
        PluginSource::Remote { repository, .. } => Ok(Some(origin_cache_dir(cache_root, repository)?)),
        PluginSource::Local { .. } => Ok(None),
    }
}

/// Clears the recorded revision of a remote plugin's cache entry.
///
/// Staged files are kept; the next load recompiles and restages them.
/// Returns `false` for local plugins.
pub fn invalidate(cache_root: &Path, plugin: &PluginDescriptor) -> Result<bool, ProviderError> {
    let Some(dir) = cache_dir(cache_root, plugin)? else {
        return Ok(false);
    };
    let mut manifest = CacheManifest::load(&dir);
    manifest.invalidate();
    Ok(true)
}

/// Deletes the whole remote cache tree.
pub fn clear_cache(cache_root: &Path) -> Result<(), ProviderError> {
    let remote = cache_root.join(REMOTE_DIR);
    if remote.is_dir() {
        tracing::info!(dir = %remote.display(), "clearing module cache");
        std::fs::remove_dir_all(&remote).map_err(|e| ProviderError::io(&remote, e))?;
    }
    Ok(())
}

/// Deletes untracked staged files from every cached origin. Returns the
/// number of files removed.
pub fn collect_garbage(cache_root: &Path) -> Result<usize, ProviderError> {
    let remote = cache_root.join(REMOTE_DIR);
    let mut removed = 0;
    for owner in subdirectories(&remote)? {
        for origin in subdirectories(&owner)? {
            removed += CacheManifest::load(&origin).delete_unknown_files()?;
        }
    }
    if removed > 0 {
        tracing::info!(removed, "removed unknown staged files");
    }
    Ok(removed)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, ProviderError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ProviderError::io(dir, e))? {
        let path = entry.map_err(|e| ProviderError::io(dir, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
