//! Files staged next to a cached module.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tinker_common::ContentHash;

use crate::error::CacheError;

/// Directory for content assets.
pub const ASSET_DIR: &str = "Assets";

/// Directory for files staged from packages.
pub const LIB_DIR: &str = "Bin";

/// What a staged file is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    /// A content asset from the source tree.
    Asset,
    /// A package library file.
    Lib,
    /// A package content file.
    LibContent,
}

impl AssetKind {
    /// Directory, relative to the cache directory, files of this kind live in.
    pub fn base_dir(self) -> &'static str {
        match self {
            AssetKind::Asset => ASSET_DIR,
            AssetKind::Lib | AssetKind::LibContent => LIB_DIR,
        }
    }

    /// Returns `true` for files staged from packages.
    pub fn is_package(self) -> bool {
        matches!(self, AssetKind::Lib | AssetKind::LibContent)
    }
}

/// A tracked staged file and the integrity it had when staged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    /// Path below the kind's base directory, `/`-separated.
    pub path: String,
    /// Kind of file.
    pub kind: AssetKind,
    /// Size in bytes.
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u64,
    /// Content hash.
    pub hash: ContentHash,
}

impl AssetFile {
    /// Reads the integrity of an already staged file.
    pub(crate) fn capture(
        cache_dir: &Path,
        path: String,
        kind: AssetKind,
    ) -> Result<Self, CacheError> {
        let full = full_path(cache_dir, &path, kind);
        let (size, modified_ns) = stat(&full)?;
        let bytes = std::fs::read(&full).map_err(|e| CacheError::io(&full, e))?;
        Ok(Self {
            path,
            kind,
            size,
            modified_ns,
            hash: ContentHash::from_bytes(&bytes),
        })
    }

    /// Where the file lives.
    pub fn full_path(&self, cache_dir: &Path) -> PathBuf {
        full_path(cache_dir, &self.path, self.kind)
    }

    /// Returns `true` if the file still has its recorded size and mtime.
    pub fn is_valid(&self, cache_dir: &Path) -> bool {
        match stat(&self.full_path(cache_dir)) {
            Ok((size, modified_ns)) => size == self.size && modified_ns == self.modified_ns,
            Err(_) => false,
        }
    }
}

pub(crate) fn full_path(cache_dir: &Path, relative: &str, kind: AssetKind) -> PathBuf {
    let mut path = cache_dir.join(kind.base_dir());
    for part in relative.split('/') {
        path.push(part);
    }
    path
}

fn stat(path: &Path) -> Result<(u64, u64), CacheError> {
    let meta = std::fs::metadata(path).map_err(|e| CacheError::io(path, e))?;
    let modified = meta.modified().map_err(|e| CacheError::io(path, e))?;
    let modified_ns = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    Ok((meta.len(), modified_ns))
}

/// Normalizes a staged path: `\` becomes `/`, leading `/` and empty or `.`
/// segments are dropped. `..` segments are rejected.
pub(crate) fn normalize(relative: &str) -> Result<String, CacheError> {
    let replaced = relative.replace('\\', "/");
    let mut parts = Vec::new();
    for part in replaced.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(CacheError::InvalidPath {
                    path: relative.to_string(),
                })
            }
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Err(CacheError::InvalidPath {
            path: relative.to_string(),
        });
    }
    Ok(parts.join("/"))
}
