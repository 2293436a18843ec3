//! The per-origin cache manifest.
//!
//! The manifest is stored as `manifest.json` in the origin's cache directory.
//! It records which revision the cached module was built from, which runtime
//! built it, the host version it targeted and every file staged next to it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tinker_module::{runtime_descriptor, DEBUG_EXTENSION, MODULE_EXTENSION};
use walkdir::WalkDir;

use crate::asset::{self, AssetFile, AssetKind, ASSET_DIR, LIB_DIR};
use crate::error::CacheError;

/// Name of the manifest file within a cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Revision marker written by older releases, migrated on load.
pub const LEGACY_REVISION_FILE: &str = "commit.sha1";

/// File stem of the cached module and its debug data.
pub const MODULE_STEM: &str = "plugin";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ManifestData {
    revision: Option<String>,
    runtime: Option<String>,
    target_version: Option<String>,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    files: Vec<AssetFile>,
}

/// Cache state of one source origin.
#[derive(Clone, Debug)]
pub struct CacheManifest {
    dir: PathBuf,
    data: ManifestData,
}

impl CacheManifest {
    /// Creates an empty manifest for `cache_dir` without touching the disk.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: cache_dir.into(),
            data: ManifestData::default(),
        }
    }

    /// Loads the manifest of `cache_dir`.
    ///
    /// A missing or unreadable manifest yields an empty one. A legacy
    /// revision marker is folded into the manifest, deleted, and the result
    /// saved.
    pub fn load(cache_dir: &Path) -> Self {
        let mut manifest = Self::new(cache_dir);
        let path = cache_dir.join(MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(data) => manifest.data = data,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "discarding unreadable cache manifest")
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %cache_dir.display(), "no cache manifest, starting fresh")
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot read cache manifest")
            }
        }
        manifest.migrate_legacy_revision();
        manifest
    }

    fn migrate_legacy_revision(&mut self) {
        let marker = self.dir.join(LEGACY_REVISION_FILE);
        let Ok(text) = std::fs::read_to_string(&marker) else {
            return;
        };
        let revision = text.trim();
        if !revision.is_empty() {
            self.data.revision = Some(revision.to_string());
            if self.data.runtime.is_none() {
                self.data.runtime = Some(runtime_descriptor());
            }
        }
        if let Err(err) = std::fs::remove_file(&marker) {
            tracing::warn!(path = %marker.display(), error = %err, "cannot remove legacy revision marker");
        }
        tracing::info!(dir = %self.dir.display(), "migrated legacy revision marker");
        self.save();
    }

    /// Returns `true` if the cached module can be used as is.
    ///
    /// All of these must hold: the module file exists, the stored revision
    /// equals `current_revision`, the stored runtime is this process's
    /// runtime, the stored target version equals `current_target_version`
    /// when that is given, every staged file is intact, and at least one
    /// file of each required kind is staged.
    pub fn is_valid(
        &self,
        current_revision: &str,
        current_target_version: Option<&str>,
        requires_assets: bool,
        requires_packages: bool,
    ) -> bool {
        let miss = |reason: &str| {
            tracing::debug!(dir = %self.dir.display(), reason, "cache miss");
            false
        };
        if !self.module_path().is_file() {
            return miss("module file missing");
        }
        if self.data.revision.as_deref() != Some(current_revision) {
            return miss("revision changed");
        }
        if self.data.runtime.as_deref() != Some(runtime_descriptor().as_str()) {
            return miss("runtime changed");
        }
        if let Some(target) = current_target_version {
            if self.data.target_version.as_deref() != Some(target) {
                return miss("target version changed");
            }
        }
        if let Some(stale) = self.data.files.iter().find(|f| !f.is_valid(&self.dir)) {
            tracing::debug!(path = %stale.path, "staged file changed");
            return miss("staged file changed");
        }
        if requires_assets && !self.data.files.iter().any(|f| f.kind == AssetKind::Asset) {
            return miss("assets missing");
        }
        if requires_packages && !self.data.files.iter().any(|f| f.kind.is_package()) {
            return miss("package files missing");
        }
        true
    }

    /// Prepares for a rebuild: clears the revision and tracked files and
    /// records the runtime and target version being built for.
    pub fn reset(&mut self, target_version: Option<&str>) {
        self.data.revision = None;
        self.data.runtime = Some(runtime_descriptor());
        self.data.target_version = target_version.map(str::to_string);
        self.data.files.clear();
    }

    /// Tracks an already staged file and returns its record.
    pub fn create_asset(&mut self, relative: &str, kind: AssetKind) -> Result<AssetFile, CacheError> {
        let path = asset::normalize(relative)?;
        let asset = AssetFile::capture(&self.dir, path, kind)?;
        self.track(asset.clone());
        Ok(asset)
    }

    /// Writes `bytes` as a staged file unless an identical tracked copy is
    /// already on disk, and tracks it.
    pub fn stage_asset(
        &mut self,
        relative: &str,
        kind: AssetKind,
        bytes: &[u8],
    ) -> Result<AssetFile, CacheError> {
        let path = asset::normalize(relative)?;
        if let Some(existing) = self.find(&path, kind) {
            if existing.is_valid(&self.dir)
                && existing.size == bytes.len() as u64
                && existing.hash == tinker_common::ContentHash::from_bytes(bytes)
            {
                return Ok(existing.clone());
            }
        }
        let full = asset::full_path(&self.dir, &path, kind);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        std::fs::write(&full, bytes).map_err(|e| CacheError::io(&full, e))?;
        self.create_asset(&path, kind)
    }

    /// Stages a copy of `source_file`.
    pub fn stage_asset_from(
        &mut self,
        relative: &str,
        kind: AssetKind,
        source_file: &Path,
    ) -> Result<AssetFile, CacheError> {
        let bytes = std::fs::read(source_file).map_err(|e| CacheError::io(source_file, e))?;
        self.stage_asset(relative, kind, &bytes)
    }

    fn find(&self, path: &str, kind: AssetKind) -> Option<&AssetFile> {
        self.data
            .files
            .iter()
            .find(|f| f.path == path && f.kind.base_dir() == kind.base_dir())
    }

    fn track(&mut self, asset: AssetFile) {
        let base = asset.kind.base_dir();
        match self
            .data
            .files
            .iter_mut()
            .find(|f| f.path == asset.path && f.kind.base_dir() == base)
        {
            Some(slot) => *slot = asset,
            None => self.data.files.push(asset),
        }
    }

    /// Removes every file under the staged directories that is not tracked,
    /// then any directories left empty. Returns the number of files removed.
    pub fn delete_unknown_files(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for base in [ASSET_DIR, LIB_DIR] {
            let root = self.dir.join(base);
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&root).contents_first(true).min_depth(1) {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(&root).to_path_buf();
                    CacheError::io(path, e.into())
                })?;
                let path = entry.path();
                if entry.file_type().is_dir() {
                    // Only succeeds for directories left empty.
                    let _ = std::fs::remove_dir(path);
                    continue;
                }
                let known = path
                    .strip_prefix(&root)
                    .ok()
                    .map(|rel| {
                        rel.components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/")
                    })
                    .is_some_and(|rel| {
                        self.data
                            .files
                            .iter()
                            .any(|f| f.path == rel && f.kind.base_dir() == base)
                    });
                if !known {
                    std::fs::remove_file(path).map_err(|e| CacheError::io(path, e))?;
                    tracing::debug!(path = %path.display(), "removed unknown staged file");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Forces the next validity check to miss and saves. Staged files stay.
    pub fn invalidate(&mut self) {
        tracing::info!(dir = %self.dir.display(), "invalidating cache");
        self.data.revision = None;
        self.save();
    }

    /// Writes the manifest, logging instead of failing.
    pub fn save(&self) {
        if let Err(err) = self.try_save() {
            tracing::error!(dir = %self.dir.display(), error = %err, "failed to save cache manifest");
        }
    }

    /// Writes the manifest, creating the cache directory if needed.
    pub fn try_save(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.data).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Stops tracking every staged file. Files stay on disk.
    pub fn clear_assets(&mut self) {
        self.data.files.clear();
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the compiled module.
    pub fn module_path(&self) -> PathBuf {
        self.dir.join(format!("{MODULE_STEM}.{MODULE_EXTENSION}"))
    }

    /// Path of the module's debug data.
    pub fn debug_path(&self) -> PathBuf {
        self.dir.join(format!("{MODULE_STEM}.{DEBUG_EXTENSION}"))
    }

    /// Directory of staged content assets.
    pub fn asset_dir(&self) -> PathBuf {
        self.dir.join(ASSET_DIR)
    }

    /// Directory of staged package files.
    pub fn lib_dir(&self) -> PathBuf {
        self.dir.join(LIB_DIR)
    }

    /// Tracked staged files in staging order.
    pub fn assets(&self) -> &[AssetFile] {
        &self.data.files
    }

    /// Revision the cached module was built from.
    pub fn revision(&self) -> Option<&str> {
        self.data.revision.as_deref()
    }

    /// Records the revision of a successful build.
    pub fn set_revision(&mut self, revision: impl Into<String>) {
        self.data.revision = Some(revision.into());
    }

    /// Forgets the recorded revision so the next load rebuilds.
    pub fn clear_revision(&mut self) {
        self.data.revision = None;
    }

    /// Returns `true` if the cached module is a debug build.
    pub fn is_debug_build(&self) -> bool {
        self.data.debug
    }

    /// Records whether the cached module is a debug build.
    pub fn set_debug_build(&mut self, debug: bool) {
        self.data.debug = debug;
    }

    /// Runtime descriptor the cached module was built by.
    pub fn runtime(&self) -> Option<&str> {
        self.data.runtime.as_deref()
    }

    /// Host version the cached module was built for.
    pub fn target_version(&self) -> Option<&str> {
        self.data.target_version.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REV: &str = "abc123";

    /// A manifest that is valid for `REV` with no target version.
    fn built(dir: &Path) -> CacheManifest {
        let mut manifest = CacheManifest::new(dir);
        manifest.reset(Some("1.0.0"));
        std::fs::write(manifest.module_path(), b"module").unwrap();
        manifest.set_revision(REV);
        manifest
    }

    #[test]
    fn fresh_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CacheManifest::load(dir.path());
        assert!(manifest.revision().is_none());
        assert!(!manifest.is_valid(REV, None, false, false));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        manifest.stage_asset("icons/a.png", AssetKind::Asset, b"png").unwrap();
        manifest.try_save().unwrap();

        let loaded = CacheManifest::load(dir.path());
        assert_eq!(loaded.revision(), Some(REV));
        assert_eq!(loaded.target_version(), Some("1.0.0"));
        assert_eq!(loaded.assets(), manifest.assets());
        assert_eq!(
            loaded.is_valid(REV, Some("1.0.0"), true, false),
            manifest.is_valid(REV, Some("1.0.0"), true, false)
        );
        assert!(loaded.is_valid(REV, Some("1.0.0"), true, false));
    }

    #[test]
    fn each_axis_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = built(dir.path());
        assert!(manifest.is_valid(REV, Some("1.0.0"), false, false));
        assert!(manifest.is_valid(REV, None, false, false));

        assert!(!manifest.is_valid("def456", Some("1.0.0"), false, false));
        assert!(!manifest.is_valid(REV, Some("1.1.0"), false, false));

        let mut other_runtime = manifest.clone();
        other_runtime.data.runtime = Some("tinker 0.0.0 (module format 0)".to_string());
        assert!(!other_runtime.is_valid(REV, Some("1.0.0"), false, false));

        std::fs::remove_file(manifest.module_path()).unwrap();
        assert!(!manifest.is_valid(REV, Some("1.0.0"), false, false));
    }

    #[test]
    fn build_mode_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        assert!(!manifest.is_debug_build());
        manifest.set_debug_build(true);
        manifest.try_save().unwrap();
        assert!(CacheManifest::load(dir.path()).is_debug_build());

        manifest.clear_revision();
        assert!(!manifest.is_valid(REV, None, false, false));
    }

    #[test]
    fn required_kinds_must_be_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        assert!(!manifest.is_valid(REV, None, true, false));
        assert!(!manifest.is_valid(REV, None, false, true));

        manifest.stage_asset("a.txt", AssetKind::Asset, b"a").unwrap();
        assert!(manifest.is_valid(REV, None, true, false));
        assert!(!manifest.is_valid(REV, None, false, true));

        manifest.stage_asset("json.tkm", AssetKind::LibContent, b"j").unwrap();
        assert!(manifest.is_valid(REV, None, true, true));
    }

    #[test]
    fn tampered_asset_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        let asset = manifest.stage_asset("a.txt", AssetKind::Asset, b"a").unwrap();
        assert!(manifest.is_valid(REV, None, false, false));
        std::fs::write(asset.full_path(dir.path()), b"changed").unwrap();
        assert!(!manifest.is_valid(REV, None, false, false));
    }

    #[test]
    fn stage_asset_skips_identical_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        let first = manifest.stage_asset("\\data\\a.txt", AssetKind::Asset, b"a").unwrap();
        assert_eq!(first.path, "data/a.txt");
        let second = manifest.stage_asset("data/a.txt", AssetKind::Asset, b"a").unwrap();
        assert_eq!(first, second);
        assert_eq!(manifest.assets().len(), 1);

        let third = manifest.stage_asset("data/a.txt", AssetKind::Asset, b"bb").unwrap();
        assert_eq!(third.size, 2);
        assert_eq!(manifest.assets().len(), 1);
    }

    #[test]
    fn stage_asset_from_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let source_file = src.path().join("lib.tkm");
        std::fs::write(&source_file, b"lib").unwrap();

        let mut manifest = built(dir.path());
        let asset = manifest
            .stage_asset_from("lib.tkm", AssetKind::Lib, &source_file)
            .unwrap();
        assert_eq!(asset.full_path(dir.path()), dir.path().join("Bin").join("lib.tkm"));
        assert_eq!(std::fs::read(asset.full_path(dir.path())).unwrap(), b"lib");
    }

    #[test]
    fn delete_unknown_files_leaves_exactly_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        manifest.stage_asset("keep/a.txt", AssetKind::Asset, b"a").unwrap();
        manifest.stage_asset("json.tkm", AssetKind::Lib, b"j").unwrap();

        for stray in ["Assets/keep/stray.txt", "Assets/old/gone.txt", "Bin/old.tkm"] {
            let path = dir.path().join(stray);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }

        assert_eq!(manifest.delete_unknown_files().unwrap(), 3);
        let mut remaining: Vec<String> = WalkDir::new(dir.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(dir.path()).ok()?;
                let rel = rel.to_string_lossy().replace('\\', "/");
                (rel.starts_with("Assets/") || rel.starts_with("Bin/")).then_some(rel)
            })
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["Assets/keep/a.txt", "Bin/json.tkm"]);
        assert!(!dir.path().join("Assets/old").exists());
    }

    #[test]
    fn invalidate_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        manifest.stage_asset("a.txt", AssetKind::Asset, b"a").unwrap();
        manifest.invalidate();

        let loaded = CacheManifest::load(dir.path());
        assert!(loaded.revision().is_none());
        assert_eq!(loaded.assets().len(), 1);
        assert!(dir.path().join("Assets/a.txt").is_file());
    }

    #[test]
    fn legacy_marker_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEGACY_REVISION_FILE), "abc123\n").unwrap();
        std::fs::write(dir.path().join("plugin.tkm"), b"module").unwrap();

        let manifest = CacheManifest::load(dir.path());
        assert_eq!(manifest.revision(), Some("abc123"));
        assert!(!dir.path().join(LEGACY_REVISION_FILE).exists());
        assert!(dir.path().join(MANIFEST_FILE).is_file());
        assert!(manifest.is_valid("abc123", None, false, false));
    }

    #[test]
    fn corrupt_manifest_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "not valid json {{{").unwrap();
        let manifest = CacheManifest::load(dir.path());
        assert!(manifest.revision().is_none());
        assert!(manifest.assets().is_empty());
    }

    #[test]
    fn manifest_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = built(dir.path());
        manifest.stage_asset("a.txt", AssetKind::Asset, b"a").unwrap();
        manifest.try_save().unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["revision"], REV);
        assert_eq!(json["files"][0]["path"], "a.txt");
        assert_eq!(json["files"][0]["kind"], "asset");
        assert!(json["files"][0]["hash"].is_string());
    }
}
