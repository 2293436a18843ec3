//! The local package store.
//!
//! Each package version is unpacked once into `<root>/<id>/<version>/`. A
//! version directory only counts as installed once it carries the completion
//! marker; unpacking happens in a sibling `.partial` directory which is renamed
//! into place.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use walkdir::WalkDir;

use crate::error::PackageError;
use crate::identity::PackageIdentity;
use crate::source::PackageSource;

/// Framework directory that applies to every target.
pub const ANY_FRAMEWORK: &str = "any";

const COMPLETE_MARKER: &str = ".complete";
const LIB_DIR: &str = "lib";
const CONTENT_DIR: &str = "content";

/// A file shipped by a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageFile {
    /// Path relative to the package's library or content directory, using `/`.
    pub relative: String,
    /// Absolute path in the store.
    pub path: PathBuf,
}

/// A package installed in the store.
#[derive(Clone, Debug)]
pub struct ResolvedPackage {
    /// Which package.
    pub identity: PackageIdentity,
    /// Its version directory in the store.
    pub install_dir: PathBuf,
    /// Framework the library files were picked for.
    pub framework: String,
    /// Library files for that framework.
    pub libraries: Vec<PackageFile>,
    /// Content files.
    pub content: Vec<PackageFile>,
}

impl ResolvedPackage {
    /// Scans an installed version directory.
    pub fn scan(
        identity: PackageIdentity,
        install_dir: PathBuf,
        framework: &str,
    ) -> Result<Self, PackageError> {
        let lib_root = install_dir.join(LIB_DIR);
        let (framework, libraries) = if lib_root.join(framework).is_dir() {
            (framework.to_string(), list_files(&lib_root.join(framework))?)
        } else if lib_root.join(ANY_FRAMEWORK).is_dir() {
            (ANY_FRAMEWORK.to_string(), list_files(&lib_root.join(ANY_FRAMEWORK))?)
        } else {
            (framework.to_string(), Vec::new())
        };
        let content = list_files(&install_dir.join(CONTENT_DIR))?;
        Ok(Self {
            identity,
            install_dir,
            framework,
            libraries,
            content,
        })
    }

    /// Iterates over every library and content file.
    pub fn files(&self) -> impl Iterator<Item = &PackageFile> {
        self.libraries.iter().chain(self.content.iter())
    }
}

/// Lists regular files under `dir`, sorted by relative path. Symbolic
/// links are neither followed nor listed.
fn list_files(dir: &Path) -> Result<Vec<PackageFile>, PackageError> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            PackageError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(PackageFile {
            relative,
            path: entry.into_path(),
        });
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Installed packages on disk.
#[derive(Clone, Debug)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    /// Creates a store rooted at `root`. Nothing is created until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the version directory for `identity`.
    pub fn install_dir(&self, identity: &PackageIdentity) -> PathBuf {
        self.root
            .join(identity.key())
            .join(identity.version.to_string())
    }

    /// Returns `true` if `identity` is fully installed.
    pub fn is_installed(&self, identity: &PackageIdentity) -> bool {
        self.install_dir(identity).join(COMPLETE_MARKER).is_file()
    }

    /// Installs `identity` from `source` unless already present, then scans it.
    pub fn install(
        &self,
        source: &dyn PackageSource,
        identity: &PackageIdentity,
        framework: &str,
    ) -> Result<ResolvedPackage, PackageError> {
        let dir = self.install_dir(identity);
        if self.is_installed(identity) {
            tracing::info!(package = %identity, "package located in store");
        } else {
            tracing::info!(package = %identity, source = %source.describe(), "downloading package");
            let archive = source.fetch(identity)?;
            self.unpack(identity, &archive, &dir)?;
            tracing::info!(package = %identity, "package downloaded");
        }
        ResolvedPackage::scan(identity.clone(), dir, framework)
    }

    fn unpack(&self, identity: &PackageIdentity, archive: &[u8], dir: &Path) -> Result<(), PackageError> {
        let mut staging_name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        staging_name.push(".partial");
        let staging = dir.with_file_name(staging_name);
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| PackageError::io(&staging, e))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| PackageError::io(&staging, e))?;

        let archive_error = |reason: String| PackageError::Archive {
            id: identity.id.clone(),
            version: identity.version.to_string(),
            reason,
        };
        extract(archive, &staging).map_err(|e| archive_error(e.to_string()))?;
        let marker = staging.join(COMPLETE_MARKER);
        std::fs::write(&marker, identity.to_string()).map_err(|e| PackageError::io(&marker, e))?;

        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| PackageError::io(dir, e))?;
        }
        std::fs::rename(&staging, dir).map_err(|e| PackageError::io(dir, e))
    }
}

/// Unpacks a gzipped tarball below `dest`. Only regular files and
/// directories are unpacked; links and entries escaping `dest` are skipped.
fn extract(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            tracing::warn!(path = %entry.path()?.display(), ?kind, "skipping non-file archive entry");
            continue;
        }
        if !entry.unpack_in(dest)? {
            tracing::warn!(path = %entry.path()?.display(), "skipping archive entry outside the package");
        }
    }
    Ok(())
}

/// Reads a whole stream into memory.
pub(crate) fn read_all(reader: &mut dyn Read, what: &str) -> Result<Vec<u8>, PackageError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| PackageError::Invalid {
            what: what.to_string(),
            reason: e.to_string(),
        })?;
    Ok(bytes)
}
