//! Reference lookup, transitive resolution and memoization.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tinker_module::{has_module_extension, ModuleError, ModuleImage, MODULE_EXTENSION};

use crate::error::ResolutionError;

/// Host modules that are never handed to the compiler.
///
/// These wrap native host functionality and have no callable Tinker surface;
/// compiling against them produces modules that fail to load.
pub const REFERENCE_DENYLIST: &[&str] = &["host_native", "host_native_gpu", "host_loader"];

fn is_denied(name: &str) -> bool {
    REFERENCE_DENYLIST
        .iter()
        .any(|denied| denied.eq_ignore_ascii_case(name))
}

/// A resolved reference module.
#[derive(Clone, Debug)]
pub struct ReferenceEntry {
    /// Reference name, equal to the module name.
    pub name: String,
    /// Decoded module.
    pub image: Arc<ModuleImage>,
    /// The file's bytes as read.
    pub bytes: Arc<[u8]>,
    /// Where it was read from.
    pub origin: PathBuf,
}

impl ReferenceEntry {
    /// Reads and validates a module file.
    pub fn from_file(path: &Path) -> Result<Self, ModuleError> {
        let bytes = std::fs::read(path).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let image = ModuleImage::from_bytes(&bytes)?;
        Ok(Self {
            name: image.name.clone(),
            image: Arc::new(image),
            bytes: bytes.into(),
            origin: path.to_path_buf(),
        })
    }
}

/// Memoized set of resolved references for one toolchain context.
///
/// Entries are added as names are resolved and are never evicted.
#[derive(Debug, Default)]
pub struct ReferenceCatalog {
    probe_dirs: Vec<PathBuf>,
    entries: BTreeMap<String, ReferenceEntry>,
}

impl ReferenceCatalog {
    /// Creates an empty catalog searching `probe_dirs` in order.
    pub fn new(probe_dirs: Vec<PathBuf>) -> Self {
        Self {
            probe_dirs,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the probe directories.
    pub fn probe_dirs(&self) -> &[PathBuf] {
        &self.probe_dirs
    }

    /// Finds the file for `name` in the first probe directory that has one.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.probe_dirs
            .iter()
            .map(|dir| dir.join(format!("{name}.{MODULE_EXTENSION}")))
            .find(|path| path.is_file())
    }

    fn read(&self, name: &str) -> Result<ReferenceEntry, String> {
        let path = self
            .locate(name)
            .ok_or_else(|| "not found in any probe directory".to_string())?;
        let entry = ReferenceEntry::from_file(&path).map_err(|e| e.to_string())?;
        if entry.name != name {
            return Err(format!(
                "{} declares module name '{}'",
                path.display(),
                entry.name
            ));
        }
        Ok(entry)
    }

    /// Resolves `names` and everything they depend on.
    ///
    /// Seeds that cannot be read fail the call, all of them reported
    /// together. Dependencies that cannot be read are skipped. Names already
    /// resolved and denylisted names are never processed.
    pub fn resolve<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ResolutionError> {
        let seeds: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let mut worklist: Vec<String> = names.iter().rev().map(|n| n.as_ref().to_string()).collect();
        let mut attempted: HashSet<String> = HashSet::new();
        let mut unresolved = Vec::new();

        while let Some(name) = worklist.pop() {
            if self.entries.contains_key(&name) || !attempted.insert(name.clone()) {
                continue;
            }
            if is_denied(&name) {
                tracing::debug!(reference = %name, "skipping denylisted reference");
                continue;
            }
            match self.read(&name) {
                Ok(entry) => {
                    tracing::debug!(
                        reference = %name,
                        origin = %entry.origin.display(),
                        dependencies = entry.image.dependencies.len(),
                        "resolved reference"
                    );
                    worklist.extend(entry.image.dependencies.iter().rev().cloned());
                    self.entries.insert(name, entry);
                }
                Err(reason) if seeds.contains(name.as_str()) => {
                    tracing::error!(reference = %name, %reason, "failed to resolve reference");
                    unresolved.push(name);
                }
                Err(reason) => {
                    tracing::debug!(reference = %name, %reason, "dropping unresolvable dependency");
                }
            }
        }

        if unresolved.is_empty() {
            Ok(())
        } else {
            let order: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
            unresolved.sort_by_key(|n| order.iter().position(|o| *o == n.as_str()));
            Err(ResolutionError::Unresolved { names: unresolved })
        }
    }

    /// Resolves one more reference at run time.
    ///
    /// Errors are logged and swallowed.
    pub fn load_reference(&mut self, name: &str) -> Option<&ReferenceEntry> {
        tracing::info!(reference = %name, "loading reference");
        if let Err(err) = self.resolve(&[name]) {
            tracing::warn!(reference = %name, error = %err, "reference unavailable");
            return None;
        }
        self.entries.get(name)
    }

    /// Reads an arbitrary module file as an extra reference.
    ///
    /// The file must carry the module extension and exist. Failures are
    /// logged at debug level and yield `None`.
    pub fn add_reference(path: &Path) -> Option<ReferenceEntry> {
        if !has_module_extension(path) {
            tracing::debug!(path = %path.display(), "ignoring custom reference without module extension");
            return None;
        }
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "custom reference does not exist");
            return None;
        }
        match ReferenceEntry::from_file(path) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "custom reference unreadable");
                None
            }
        }
    }

    /// Looks up a resolved reference.
    pub fn get(&self, name: &str) -> Option<&ReferenceEntry> {
        self.entries.get(name)
    }

    /// Iterates over resolved references in name order.
    pub fn entries(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.values()
    }

    /// Returns the number of resolved references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
