//! Strongly-typed configuration structures deserialized from TOML.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Host configuration, read from `tinker.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    /// Host identity and cache location.
    #[serde(default)]
    pub host: HostSection,
    /// Compiler toolchain settings.
    #[serde(default)]
    pub toolchain: ToolchainSection,
    /// Package registry settings.
    #[serde(default)]
    pub packages: PackagesSection,
    /// Where remote source archives are fetched from.
    #[serde(default)]
    pub sources: SourcesSection,
}

/// The `[host]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSection {
    /// Host application version. Part of the cache key, so a host upgrade
    /// invalidates every cached module.
    #[serde(default = "default_host_version")]
    pub version: String,
    /// Root of the per-origin cache tree. Defaults to the platform cache
    /// directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            version: default_host_version(),
            cache_dir: None,
        }
    }
}

fn default_host_version() -> String {
    "0.0.0".to_string()
}

/// How the compiler is kept apart from the host process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Isolation {
    /// A dedicated worker process.
    #[default]
    Process,
    /// A private catalog inside the host process.
    InProcess,
}

/// The `[toolchain]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolchainSection {
    /// Isolation mode.
    #[serde(default)]
    pub isolation: Isolation,
    /// Directories searched for `<name>.tkm` reference modules, in order.
    #[serde(default)]
    pub probe_dirs: Vec<PathBuf>,
    /// Reference names every plugin is compiled against.
    #[serde(default)]
    pub references: Vec<String>,
    /// Produce debug builds with line tables and embedded sources.
    #[serde(default)]
    pub debug: bool,
    /// Treat warnings as compile failures.
    #[serde(default)]
    pub deny_warnings: bool,
    /// Executable that serves `toolchain-worker`. Defaults to the running binary.
    pub worker: Option<PathBuf>,
}

/// The `[packages]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PackagesSection {
    /// Registry location: an `http(s)://` base URL or a local directory.
    pub registry: Option<String>,
    /// Package store directory. Defaults to `<cache root>/packages`.
    pub store: Option<PathBuf>,
    /// Target framework used to select `lib/<framework>/` files.
    #[serde(default = "default_framework")]
    pub framework: String,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            registry: None,
            store: None,
            framework: default_framework(),
        }
    }
}

fn default_framework() -> String {
    "tk1".to_string()
}

/// The `[sources]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesSection {
    /// Archive URL with `{repository}` and `{revision}` placeholders.
    pub url_template: Option<String>,
    /// Local directory laid out as `<repository>/<revision>.tar.gz`.
    pub mirror: Option<PathBuf>,
}

impl HostConfig {
    /// Returns the cache root, falling back to the platform cache directory.
    pub fn cache_root(&self) -> PathBuf {
        self.host.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tinker")
        })
    }

    /// Returns the package store directory.
    pub fn package_store(&self) -> PathBuf {
        self.packages
            .store
            .clone()
            .unwrap_or_else(|| self.cache_root().join("packages"))
    }

    /// Rewrites every relative path as relative to `base`.
    pub(crate) fn anchor_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(dir) = self.host.cache_dir.as_mut() {
            anchor(dir);
        }
        self.toolchain.probe_dirs.iter_mut().for_each(anchor);
        if let Some(worker) = self.toolchain.worker.as_mut() {
            anchor(worker);
        }
        if let Some(store) = self.packages.store.as_mut() {
            anchor(store);
        }
        if let Some(mirror) = self.sources.mirror.as_mut() {
            anchor(mirror);
        }
        if let Some(registry) = self.packages.registry.as_mut() {
            if !is_url(registry) && Path::new(registry.as_str()).is_relative() {
                *registry = base.join(registry.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

/// Returns `true` for `http://` and `https://` locations.
pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// A plugin descriptor, read from `plugin.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginDescriptor {
    /// Identity, source location and inclusion filter.
    pub plugin: PluginMeta,
    /// Package requirements.
    #[serde(default)]
    pub packages: PackageDeclarations,
    /// Named alternate revisions a user may select instead of the default.
    #[serde(default)]
    pub versions: Vec<AlternateVersion>,
}

/// The `[plugin]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginMeta {
    /// Display name.
    pub name: String,
    /// Where the source tree lives.
    #[serde(flatten)]
    pub source: PluginSource,
    /// Only `.tks` files under one of these prefixes are compiled. Empty means
    /// the whole tree.
    #[serde(default)]
    pub source_directories: Vec<String>,
    /// Files under this prefix are staged as content assets.
    pub asset_folder: Option<String>,
}

/// Where a plugin's source tree comes from.
///
/// Uses serde's untagged representation: a `repository` key selects a remote
/// archive, a `path` key selects a local working tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    /// A remote repository archive at a fixed revision.
    Remote {
        /// Repository identity, `owner/name`.
        repository: String,
        /// Default content revision.
        revision: String,
    },
    /// A local folder, always compiled fresh.
    Local {
        /// Folder path.
        path: PathBuf,
    },
}

/// The `[packages]` table of a plugin descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDeclarations {
    /// Packages resolved with their transitive dependencies.
    #[serde(default)]
    pub ids: Vec<PackagePin>,
    /// Path inside the source tree of a `packages.toml` lock file.
    pub config: Option<String>,
}

impl PackageDeclarations {
    /// Returns `true` if any packages are declared.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.config.is_none()
    }
}

/// One inline package requirement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackagePin {
    /// Package id.
    pub id: String,
    /// Version requirement, e.g. `"1.2.0"` or `">=1.2, <2"`.
    pub version: String,
}

/// A named alternate revision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlternateVersion {
    /// Name a user selects, compared case-insensitively.
    pub name: String,
    /// Revision to build when selected.
    pub revision: String,
}

impl PluginDescriptor {
    /// Returns `true` if the descriptor declares a content asset folder.
    pub fn requires_assets(&self) -> bool {
        self.asset_folder().is_some()
    }

    /// Returns the asset folder with surrounding `/` and whitespace removed.
    /// A blank folder counts as none.
    pub fn asset_folder(&self) -> Option<&str> {
        self.plugin
            .asset_folder
            .as_deref()
            .map(|folder| folder.trim().trim_matches('/'))
            .filter(|folder| !folder.is_empty())
    }

    /// Returns `true` if the descriptor declares package requirements.
    pub fn requires_packages(&self) -> bool {
        !self.packages.is_empty()
    }

    /// Returns `true` if `path` passes the source-directory filter.
    ///
    /// `path` is relative to the source tree root, with `/` separators.
    pub fn includes_source(&self, path: &str) -> bool {
        if !path.ends_with(".tks") {
            return false;
        }
        self.plugin.source_directories.is_empty()
            || self
                .plugin
                .source_directories
                .iter()
                .any(|dir| has_dir_prefix(path, dir))
    }

    /// Returns the path below the asset folder if `path` is inside it.
    pub fn asset_relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        let folder = self.asset_folder()?;
        path.strip_prefix(folder)?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }
}

fn has_dir_prefix(path: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    dir.is_empty()
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
