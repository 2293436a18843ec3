//! Turning plugin descriptors into compiled modules.

use std::path::{Path, PathBuf};

use tinker_cache::{origin_cache_dir, AssetKind, CacheManifest};
use tinker_common::ContentHash;
use tinker_config::{resolve_source, PluginDescriptor, ResolvedSource};
use tinker_packages::{PackageError, PackageReference, PackageResolver, ResolvedPackage};
use tinker_toolchain::{CompilationSession, CompiledModule, ToolchainFactory};

use crate::error::ProviderError;
use crate::fetch::{archive_files, ArchiveFetcher};
use crate::local::folder_files;
use crate::maintenance;
use crate::state::{LoadAttempt, LoadState};

/// Directory below the cache root holding package files staged for local
/// folder plugins.
pub const LOCAL_PACKAGES_DIR: &str = "packages-bin";

/// How modules are built and where they are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Root of the cache tree.
    pub cache_root: PathBuf,
    /// Host version modules are built for. Part of the cache key when set.
    pub target_version: Option<String>,
    /// Produce debug builds.
    pub debug: bool,
}

/// Whether a module was reused or freshly built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Served from a valid cache entry without compiling.
    Cached,
    /// Compiled during this call.
    Compiled,
}

/// Where the produced module can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLocation {
    /// A module file in the cache.
    File {
        /// The `.tkm` file.
        module: PathBuf,
        /// The `.tkd` file, for debug builds.
        debug: Option<PathBuf>,
    },
    /// Module bytes that were never written to the cache.
    Memory {
        /// Encoded module image.
        image: Vec<u8>,
        /// Encoded debug info, for debug builds.
        debug: Option<Vec<u8>>,
    },
}

/// The outcome of a successful load attempt.
#[derive(Debug, Clone)]
pub struct ProducedModule {
    /// Plugin name.
    pub plugin: String,
    /// Reused or rebuilt.
    pub status: ModuleStatus,
    /// The module itself.
    pub location: ModuleLocation,
    /// Revision built, for remote plugins.
    pub revision: Option<String>,
    /// Directory holding the plugin's content assets, if it declares any.
    pub asset_dir: Option<PathBuf>,
    /// Directory holding files staged from packages, if any were staged.
    pub staged_dir: Option<PathBuf>,
}

impl ProducedModule {
    /// Returns the encoded module image, reading it from disk if needed.
    pub fn image_bytes(&self) -> Result<Vec<u8>, ProviderError> {
        match &self.location {
            ModuleLocation::File { module, .. } => {
                std::fs::read(module).map_err(|e| ProviderError::io(module, e))
            }
            ModuleLocation::Memory { image, .. } => Ok(image.clone()),
        }
    }
}

/// Produces plugin modules, compiling only when the cache cannot be used.
///
/// The provider owns the toolchain context: it is initialized by
/// [`SourceProvider::new`] and disposed exactly once, by
/// [`SourceProvider::dispose`] or on drop.
///
/// Cache directories and the package store are not locked. Only one provider,
/// in one process, may write to a given cache root at a time.
pub struct SourceProvider {
    toolchain: Box<dyn ToolchainFactory>,
    fetcher: Box<dyn ArchiveFetcher>,
    packages: Option<PackageResolver>,
    settings: ProviderSettings,
    disposed: bool,
}

impl SourceProvider {
    /// Creates a provider and initializes its toolchain.
    ///
    /// Plugins declaring packages fail with [`ProviderError::NoRegistry`] when
    /// `packages` is `None`.
    pub fn new(
        settings: ProviderSettings,
        mut toolchain: Box<dyn ToolchainFactory>,
        fetcher: Box<dyn ArchiveFetcher>,
        packages: Option<PackageResolver>,
    ) -> Result<Self, ProviderError> {
        toolchain.init()?;
        Ok(Self {
            toolchain,
            fetcher,
            packages,
            settings,
            disposed: false,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Produces the module for the plugin's default revision.
    pub fn produce_module(
        &mut self,
        plugin: &PluginDescriptor,
    ) -> Result<ProducedModule, ProviderError> {
        self.produce_version(plugin, None)
    }

    /// Produces the module for a selected alternate version, or the default
    /// revision when `selected` is `None` or unknown.
    pub fn produce_version(
        &mut self,
        plugin: &PluginDescriptor,
        selected: Option<&str>,
    ) -> Result<ProducedModule, ProviderError> {
        match resolve_source(plugin, selected) {
            ResolvedSource::Remote {
                repository,
                revision,
            } => self.produce_remote(plugin, &repository, &revision),
            ResolvedSource::Local { path } => self.produce_local(plugin, &path),
        }
    }

    /// Returns the cache directory of a remote plugin.
    pub fn cache_dir(&self, plugin: &PluginDescriptor) -> Result<Option<PathBuf>, ProviderError> {
        maintenance::cache_dir(&self.settings.cache_root, plugin)
    }

    /// Forces the next load of `plugin` to recompile.
    ///
    /// Returns `false` for local plugins, which are never cached.
    pub fn invalidate(&self, plugin: &PluginDescriptor) -> Result<bool, ProviderError> {
        maintenance::invalidate(&self.settings.cache_root, plugin)
    }

    /// Deletes every cached remote module.
    pub fn clear_cache(&self) -> Result<(), ProviderError> {
        maintenance::clear_cache(&self.settings.cache_root)
    }

    /// Deletes untracked staged files from every cached origin. Returns the
    /// number of files removed.
    pub fn collect_garbage(&self) -> Result<usize, ProviderError> {
        maintenance::collect_garbage(&self.settings.cache_root)
    }

    /// Releases the toolchain context. Safe to repeat.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.toolchain.dispose();
            self.disposed = true;
        }
    }

    fn produce_remote(
        &mut self,
        plugin: &PluginDescriptor,
        repository: &str,
        revision: &str,
    ) -> Result<ProducedModule, ProviderError> {
        let name = plugin.plugin.name.as_str();
        let mut attempt = LoadAttempt::new(name);
        let dir = origin_cache_dir(&self.settings.cache_root, repository)?;
        let mut manifest = CacheManifest::load(&dir);
        attempt.advance(LoadState::ManifestLoaded);

        let target = self.settings.target_version.as_deref();
        let valid = manifest.is_valid(
            revision,
            target,
            plugin.requires_assets(),
            plugin.requires_packages(),
        );
        let same_mode = manifest.is_debug_build() == self.settings.debug;
        if valid && !same_mode {
            tracing::debug!(plugin = name, debug = self.settings.debug, "cache miss: build mode changed");
        }
        if valid && same_mode {
            attempt.advance(LoadState::CacheHit);
            if let Err(err) = manifest.delete_unknown_files() {
                tracing::warn!(plugin = name, error = %err, "failed to remove unknown staged files");
            }
            tracing::info!(plugin = name, %revision, "using cached module");
            attempt.advance(LoadState::Done);
            return Ok(self.cached_module(plugin, &manifest, revision, ModuleStatus::Cached));
        }

        attempt.advance(LoadState::CacheMiss);
        manifest.reset(target);
        match self.build_remote(plugin, repository, revision, &mut manifest, &mut attempt) {
            Ok(module) => {
                attempt.advance(LoadState::Success);
                attempt.advance(LoadState::Persisting);
                if let Err(err) = self.persist(&module, &mut manifest, revision) {
                    return Err(report(&mut attempt, &mut manifest, repository, revision, err));
                }
                attempt.advance(LoadState::Done);
                tracing::info!(plugin = name, %repository, %revision, "plugin compiled");
                Ok(self.cached_module(plugin, &manifest, revision, ModuleStatus::Compiled))
            }
            Err(err) => Err(report(&mut attempt, &mut manifest, repository, revision, err)),
        }
    }

    /// Fetches, routes and compiles one archive.
    fn build_remote(
        &mut self,
        plugin: &PluginDescriptor,
        repository: &str,
        revision: &str,
        manifest: &mut CacheManifest,
        attempt: &mut LoadAttempt<'_>,
    ) -> Result<CompiledModule, ProviderError> {
        let name = plugin.plugin.name.as_str();
        attempt.advance(LoadState::Fetching);
        let archive = self.fetcher.fetch(repository, revision)?;
        let files = archive_files(&archive)?;
        tracing::debug!(plugin = name, files = files.len(), "source archive unpacked");

        let mut session = self.toolchain.create(self.settings.debug)?;
        let config_path = plugin
            .packages
            .config
            .as_deref()
            .map(|p| p.replace('\\', "/").trim_start_matches('/').to_string());
        let mut sources = 0;
        let mut assets = 0;
        for file in &files {
            if config_path.as_deref() == Some(file.path.as_str()) {
                let resolver = self.resolver(name)?;
                let packages = resolver.download_for_config(&mut file.data.as_slice())?;
                stage_packages(&packages, manifest, session.as_mut())?;
            }
            if plugin.includes_source(&file.path) {
                session.load(&mut file.data.as_slice(), &file.path)?;
                sources += 1;
            }
            if let Some(relative) = plugin.asset_relative(&file.path) {
                manifest.stage_asset(relative, AssetKind::Asset, &file.data)?;
                assets += 1;
            }
        }
        if !plugin.packages.ids.is_empty() {
            let refs = inline_references(plugin)?;
            let packages = self.resolver(name)?.download_packages(&refs, true)?;
            stage_packages(&packages, manifest, session.as_mut())?;
        }

        attempt.advance(LoadState::Compiling);
        tracing::info!(plugin = name, sources, assets, debug = self.settings.debug, "compiling plugin");
        session
            .compile(name)?
            .map_err(|failures| ProviderError::Compile {
                plugin: name.to_string(),
                failures,
            })
    }

    /// Writes the module files and records the build in the manifest.
    fn persist(
        &self,
        module: &CompiledModule,
        manifest: &mut CacheManifest,
        revision: &str,
    ) -> Result<(), ProviderError> {
        let module_path = manifest.module_path();
        write_file(&module_path, &module.image)?;
        let debug_path = manifest.debug_path();
        match &module.debug {
            Some(debug) => write_file(&debug_path, debug)?,
            None if debug_path.exists() => {
                std::fs::remove_file(&debug_path).map_err(|e| ProviderError::io(&debug_path, e))?
            }
            None => {}
        }
        let removed = manifest.delete_unknown_files()?;
        if removed > 0 {
            tracing::debug!(removed, "removed stale staged files");
        }
        manifest.set_debug_build(self.settings.debug);
        manifest.set_revision(revision);
        manifest.try_save()?;
        Ok(())
    }

    fn cached_module(
        &self,
        plugin: &PluginDescriptor,
        manifest: &CacheManifest,
        revision: &str,
        status: ModuleStatus,
    ) -> ProducedModule {
        let debug_path = manifest.debug_path();
        let staged = manifest.assets().iter().any(|f| f.kind.is_package());
        ProducedModule {
            plugin: plugin.plugin.name.clone(),
            status,
            location: ModuleLocation::File {
                module: manifest.module_path(),
                debug: debug_path.is_file().then_some(debug_path),
            },
            revision: Some(revision.to_string()),
            asset_dir: plugin.requires_assets().then(|| manifest.asset_dir()),
            staged_dir: staged.then(|| manifest.lib_dir()),
        }
    }

    fn produce_local(
        &mut self,
        plugin: &PluginDescriptor,
        folder: &Path,
    ) -> Result<ProducedModule, ProviderError> {
        let name = plugin.plugin.name.as_str();
        let mut attempt = LoadAttempt::new(name);
        match self.build_local(plugin, folder, &mut attempt) {
            Ok(module) => {
                attempt.advance(LoadState::Success);
                attempt.advance(LoadState::Done);
                tracing::info!(plugin = name, folder = %folder.display(), "plugin compiled");
                Ok(module)
            }
            Err(err) => {
                attempt.advance(LoadState::Failure);
                tracing::error!(plugin = name, folder = %folder.display(), error = %err, "failed to build plugin");
                attempt.advance(LoadState::Reported);
                Err(err)
            }
        }
    }

    fn build_local(
        &mut self,
        plugin: &PluginDescriptor,
        folder: &Path,
        attempt: &mut LoadAttempt<'_>,
    ) -> Result<ProducedModule, ProviderError> {
        let name = plugin.plugin.name.as_str();
        if !folder.is_dir() {
            return Err(ProviderError::MissingFolder {
                path: folder.to_path_buf(),
            });
        }
        let mut session = self.toolchain.create(self.settings.debug)?;

        let mut staged_dir = None;
        if plugin.requires_packages() {
            let dir = self.local_packages_dir(folder);
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| ProviderError::io(&dir, e))?;
            }
            std::fs::create_dir_all(&dir).map_err(|e| ProviderError::io(&dir, e))?;
            let resolver = self.resolver(name)?;
            let mut packages = Vec::new();
            if let Some(config) = &plugin.packages.config {
                let path = folder.join(config);
                let mut file = std::fs::File::open(&path).map_err(|e| ProviderError::io(&path, e))?;
                packages.extend(resolver.download_for_config(&mut file)?);
            }
            if !plugin.packages.ids.is_empty() {
                packages.extend(resolver.download_packages(&inline_references(plugin)?, true)?);
            }
            copy_packages(&packages, &dir, session.as_mut())?;
            staged_dir = Some(dir);
        }

        let mut sources = 0;
        for file in folder_files(folder)? {
            if plugin.includes_source(&file.relative) {
                let mut reader =
                    std::fs::File::open(&file.path).map_err(|e| ProviderError::io(&file.path, e))?;
                session.load(&mut reader, &file.relative)?;
                sources += 1;
            }
        }

        attempt.advance(LoadState::Compiling);
        tracing::info!(plugin = name, sources, debug = self.settings.debug, "compiling plugin");
        let module = session
            .compile(name)?
            .map_err(|failures| ProviderError::Compile {
                plugin: name.to_string(),
                failures,
            })?;
        Ok(ProducedModule {
            plugin: name.to_string(),
            status: ModuleStatus::Compiled,
            location: ModuleLocation::Memory {
                image: module.image,
                debug: module.debug,
            },
            revision: None,
            asset_dir: plugin.asset_folder().map(|asset| folder.join(asset)),
            staged_dir,
        })
    }

    /// Per-folder package staging directory, keyed by the folder path.
    fn local_packages_dir(&self, folder: &Path) -> PathBuf {
        let absolute = std::path::absolute(folder).unwrap_or_else(|_| folder.to_path_buf());
        let key = ContentHash::from_bytes(absolute.to_string_lossy().as_bytes());
        self.settings
            .cache_root
            .join(LOCAL_PACKAGES_DIR)
            .join(format!("{:016x}", key.short()))
    }

    fn resolver(&self, plugin: &str) -> Result<&PackageResolver, ProviderError> {
        self.packages.as_ref().ok_or_else(|| ProviderError::NoRegistry {
            plugin: plugin.to_string(),
        })
    }
}

impl Drop for SourceProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Logs a failed attempt. The manifest is saved with no revision so the next
/// attempt rebuilds from scratch.
fn report(
    attempt: &mut LoadAttempt<'_>,
    manifest: &mut CacheManifest,
    repository: &str,
    revision: &str,
    err: ProviderError,
) -> ProviderError {
    attempt.advance(LoadState::Failure);
    manifest.clear_revision();
    manifest.save();
    if err.is_transient() {
        tracing::warn!(plugin = attempt.plugin(), %repository, %revision, error = %err, "plugin temporarily unavailable");
    } else {
        tracing::error!(plugin = attempt.plugin(), %repository, %revision, error = %err, "failed to build plugin");
    }
    attempt.advance(LoadState::Reported);
    err
}

fn inline_references(plugin: &PluginDescriptor) -> Result<Vec<PackageReference>, ProviderError> {
    plugin
        .packages
        .ids
        .iter()
        .map(|pin| {
            PackageReference::parse(&pin.id, &pin.version).map_err(|err| {
                ProviderError::InvalidPackage {
                    plugin: plugin.plugin.name.clone(),
                    source: PackageError::Invalid {
                        what: format!("version requirement `{}` for {}", pin.version, pin.id),
                        reason: err.to_string(),
                    },
                }
            })
        })
        .collect()
}

/// Stages package files into the cache. Libraries at the top of their
/// framework directory become compile dependencies.
fn stage_packages(
    packages: &[ResolvedPackage],
    manifest: &mut CacheManifest,
    session: &mut dyn CompilationSession,
) -> Result<(), ProviderError> {
    for package in packages {
        for lib in &package.libraries {
            let staged = manifest.stage_asset_from(&lib.relative, AssetKind::Lib, &lib.path)?;
            if !staged.path.contains('/') {
                session.add_dependency(&staged.full_path(manifest.cache_dir()));
            }
        }
        for content in &package.content {
            manifest.stage_asset_from(&content.relative, AssetKind::LibContent, &content.path)?;
        }
        tracing::debug!(package = %package.identity, files = package.files().count(), "package staged");
    }
    Ok(())
}

/// Copies package files into a local plugin's staging directory.
fn copy_packages(
    packages: &[ResolvedPackage],
    dir: &Path,
    session: &mut dyn CompilationSession,
) -> Result<(), ProviderError> {
    for package in packages {
        for file in package.files() {
            let target = file.relative.split('/').fold(dir.to_path_buf(), |p, c| p.join(c));
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ProviderError::io(parent, e))?;
            }
            std::fs::copy(&file.path, &target).map_err(|e| ProviderError::io(&target, e))?;
        }
        for lib in package.libraries.iter().filter(|lib| !lib.relative.contains('/')) {
            session.add_dependency(&dir.join(&lib.relative));
        }
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProviderError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ProviderError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_report_leaves_revision_unset() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = CacheManifest::new(dir.path());
        manifest.reset(Some("1.0.0"));
        manifest.set_revision("abc123");
        manifest.try_save().unwrap();

        let mut attempt = LoadAttempt::new("widget");
        let err = ProviderError::MissingFolder {
            path: dir.path().join("gone"),
        };
        let err = report(&mut attempt, &mut manifest, "acme/widget", "abc123", err);
        assert!(matches!(err, ProviderError::MissingFolder { .. }));
        assert_eq!(attempt.state(), Some(LoadState::Reported));

        let saved = CacheManifest::load(dir.path());
        assert_eq!(saved.revision(), None);
        assert_eq!(saved.target_version(), Some("1.0.0"));
    }
}
