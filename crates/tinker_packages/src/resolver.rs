//! Resolution plus installation.

use std::io::Read;

use crate::config::PackagesConfig;
use crate::error::PackageError;
use crate::identity::{is_host_provided, PackageReference};
use crate::resolve::{resolve_lowest, select_roots};
use crate::source::PackageSource;
use crate::store::{PackageStore, ResolvedPackage};

/// Resolves package declarations and installs them into a store.
pub struct PackageResolver {
    source: Box<dyn PackageSource>,
    store: PackageStore,
    framework: String,
}

impl PackageResolver {
    /// Creates a resolver installing library files for `framework`.
    pub fn new(
        source: Box<dyn PackageSource>,
        store: PackageStore,
        framework: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            framework: framework.into(),
        }
    }

    /// Returns the package store.
    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    /// Returns the default target framework.
    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Installs exactly the packages pinned by a `packages.toml`.
    pub fn download_for_config(
        &self,
        config: &mut dyn Read,
    ) -> Result<Vec<ResolvedPackage>, PackageError> {
        let config = PackagesConfig::from_reader(config)?;
        tracing::info!(packages = config.package.len(), "installing packages from lock file");
        let mut installed = Vec::new();
        for entry in &config.package {
            if is_host_provided(&entry.id) {
                tracing::info!(package = %entry.id, "package is provided by the host");
                continue;
            }
            let identity = entry.identity()?;
            installed.push(self.store.install(
                self.source.as_ref(),
                &identity,
                entry.framework(&self.framework),
            )?);
        }
        Ok(installed)
    }

    /// Installs `refs`, with their transitive dependencies when
    /// `resolve_dependencies` is set.
    pub fn download_packages(
        &self,
        refs: &[PackageReference],
        resolve_dependencies: bool,
    ) -> Result<Vec<ResolvedPackage>, PackageError> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(
            packages = refs.len(),
            resolve_dependencies,
            "installing packages"
        );
        let identities = if resolve_dependencies {
            resolve_lowest(self.source.as_ref(), refs)?
        } else {
            select_roots(self.source.as_ref(), refs)?
        };
        identities
            .iter()
            .map(|identity| {
                self.store
                    .install(self.source.as_ref(), identity, &self.framework)
            })
            .collect()
    }
}
