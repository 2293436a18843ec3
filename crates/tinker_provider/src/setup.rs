//! Building a provider from the host configuration.

use std::path::Path;

use tinker_config::{is_url, HostConfig, Isolation};
use tinker_packages::{HttpRegistry, LocalRegistry, PackageResolver, PackageSource, PackageStore};
use tinker_toolchain::{InProcessToolchain, ProcessToolchain, ToolchainFactory, ToolchainSettings};

use crate::error::ProviderError;
use crate::fetch::{ArchiveFetcher, HttpArchiveFetcher, MirrorArchiveFetcher, DEFAULT_URL_TEMPLATE};
use crate::provider::{ProviderSettings, SourceProvider};

/// Creates a provider as `config` describes.
///
/// `default_worker` serves the toolchain protocol when process isolation is
/// selected and the configuration names no worker executable.
pub fn provider_from_config(
    config: &HostConfig,
    default_worker: &Path,
) -> Result<SourceProvider, ProviderError> {
    let settings = ToolchainSettings {
        probe_dirs: config.toolchain.probe_dirs.clone(),
        references: config.toolchain.references.clone(),
        deny_warnings: config.toolchain.deny_warnings,
    };
    let toolchain: Box<dyn ToolchainFactory> = match config.toolchain.isolation {
        Isolation::Process => {
            let worker = config
                .toolchain
                .worker
                .clone()
                .unwrap_or_else(|| default_worker.to_path_buf());
            tracing::debug!(worker = %worker.display(), "using process isolation");
            Box::new(ProcessToolchain::new(settings, worker))
        }
        Isolation::InProcess => Box::new(InProcessToolchain::new(settings)),
    };

    let fetcher: Box<dyn ArchiveFetcher> = match &config.sources.mirror {
        Some(mirror) => Box::new(MirrorArchiveFetcher::new(mirror)),
        None => Box::new(HttpArchiveFetcher::new(
            config
                .sources
                .url_template
                .as_deref()
                .unwrap_or(DEFAULT_URL_TEMPLATE),
        )?),
    };

    let packages = match &config.packages.registry {
        Some(location) => {
            let source: Box<dyn PackageSource> = if is_url(location) {
                Box::new(HttpRegistry::new(location.as_str())?)
            } else {
                Box::new(LocalRegistry::new(location))
            };
            Some(PackageResolver::new(
                source,
                PackageStore::new(config.package_store()),
                config.packages.framework.as_str(),
            ))
        }
        None => None,
    };

    SourceProvider::new(
        ProviderSettings {
            cache_root: config.cache_root(),
            target_version: Some(config.host.version.clone()),
            debug: config.toolchain.debug,
        },
        toolchain,
        fetcher,
        packages,
    )
}
