//! Error types for module production.

use std::path::PathBuf;

use tinker_cache::CacheError;
use tinker_packages::PackageError;
use tinker_toolchain::{CompileFailures, ToolchainError};

/// Errors raised while fetching a source archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The archive host could not be reached.
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// What was being fetched.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// No archive exists for this repository and revision.
    #[error("no archive for {repository} at {revision}")]
    NotFound {
        /// Repository identity.
        repository: String,
        /// Requested revision.
        revision: String,
    },

    /// Reading a mirrored archive failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The archive is not a readable gzipped tarball.
    #[error("malformed source archive: {reason}")]
    Archive {
        /// What went wrong.
        reason: String,
    },

    /// A URL template lacks a placeholder.
    #[error("archive URL template `{template}` must contain {{repository}} and {{revision}}")]
    Template {
        /// The offending template.
        template: String,
    },
}

/// Errors raised while producing a plugin module.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A network fetch failed. The plugin is transiently unavailable.
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// What was being fetched.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The source archive could not be obtained.
    #[error(transparent)]
    Fetch(FetchError),

    /// Package resolution or installation failed.
    #[error(transparent)]
    Packages(PackageError),

    /// The toolchain failed outside of compilation proper.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// The plugin's sources did not compile.
    #[error("plugin {plugin}: {failures}")]
    Compile {
        /// Plugin name.
        plugin: String,
        /// Every error diagnostic.
        failures: CompileFailures,
    },

    /// The cache directory could not be prepared.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Filesystem failure outside the cache manifest.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A local plugin folder does not exist.
    #[error("plugin folder {path} does not exist")]
    MissingFolder {
        /// The folder.
        path: PathBuf,
    },

    /// A plugin declares packages but no registry is configured.
    #[error("plugin {plugin} declares packages but no package registry is configured")]
    NoRegistry {
        /// Plugin name.
        plugin: String,
    },

    /// An inline package requirement is malformed.
    #[error("plugin {plugin}: {source}")]
    InvalidPackage {
        /// Plugin name.
        plugin: String,
        /// Parse failure.
        source: PackageError,
    },
}

impl ProviderError {
    /// Returns `true` if the failure may clear up without any change to the
    /// plugin, so the caller should not invalidate anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProviderError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<FetchError> for ProviderError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network { url, reason } => ProviderError::Network { url, reason },
            other => ProviderError::Fetch(other),
        }
    }
}

impl From<PackageError> for ProviderError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Network { url, reason } => ProviderError::Network { url, reason },
            other => ProviderError::Packages(other),
        }
    }
}
