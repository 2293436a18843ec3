//! Error types for package resolution.

use std::path::PathBuf;

/// Errors raised while resolving, fetching or unpacking packages.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Filesystem failure in the store or a local registry.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The registry has no such package or version.
    #[error("package {id}{} not found", .version.as_ref().map(|v| format!(" {v}")).unwrap_or_default())]
    NotFound {
        /// Package id.
        id: String,
        /// Requested version, if any.
        version: Option<String>,
    },

    /// No set of versions satisfies every constraint.
    #[error("cannot resolve package dependencies: {reason}")]
    Resolution {
        /// Which constraints could not be met.
        reason: String,
    },

    /// The resolved dependency graph contains a cycle.
    #[error("package dependency cycle: {}", .members.join(" -> "))]
    Cycle {
        /// Packages on the cycle.
        members: Vec<String>,
    },

    /// The registry could not be reached.
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// What was being fetched.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// A registry index or package config is malformed.
    #[error("invalid {what}: {reason}")]
    Invalid {
        /// What was being read.
        what: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A package archive could not be unpacked.
    #[error("cannot unpack {id} {version}: {reason}")]
    Archive {
        /// Package id.
        id: String,
        /// Package version.
        version: String,
        /// What went wrong.
        reason: String,
    },
}

impl PackageError {
    /// Returns `true` for failures that may succeed on retry.
    pub fn is_network(&self) -> bool {
        matches!(self, PackageError::Network { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            path: path.into(),
            source,
        }
    }
}
