//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Most cache operations are fail-safe: a manifest that cannot be read is
/// a cache miss, and a manifest that cannot be written is logged.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A staged path would escape its directory.
    #[error("invalid staged path '{path}'")]
    InvalidPath {
        /// The offending relative path.
        path: String,
    },

    /// An origin is not of the form `owner/name`.
    #[error("invalid origin '{origin}'")]
    InvalidOrigin {
        /// The offending origin.
        origin: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
