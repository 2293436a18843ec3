//! Error types for module image encoding and decoding.

use std::path::PathBuf;

/// Errors that can occur while reading or writing module images and debug data.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// An I/O error occurred while reading or writing a module file.
    #[error("module I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The container header is missing, truncated, or carries the wrong magic.
    #[error("invalid module header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the body.
    #[error("checksum mismatch in module '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Module name from the header.
        name: String,
        /// The checksum recorded in the header.
        expected: String,
        /// The checksum computed from the body.
        actual: String,
    },

    /// The module was written with a different format version.
    #[error("module '{name}' has format version {actual}, expected {expected}")]
    VersionMismatch {
        /// Module name from the header.
        name: String,
        /// The format version this build understands.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("module serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
