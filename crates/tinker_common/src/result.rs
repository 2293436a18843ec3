//! Common result and error types for the Tinker toolchain.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Tinker), not a
/// problem with plugin input. Plugin errors are reported as diagnostics or
/// through each crate's own error enum.
pub type TinkerResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Tinker, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal toolchain error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
