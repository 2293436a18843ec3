//! Error types for the toolchain host.

use tinker_module::ModuleError;
use tinker_refs::ResolutionError;

/// Errors raised by toolchain factories and sessions.
///
/// Compile diagnostics are not errors at this level; they arrive as
/// [`CompileFailures`](crate::CompileFailures) inside a successful call.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// The isolated context could not be created or stopped responding.
    #[error("toolchain isolation failed: {reason}")]
    Isolation {
        /// What went wrong.
        reason: String,
    },

    /// Seed references could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A source unit could not be loaded.
    #[error("cannot load source '{name}': {reason}")]
    Load {
        /// Display name of the unit.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// The compiled module could not be encoded.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The worker reported a failure.
    #[error("toolchain worker error: {message}")]
    Worker {
        /// Message sent by the worker.
        message: String,
    },

    /// A message did not fit the conversation.
    #[error("toolchain protocol error: {reason}")]
    Protocol {
        /// What was wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_display() {
        let err = ToolchainError::Isolation {
            reason: "worker exited".to_string(),
        };
        assert_eq!(err.to_string(), "toolchain isolation failed: worker exited");
    }

    #[test]
    fn resolution_is_transparent() {
        let err = ToolchainError::from(ResolutionError::Unresolved {
            names: vec!["host_core".to_string()],
        });
        assert_eq!(err.to_string(), "unresolved references: host_core");
    }
}
