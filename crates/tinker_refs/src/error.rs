//! Error types for reference resolution.

/// Errors raised while resolving the seed references of a catalog.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// One or more seed references could not be located or read.
    #[error("unresolved references: {}", names.join(", "))]
    Unresolved {
        /// Every seed name that failed, in request order.
        names: Vec<String>,
    },
}
