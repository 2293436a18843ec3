//! The toolchain host and compilation sessions.
//!
//! A [`ToolchainFactory`] owns an isolated execution context holding the
//! compiler and its private [`ReferenceCatalog`](tinker_refs::ReferenceCatalog).
//! Two factories share the same contract:
//!
//! - [`ProcessToolchain`] runs the compiler in a worker process spoken to over
//!   the framed protocol in [`protocol`].
//! - [`InProcessToolchain`] keeps the catalog in the host process.
//!
//! Sessions created by either factory implement [`CompilationSession`].
//!
//! `init` must run before anything else touches the toolchain. Constructing a
//! `SourceProvider` does this.

#![warn(missing_docs)]

pub mod error;
pub mod in_process;
pub mod process;
pub mod protocol;
pub mod result;
pub mod session;
pub mod settings;
pub mod worker;

pub use error::ToolchainError;
pub use in_process::InProcessToolchain;
pub use process::ProcessToolchain;
pub use result::{CompilationResult, CompileFailure, CompileFailures, CompiledModule};
pub use session::{CompilationSession, LocalSession, SourceUnit};
pub use settings::ToolchainSettings;

/// Subcommand a worker executable serves the protocol under.
pub const WORKER_SUBCOMMAND: &str = "toolchain-worker";

/// Creates compilation sessions inside an isolated execution context.
pub trait ToolchainFactory {
    /// Creates the context and resolves the seed references. Idempotent.
    fn init(&mut self) -> Result<(), ToolchainError>;

    /// Creates a session living inside the context, initializing first if
    /// needed.
    fn create(&mut self, debug_build: bool) -> Result<Box<dyn CompilationSession>, ToolchainError>;

    /// Releases the context. Safe without a prior `init` and safe to repeat.
    fn dispose(&mut self);
}
