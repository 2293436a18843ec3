//! Producing plugin modules from source, with a per-origin artifact cache.
//!
//! [`SourceProvider`] is the entry point. For a remote plugin it consults the
//! origin's cache manifest and either returns the cached module or fetches the
//! source archive, routes its files to the compiler, the asset stage and the
//! package resolver, compiles, and records the result. Local folder plugins
//! are compiled on every load.

#![warn(missing_docs)]

pub mod error;
pub mod fetch;
pub mod local;
pub mod maintenance;
pub mod provider;
pub mod setup;
pub mod state;

pub use error::{FetchError, ProviderError};
pub use fetch::{
    archive_files, ArchiveFetcher, ArchiveFile, HttpArchiveFetcher, MirrorArchiveFetcher,
    DEFAULT_URL_TEMPLATE,
};
pub use local::{folder_files, FolderFile};
pub use provider::{
    ModuleLocation, ModuleStatus, ProducedModule, ProviderSettings, SourceProvider,
    LOCAL_PACKAGES_DIR,
};
pub use setup::provider_from_config;
pub use state::LoadState;
