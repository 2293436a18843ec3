//! Package resolution and the local package store.
//!
//! Packages come from a [`PackageSource`] (a registry directory or an HTTP
//! registry with the same layout), are resolved with the lowest-version
//! policy and are unpacked into a [`PackageStore`] keyed by id and version.
//! [`PackageResolver`] ties these together.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod identity;
pub mod resolve;
pub mod resolver;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PackageConfigEntry, PackagesConfig, PACKAGES_CONFIG_FILE};
pub use error::PackageError;
pub use identity::{is_host_provided, PackageIdentity, PackageReference, HOST_PROVIDED_PACKAGES};
pub use resolve::resolve_lowest;
pub use resolver::PackageResolver;
pub use source::{HttpRegistry, IndexDependency, IndexEntry, LocalRegistry, PackageSource};
pub use store::{PackageFile, PackageStore, ResolvedPackage, ANY_FRAMEWORK};
