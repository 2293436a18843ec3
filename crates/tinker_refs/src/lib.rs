//! The reference catalog: host modules plugins are compiled against.
//!
//! A reference named `N` is the module file `<probe>/N.tkm` in the first probe
//! directory that has one. Resolving a set of seed names pulls in their
//! dependencies transitively, as listed in each module's header.

#![warn(missing_docs)]

pub mod catalog;
pub mod error;

pub use catalog::{ReferenceCatalog, ReferenceEntry, REFERENCE_DENYLIST};
pub use error::ResolutionError;
