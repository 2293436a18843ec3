//! Shared foundational types used across the Tinker plugin toolchain.
//!
//! This crate provides interned identifiers, content hashing for cache
//! integrity checks, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use result::{InternalError, TinkerResult};
