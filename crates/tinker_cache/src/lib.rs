//! Per-origin artifact cache.
//!
//! Each source origin gets a directory holding the compiled module, its debug
//! data, a `manifest.json` and the files staged next to the module:
//!
//! ```text
//! <root>/remote/<owner>/<repo>/
//!     plugin.tkm
//!     plugin.tkd
//!     manifest.json
//!     Assets/...
//!     Bin/...
//! ```
//!
//! The [`CacheManifest`] decides whether the module can be reused.

#![warn(missing_docs)]

pub mod asset;
pub mod error;
pub mod manifest;
pub mod origin;

pub use asset::{AssetFile, AssetKind, ASSET_DIR, LIB_DIR};
pub use error::CacheError;
pub use manifest::{CacheManifest, LEGACY_REVISION_FILE, MANIFEST_FILE, MODULE_STEM};
pub use origin::{origin_cache_dir, REMOTE_DIR};
