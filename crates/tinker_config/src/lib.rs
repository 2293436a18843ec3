//! Parsing and validation of Tinker configuration files.
//!
//! Two files are understood: the host's `tinker.toml`, which configures the
//! toolchain, package registry and archive sources, and each plugin's
//! `plugin.toml` descriptor, which names where the plugin's source lives and
//! which parts of that source tree are compiled, staged or resolved.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{
    load_host_config, load_host_config_from_str, load_plugin_descriptor,
    load_plugin_descriptor_from_str, HOST_CONFIG_FILE, PLUGIN_DESCRIPTOR_FILE,
};
pub use resolve::{resolve_source, ResolvedSource};
pub use types::*;
