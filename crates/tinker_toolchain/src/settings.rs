//! Settings shared by both toolchain flavors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a toolchain context is configured with at creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainSettings {
    /// Directories searched for reference modules.
    pub probe_dirs: Vec<PathBuf>,
    /// Seed references every session compiles against.
    pub references: Vec<String>,
    /// Warnings fail compilation.
    pub deny_warnings: bool,
}
