//! The in-tree `packages.toml` lock file.
//!
//! ```toml
//! [[package]]
//! id = "json"
//! version = "1.2.0"
//! target-framework = "tk1"
//! ```
//!
//! Every entry pins one exact version. Entries are installed as listed and
//! never expanded.

use std::io::Read;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::identity::PackageIdentity;
use crate::store::{read_all, ANY_FRAMEWORK};

/// Conventional file name of the lock file inside a source tree.
pub const PACKAGES_CONFIG_FILE: &str = "packages.toml";

/// One pinned package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageConfigEntry {
    /// Package id.
    pub id: String,
    /// Exact version.
    pub version: String,
    /// Framework whose library files to use.
    #[serde(default)]
    pub target_framework: Option<String>,
}

impl PackageConfigEntry {
    /// Parses the pinned identity.
    pub fn identity(&self) -> Result<PackageIdentity, PackageError> {
        let version = Version::parse(&self.version).map_err(|e| PackageError::Invalid {
            what: format!("version of {} in {PACKAGES_CONFIG_FILE}", self.id),
            reason: e.to_string(),
        })?;
        Ok(PackageIdentity::new(self.id.clone(), version))
    }

    /// The framework to install for, `default` when unset or `any`.
    pub fn framework<'a>(&'a self, default: &'a str) -> &'a str {
        match self.target_framework.as_deref() {
            Some(fw) if !fw.is_empty() && !fw.eq_ignore_ascii_case(ANY_FRAMEWORK) => fw,
            _ => default,
        }
    }
}

/// Parsed `packages.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Pinned packages in file order.
    #[serde(default)]
    pub package: Vec<PackageConfigEntry>,
}

impl PackagesConfig {
    /// Parses a lock file from text.
    pub fn parse(text: &str) -> Result<Self, PackageError> {
        toml::from_str(text).map_err(|e| PackageError::Invalid {
            what: PACKAGES_CONFIG_FILE.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads and parses a lock file.
    pub fn from_reader(reader: &mut dyn Read) -> Result<Self, PackageError> {
        let bytes = read_all(reader, PACKAGES_CONFIG_FILE)?;
        let text = String::from_utf8(bytes).map_err(|_| PackageError::Invalid {
            what: PACKAGES_CONFIG_FILE.to_string(),
            reason: "not valid UTF-8".to_string(),
        })?;
        Self::parse(&text)
    }
}
