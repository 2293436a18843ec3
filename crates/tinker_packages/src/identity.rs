//! Package identities and references.

use semver::{Version, VersionReq};
use std::fmt;

/// Packages the host already ships; never fetched or expanded.
pub const HOST_PROVIDED_PACKAGES: &[&str] = &["tinker.runtime", "tinker.host"];

/// Returns `true` if `id` names a host-provided package.
pub fn is_host_provided(id: &str) -> bool {
    HOST_PROVIDED_PACKAGES
        .iter()
        .any(|provided| provided.eq_ignore_ascii_case(id))
}

/// A package at one exact version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdentity {
    /// Package id as declared.
    pub id: String,
    /// Exact version.
    pub version: Version,
}

impl PackageIdentity {
    /// Creates an identity.
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Case-folded id used for store paths and lookups.
    pub fn key(&self) -> String {
        self.id.to_ascii_lowercase()
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A package with a version constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageReference {
    /// Package id.
    pub id: String,
    /// Acceptable versions.
    pub req: VersionReq,
}

impl PackageReference {
    /// Creates a reference.
    pub fn new(id: impl Into<String>, req: VersionReq) -> Self {
        Self { id: id.into(), req }
    }

    /// Parses a reference from an id and a constraint string.
    pub fn parse(id: &str, req: &str) -> Result<Self, semver::Error> {
        Ok(Self::new(id, VersionReq::parse(req)?))
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.req)
    }
}
