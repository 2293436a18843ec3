//! Package registries.
//!
//! Both registry kinds share one layout, keyed by the lowercased package id:
//!
//! ```text
//! <root>/<id>/index.json        published versions and their dependencies
//! <root>/<id>/<version>.tar.gz  package archive
//! ```

use std::path::PathBuf;
use std::time::Duration;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::identity::PackageIdentity;

/// One dependency of a published version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDependency {
    /// Package id.
    pub id: String,
    /// Acceptable versions.
    pub req: VersionReq,
}

/// One published version in a registry index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The version.
    pub version: Version,
    /// Its direct dependencies.
    #[serde(default)]
    pub dependencies: Vec<IndexDependency>,
}

/// Where packages are published.
pub trait PackageSource {
    /// Lists every published version of `id`.
    fn versions(&self, id: &str) -> Result<Vec<IndexEntry>, PackageError>;

    /// Downloads the archive of one version.
    fn fetch(&self, identity: &PackageIdentity) -> Result<Vec<u8>, PackageError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

fn parse_index(id: &str, bytes: &[u8]) -> Result<Vec<IndexEntry>, PackageError> {
    serde_json::from_slice(bytes).map_err(|e| PackageError::Invalid {
        what: format!("registry index for {id}"),
        reason: e.to_string(),
    })
}

fn archive_name(identity: &PackageIdentity) -> String {
    format!("{}.tar.gz", identity.version)
}

/// A registry laid out in a local directory.
#[derive(Clone, Debug)]
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    /// Creates a registry rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: PathBuf, id: &str, version: Option<&Version>) -> Result<Vec<u8>, PackageError> {
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PackageError::NotFound {
                    id: id.to_string(),
                    version: version.map(ToString::to_string),
                }
            } else {
                PackageError::io(path, e)
            }
        })
    }
}

impl PackageSource for LocalRegistry {
    fn versions(&self, id: &str) -> Result<Vec<IndexEntry>, PackageError> {
        let path = self
            .root
            .join(id.to_ascii_lowercase())
            .join("index.json");
        let bytes = self.read(path, id, None)?;
        parse_index(id, &bytes)
    }

    fn fetch(&self, identity: &PackageIdentity) -> Result<Vec<u8>, PackageError> {
        let path = self.root.join(identity.key()).join(archive_name(identity));
        self.read(path, &identity.id, Some(&identity.version))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// A registry served over HTTP.
#[derive(Debug)]
pub struct HttpRegistry {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    /// Creates a registry client for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PackageError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tinker/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PackageError::Network {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    fn get(&self, url: String, id: &str, version: Option<&Version>) -> Result<Vec<u8>, PackageError> {
        tracing::debug!(%url, "fetching from registry");
        let network = |reason: String| PackageError::Network {
            url: url.clone(),
            reason,
        };
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PackageError::NotFound {
                id: id.to_string(),
                version: version.map(ToString::to_string),
            });
        }
        if !status.is_success() {
            return Err(network(format!("server returned {status}")));
        }
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|e| network(e.to_string()))
    }
}

impl PackageSource for HttpRegistry {
    fn versions(&self, id: &str) -> Result<Vec<IndexEntry>, PackageError> {
        let url = format!("{}/{}/index.json", self.base_url, id.to_ascii_lowercase());
        let bytes = self.get(url, id, None)?;
        parse_index(id, &bytes)
    }

    fn fetch(&self, identity: &PackageIdentity) -> Result<Vec<u8>, PackageError> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            identity.key(),
            archive_name(identity)
        );
        self.get(url, &identity.id, Some(&identity.version))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
