//! Source archive fetching.
//!
//! A plugin's remote source tree arrives as a gzipped tarball whose entries
//! all sit below one top-level directory (`<repo>-<revision>/`). That first
//! component is stripped before any path is matched against a descriptor.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use flate2::read::GzDecoder;

use crate::error::FetchError;

/// Archive host used when no template is configured.
pub const DEFAULT_URL_TEMPLATE: &str = "https://codeload.github.com/{repository}/tar.gz/{revision}";

/// Obtains the source archive of a repository at a revision.
pub trait ArchiveFetcher {
    /// Returns the raw `.tar.gz` bytes.
    fn fetch(&self, repository: &str, revision: &str) -> Result<Vec<u8>, FetchError>;
}

/// Downloads archives from a URL template.
#[derive(Debug)]
pub struct HttpArchiveFetcher {
    template: String,
    client: reqwest::blocking::Client,
}

impl HttpArchiveFetcher {
    /// Creates a fetcher for `template`, which must contain `{repository}` and
    /// `{revision}`.
    pub fn new(template: impl Into<String>) -> Result<Self, FetchError> {
        let template = template.into();
        if !template.contains("{repository}") || !template.contains("{revision}") {
            return Err(FetchError::Template { template });
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tinker/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network {
                url: template.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { template, client })
    }

    /// Fills in the template.
    pub fn url(&self, repository: &str, revision: &str) -> String {
        self.template
            .replace("{repository}", repository)
            .replace("{revision}", revision)
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, repository: &str, revision: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url(repository, revision);
        tracing::info!(%url, "downloading source archive");
        let network = |reason: String| FetchError::Network {
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
            return Err(FetchError::NotFound {
                repository: repository.to_string(),
                revision: revision.to_string(),
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

/// Reads archives from a directory laid out as
/// `<root>/<owner>/<repo>/<revision>.tar.gz`.
#[derive(Debug, Clone)]
pub struct MirrorArchiveFetcher {
    root: PathBuf,
}

impl MirrorArchiveFetcher {
    /// Creates a fetcher reading below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the archive for `repository` at `revision` is expected.
    pub fn archive_path(&self, repository: &str, revision: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in repository.split('/') {
            path.push(part);
        }
        path.push(format!("{revision}.tar.gz"));
        path
    }
}

impl ArchiveFetcher for MirrorArchiveFetcher {
    fn fetch(&self, repository: &str, revision: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.archive_path(repository, revision);
        tracing::debug!(path = %path.display(), "reading mirrored source archive");
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound {
                    repository: repository.to_string(),
                    revision: revision.to_string(),
                }
            } else {
                FetchError::Io { path, source: e }
            }
        })
    }
}

/// A regular file from a source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    /// Path with the top-level directory stripped, `/`-separated.
    pub path: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// Lists the regular files of a gzipped tarball in archive order.
///
/// The first path component of every entry is dropped; entries that are only
/// that component are skipped.
pub fn archive_files(bytes: &[u8]) -> Result<Vec<ArchiveFile>, FetchError> {
    let malformed = |e: std::io::Error| FetchError::Archive {
        reason: e.to_string(),
    };
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut files = Vec::new();
    for entry in archive.entries().map_err(malformed)? {
        let mut entry = entry.map_err(malformed)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().map_err(malformed)?;
        let parts: Vec<String> = path
            .components()
            .skip(1)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            continue;
        }
        let path = parts.join("/");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(malformed)?;
        files.push(ArchiveFile { path, data });
    }
    Ok(files)
}

#[cfg(test)]
pub(crate) mod testing {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Builds a gzipped tarball with every file below `root/`.
    pub(crate) fn source_archive(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, text) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(text.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{root}/{path}"), text.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::source_archive;
    use super::*;

    #[test]
    fn strips_top_level_directory() {
        let bytes = source_archive(
            "widget-abc123",
            &[("src/main.tks", "pub fn f() { }"), ("README.md", "hi")],
        );
        let files = archive_files(&bytes).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.tks", "README.md"]);
        assert_eq!(files[1].data, b"hi");
    }

    #[test]
    fn garbage_is_an_archive_error() {
        assert!(matches!(
            archive_files(b"definitely not gzip"),
            Err(FetchError::Archive { .. })
        ));
    }

    #[test]
    fn mirror_reads_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MirrorArchiveFetcher::new(dir.path());
        let path = fetcher.archive_path("acme/widget", "abc123");
        assert_eq!(path, dir.path().join("acme").join("widget").join("abc123.tar.gz"));

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"bytes").unwrap();
        assert_eq!(fetcher.fetch("acme/widget", "abc123").unwrap(), b"bytes");
        assert!(matches!(
            fetcher.fetch("acme/widget", "def456"),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn template_is_filled() {
        let fetcher = HttpArchiveFetcher::new(DEFAULT_URL_TEMPLATE).unwrap();
        assert_eq!(
            fetcher.url("acme/widget", "abc123"),
            "https://codeload.github.com/acme/widget/tar.gz/abc123"
        );
        assert!(matches!(
            HttpArchiveFetcher::new("https://example.com/{repository}.tar.gz"),
            Err(FetchError::Template { .. })
        ));
    }

    #[test]
    fn unreachable_host_is_a_network_error() {
        let fetcher = HttpArchiveFetcher::new("http://127.0.0.1:1/{repository}/{revision}.tar.gz").unwrap();
        assert!(matches!(
            fetcher.fetch("acme/widget", "abc123"),
            Err(FetchError::Network { .. })
        ));
    }
}
