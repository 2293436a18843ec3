//! Registry fixtures for tests.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::source::{IndexDependency, IndexEntry};

/// Builds a gzipped tarball from `(path, contents)` pairs.
pub(crate) fn package_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Writes packages into a local registry directory.
pub(crate) struct RegistryBuilder {
    root: PathBuf,
}

impl RegistryBuilder {
    pub(crate) fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub(crate) fn publish(
        &self,
        id: &str,
        version: &str,
        dependencies: &[(&str, &str)],
        files: &[(&str, &str)],
    ) -> &Self {
        let dir = self.root.join(id.to_ascii_lowercase());
        std::fs::create_dir_all(&dir).unwrap();
        let index_path = dir.join("index.json");
        let mut index: Vec<IndexEntry> = std::fs::read(&index_path)
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
            .unwrap_or_default();
        index.push(IndexEntry {
            version: version.parse().unwrap(),
            dependencies: dependencies
                .iter()
                .map(|(id, req)| IndexDependency {
                    id: id.to_string(),
                    req: req.parse().unwrap(),
                })
                .collect(),
        });
        std::fs::write(&index_path, serde_json::to_vec_pretty(&index).unwrap()).unwrap();
        std::fs::write(
            dir.join(format!("{version}.tar.gz")),
            package_archive(files),
        )
        .unwrap();
        self
    }
}
