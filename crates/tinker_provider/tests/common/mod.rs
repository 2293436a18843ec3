//! Shared fixtures for provider tests.

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use tinker_config::{load_plugin_descriptor_from_str, PluginDescriptor};
use tinker_module::{ModuleImage, Visibility};
use tinker_packages::{LocalRegistry, PackageResolver, PackageStore};
use tinker_provider::{MirrorArchiveFetcher, ProviderSettings, SourceProvider};
use tinker_toolchain::{
    CompilationResult, CompilationSession, InProcessToolchain, ToolchainError, ToolchainFactory,
    ToolchainSettings,
};

/// Builds a gzipped tarball. Every entry is placed below `root/` when given.
pub fn tarball(root: Option<&str>, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        let path = match root {
            Some(root) => format!("{root}/{path}"),
            None => path.to_string(),
        };
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A toolchain that counts compiler invocations.
pub struct CountingToolchain {
    inner: InProcessToolchain,
    compiles: Arc<AtomicUsize>,
}

struct CountingSession {
    inner: Box<dyn CompilationSession>,
    compiles: Arc<AtomicUsize>,
}

impl ToolchainFactory for CountingToolchain {
    fn init(&mut self) -> Result<(), ToolchainError> {
        self.inner.init()
    }

    fn create(&mut self, debug_build: bool) -> Result<Box<dyn CompilationSession>, ToolchainError> {
        Ok(Box::new(CountingSession {
            inner: self.inner.create(debug_build)?,
            compiles: self.compiles.clone(),
        }))
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }
}

impl CompilationSession for CountingSession {
    fn load(&mut self, source: &mut dyn Read, name: &str) -> Result<(), ToolchainError> {
        self.inner.load(source, name)
    }

    fn add_dependency(&mut self, path: &Path) {
        self.inner.add_dependency(path);
    }

    fn compile(&mut self, output_name: &str) -> Result<CompilationResult, ToolchainError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(output_name)
    }
}

/// Temporary directories for one provider.
pub struct Fixture {
    pub dir: TempDir,
    pub compiles: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("refs");
        std::fs::create_dir_all(&probe).unwrap();
        ModuleImage::new("host_core")
            .with_export("log", 1, Visibility::Public)
            .write_file(&probe.join("host_core.tkm"))
            .unwrap();
        Self {
            dir,
            compiles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn mirror(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn registry(&self) -> PathBuf {
        self.dir.path().join("registry")
    }

    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn toolchain_settings(&self) -> ToolchainSettings {
        ToolchainSettings {
            probe_dirs: vec![self.dir.path().join("refs")],
            references: vec!["host_core".to_string()],
            deny_warnings: false,
        }
    }

    pub fn provider(&self, debug: bool) -> SourceProvider {
        let toolchain = CountingToolchain {
            inner: InProcessToolchain::new(self.toolchain_settings()),
            compiles: self.compiles.clone(),
        };
        let packages = PackageResolver::new(
            Box::new(LocalRegistry::new(self.registry())),
            PackageStore::new(self.dir.path().join("store")),
            "tk1",
        );
        SourceProvider::new(
            ProviderSettings {
                cache_root: self.cache_root(),
                target_version: Some("1.0.0".to_string()),
                debug,
            },
            Box::new(toolchain),
            Box::new(MirrorArchiveFetcher::new(self.mirror())),
            Some(packages),
        )
        .unwrap()
    }

    /// Publishes a source archive for `repository` at `revision`.
    pub fn publish_source(&self, repository: &str, revision: &str, files: &[(&str, &str)]) {
        let files: Vec<(&str, &[u8])> = files.iter().map(|(p, t)| (*p, t.as_bytes())).collect();
        let repo_name = repository.rsplit('/').next().unwrap();
        let path = MirrorArchiveFetcher::new(self.mirror()).archive_path(repository, revision);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, tarball(Some(&format!("{repo_name}-{revision}")), &files)).unwrap();
    }

    /// Publishes a package version with no dependencies.
    pub fn publish_package(&self, id: &str, version: &str, files: &[(&str, &[u8])]) {
        let dir = self.registry().join(id);
        std::fs::create_dir_all(&dir).unwrap();
        let index = dir.join("index.json");
        let mut entries: Vec<serde_json::Value> = std::fs::read(&index)
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
            .unwrap_or_default();
        entries.push(serde_json::json!({ "version": version, "dependencies": [] }));
        std::fs::write(&index, serde_json::to_vec(&entries).unwrap()).unwrap();
        std::fs::write(dir.join(format!("{version}.tar.gz")), tarball(None, files)).unwrap();
    }
}

pub fn descriptor(text: &str) -> PluginDescriptor {
    load_plugin_descriptor_from_str(text).unwrap()
}

pub const WIDGET: &str = r#"
[plugin]
name = "widget"
repository = "acme/widget"
revision = "abc123"
source_directories = ["src"]
asset_folder = "assets"

[[versions]]
name = "Next"
revision = "def456"
"#;

pub fn widget_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("src/main.tks", "use host_core::log;\npub fn on_load() { log(1); }"),
        ("src/util.tks", "pub fn helper() { return 2; }"),
        ("src/ui/panel.tks", "pub fn panel() { return 3; }"),
        ("tests/smoke.tks", "pub fn smoke() { return 4; }"),
        ("assets/icon.txt", "icon"),
        ("README.md", "# widget"),
    ]
}
