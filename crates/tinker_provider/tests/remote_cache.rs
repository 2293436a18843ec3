mod common;

use common::{descriptor, widget_sources, Fixture, WIDGET};
use tinker_cache::CacheManifest;
use tinker_module::{DebugInfo, ModuleImage};
use tinker_provider::{ModuleLocation, ModuleStatus, ProviderError};

fn module_file(location: &ModuleLocation) -> &std::path::Path {
    match location {
        ModuleLocation::File { module, .. } => module,
        other => panic!("expected a cached file, got {other:?}"),
    }
}

#[test]
fn compiles_once_then_serves_from_cache() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let plugin = descriptor(WIDGET);
    let mut provider = fx.provider(true);

    let first = provider.produce_module(&plugin).unwrap();
    assert_eq!(first.status, ModuleStatus::Compiled);
    assert_eq!(fx.compiles(), 1);

    let cache_dir = fx.cache_root().join("remote").join("acme").join("widget");
    let path = module_file(&first.location);
    assert_eq!(path, cache_dir.join("plugin.tkm"));
    assert_eq!(ModuleImage::read_file(path).unwrap().name, "widget");

    let debug = DebugInfo::read_file(&cache_dir.join("plugin.tkd")).unwrap();
    let mut units: Vec<&str> = debug.units.iter().map(|u| u.name.as_str()).collect();
    units.sort();
    assert_eq!(units, vec!["src/main.tks", "src/ui/panel.tks", "src/util.tks"]);

    assert_eq!(
        std::fs::read_to_string(cache_dir.join("Assets").join("icon.txt")).unwrap(),
        "icon"
    );
    assert_eq!(first.asset_dir.as_deref(), Some(cache_dir.join("Assets").as_path()));
    let manifest = CacheManifest::load(&cache_dir);
    assert_eq!(manifest.revision(), Some("abc123"));
    assert_eq!(manifest.target_version(), Some("1.0.0"));
    assert_eq!(manifest.assets().len(), 1);

    let second = provider.produce_module(&plugin).unwrap();
    assert_eq!(second.status, ModuleStatus::Cached);
    assert_eq!(fx.compiles(), 1);
    assert_eq!(second.image_bytes().unwrap(), first.image_bytes().unwrap());
}

#[test]
fn new_revision_recompiles_and_overwrites_manifest() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let mut next = widget_sources();
    next[1] = ("src/util.tks", "pub fn helper() { return 20; }");
    next.push(("assets/logo.txt", "logo"));
    fx.publish_source("acme/widget", "def456", &next);
    let mut provider = fx.provider(false);

    provider.produce_module(&descriptor(WIDGET)).unwrap();
    let moved = WIDGET.replace("revision = \"abc123\"", "revision = \"def456\"");
    let third = provider.produce_module(&descriptor(&moved)).unwrap();
    assert_eq!(third.status, ModuleStatus::Compiled);
    assert_eq!(third.revision.as_deref(), Some("def456"));
    assert_eq!(fx.compiles(), 2);

    let cache_dir = fx.cache_root().join("remote/acme/widget");
    let manifest = CacheManifest::load(&cache_dir);
    assert_eq!(manifest.revision(), Some("def456"));
    assert_eq!(manifest.assets().len(), 2);
    assert!(!cache_dir.join("plugin.tkd").exists());
}

#[test]
fn selected_version_overrides_default_revision() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "def456", &widget_sources());
    let plugin = descriptor(WIDGET);
    let mut provider = fx.provider(false);

    let produced = provider.produce_version(&plugin, Some("NEXT")).unwrap();
    assert_eq!(produced.revision.as_deref(), Some("def456"));

    // Unknown names fall back to abc123, which is not published.
    let err = provider.produce_version(&plugin, Some("beta")).unwrap_err();
    assert!(matches!(err, ProviderError::Fetch(_)));
}

#[test]
fn syntax_error_names_file_and_line() {
    let fx = Fixture::new();
    fx.publish_source(
        "acme/widget",
        "abc123",
        &[
            ("src/main.tks", "pub fn ok() { }"),
            ("src/bad.tks", "pub fn f() {\n  let x = 1\n  return x;\n}"),
        ],
    );
    let plugin = descriptor(
        r#"
[plugin]
name = "widget"
repository = "acme/widget"
revision = "abc123"
"#,
    );
    let mut provider = fx.provider(false);

    let err = provider.produce_module(&plugin).unwrap_err();
    let ProviderError::Compile { plugin: name, failures } = &err else {
        panic!("expected a compile failure, got {err}");
    };
    assert_eq!(name, "widget");
    assert!(failures.iter().all(|f| f.file == "src/bad.tks"));
    let first = failures.iter().next().unwrap();
    assert_eq!((first.line, first.column), (2, 12));
    assert!(!err.is_transient());

    let manifest = CacheManifest::load(&fx.cache_root().join("remote/acme/widget"));
    assert_eq!(manifest.revision(), None);

    // A failed build is retried in full on the next attempt.
    provider.produce_module(&plugin).unwrap_err();
    assert_eq!(fx.compiles(), 2);
}

#[test]
fn tampered_asset_forces_recompile() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let plugin = descriptor(WIDGET);
    let mut provider = fx.provider(false);
    provider.produce_module(&plugin).unwrap();

    let icon = fx.cache_root().join("remote/acme/widget/Assets/icon.txt");
    std::fs::write(&icon, "a different icon").unwrap();
    let again = provider.produce_module(&plugin).unwrap();
    assert_eq!(again.status, ModuleStatus::Compiled);
    assert_eq!(std::fs::read_to_string(&icon).unwrap(), "icon");
    assert_eq!(fx.compiles(), 2);
}

#[test]
fn cache_hit_removes_unknown_files() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let plugin = descriptor(WIDGET);
    let mut provider = fx.provider(false);
    provider.produce_module(&plugin).unwrap();

    let stray = fx.cache_root().join("remote/acme/widget/Assets/old/stray.txt");
    std::fs::create_dir_all(stray.parent().unwrap()).unwrap();
    std::fs::write(&stray, "left behind").unwrap();

    let hit = provider.produce_module(&plugin).unwrap();
    assert_eq!(hit.status, ModuleStatus::Cached);
    assert!(!stray.exists());
    assert!(!stray.parent().unwrap().exists());
}

#[test]
fn invalidate_and_clear_force_rebuilds() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let plugin = descriptor(WIDGET);
    let mut provider = fx.provider(false);
    provider.produce_module(&plugin).unwrap();

    assert!(provider.invalidate(&plugin).unwrap());
    assert_eq!(provider.produce_module(&plugin).unwrap().status, ModuleStatus::Compiled);

    provider.clear_cache().unwrap();
    assert!(!fx.cache_root().join("remote").exists());
    assert_eq!(provider.produce_module(&plugin).unwrap().status, ModuleStatus::Compiled);
    assert_eq!(fx.compiles(), 3);
}

#[test]
fn missing_archive_is_a_fetch_error() {
    let fx = Fixture::new();
    let mut provider = fx.provider(false);
    let err = provider.produce_module(&descriptor(WIDGET)).unwrap_err();
    assert!(matches!(err, ProviderError::Fetch(_)));
    assert_eq!(fx.compiles(), 0);
}

#[test]
fn switching_build_mode_recompiles() {
    let fx = Fixture::new();
    fx.publish_source("acme/widget", "abc123", &widget_sources());
    let plugin = descriptor(WIDGET);
    let cache_dir = fx.cache_root().join("remote/acme/widget");

    let release = fx.provider(false).produce_module(&plugin).unwrap();
    assert_eq!(release.status, ModuleStatus::Compiled);
    assert!(!cache_dir.join("plugin.tkd").exists());

    let debug = fx.provider(true).produce_module(&plugin).unwrap();
    assert_eq!(debug.status, ModuleStatus::Compiled);
    let ModuleLocation::File { debug: debug_file, .. } = &debug.location else {
        panic!("expected a cached file");
    };
    assert_eq!(debug_file.as_deref(), Some(cache_dir.join("plugin.tkd").as_path()));
    assert!(CacheManifest::load(&cache_dir).is_debug_build());
    assert_eq!(fx.compiles(), 2);

    assert_eq!(fx.provider(true).produce_module(&plugin).unwrap().status, ModuleStatus::Cached);
    let back = fx.provider(false).produce_module(&plugin).unwrap();
    assert_eq!(back.status, ModuleStatus::Compiled);
    assert!(!cache_dir.join("plugin.tkd").exists());
    assert_eq!(fx.compiles(), 3);
}
