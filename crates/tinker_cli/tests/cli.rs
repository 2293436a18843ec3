use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use tinker_module::{ModuleImage, Visibility};

const HOST_CONFIG: &str = r#"
[host]
version = "1.0.0"
cache_dir = "cache"

[toolchain]
probe_dirs = ["refs"]
references = ["host_core"]

[sources]
mirror = "mirror"
"#;

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tinker.toml"), HOST_CONFIG).unwrap();
    std::fs::create_dir_all(dir.path().join("refs")).unwrap();
    ModuleImage::new("host_core")
        .with_export("log", 1, Visibility::Public)
        .write_file(&dir.path().join("refs").join("host_core.tkm"))
        .unwrap();
    dir
}

fn write(root: &Path, relative: &str, text: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

fn tinker(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tinker"))
        .arg("--config")
        .arg(root)
        .args(args)
        .env_remove("TINKER_LOG")
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn process_and_in_process_toolchains_agree() {
    let dir = workspace();
    let main = write(dir.path(), "src/main.tks", "use host_core::log;\npub fn on_load() { log(1 + 2); }");
    let util = write(dir.path(), "src/util.tks", "pub fn helper() { return 2; }");
    let main = main.to_str().unwrap();
    let util = util.to_str().unwrap();

    let mut images = Vec::new();
    for isolation in ["process", "in-process"] {
        let out = dir.path().join(format!("out/{isolation}/plugin.tkm"));
        let output = tinker(
            dir.path(),
            &["compile", main, util, "-o", out.to_str().unwrap(), "--isolation", isolation],
        );
        assert!(output.status.success(), "{isolation}: {}", stderr(&output));
        images.push(std::fs::read(&out).unwrap());
    }
    assert_eq!(images[0], images[1]);
    assert_eq!(ModuleImage::from_bytes(&images[0]).unwrap().name, "plugin");
}

#[test]
fn compile_failure_reports_position() {
    let dir = workspace();
    let bad = write(dir.path(), "bad.tks", "pub fn f() {\n  let x = 1\n  return x;\n}");
    let out = dir.path().join("bad.tkm");
    let output = tinker(
        dir.path(),
        &["compile", bad.to_str().unwrap(), "-o", out.to_str().unwrap(), "--isolation", "in-process"],
    );
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("bad.tks (2,12)"), "{text}");
    assert!(!out.exists());
}

#[test]
fn build_local_plugin_and_inspect() {
    let dir = workspace();
    write(dir.path(), "workbench/scripts/main.tks", "use host_core::log;\npub fn on_load() { log(1); }");
    write(
        dir.path(),
        "workbench/plugin.toml",
        "[plugin]\nname = \"workbench\"\npath = \".\"\n",
    );
    let out = dir.path().join("workbench.tkm");
    let plugin = dir.path().join("workbench");
    let output = tinker(
        dir.path(),
        &[
            "build",
            plugin.to_str().unwrap(),
            "--isolation",
            "in-process",
            "-o",
            out.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let inspect = tinker(dir.path(), &["inspect", out.to_str().unwrap()]);
    assert!(inspect.status.success());
    let text = String::from_utf8_lossy(&inspect.stdout);
    assert!(text.starts_with("module workbench"), "{text}");
    assert!(text.contains("dependencies: host_core"));

    let json = tinker(dir.path(), &["inspect", out.to_str().unwrap(), "--format", "json"]);
    let value: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    assert_eq!(value["name"], "workbench");
}

#[test]
fn missing_remote_archive_fails() {
    let dir = workspace();
    write(
        dir.path(),
        "widget/plugin.toml",
        "[plugin]\nname = \"widget\"\nrepository = \"acme/widget\"\nrevision = \"abc123\"\n",
    );
    let plugin = dir.path().join("widget");
    let output = tinker(
        dir.path(),
        &["build", plugin.to_str().unwrap(), "--isolation", "in-process"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no archive for acme/widget at abc123"));
}

#[test]
fn cache_commands_run_without_a_cache() {
    let dir = workspace();
    for args in [&["cache", "gc"][..], &["cache", "clear"][..]] {
        let output = tinker(dir.path(), args);
        assert!(output.status.success(), "{}", stderr(&output));
    }
    write(
        dir.path(),
        "widget/plugin.toml",
        "[plugin]\nname = \"widget\"\nrepository = \"acme/widget\"\nrevision = \"abc123\"\n",
    );
    let plugin = dir.path().join("widget");
    let output = tinker(dir.path(), &["cache", "invalidate", plugin.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(dir.path().join("cache/remote/acme/widget/manifest.json").is_file());
}
