//! Shared helpers: logging, configuration lookup and toolchain construction.

use std::path::{Path, PathBuf};

use tinker_config::{
    load_host_config, load_plugin_descriptor, HostConfig, Isolation, PluginDescriptor,
    HOST_CONFIG_FILE, PLUGIN_DESCRIPTOR_FILE,
};
use tinker_toolchain::{InProcessToolchain, ProcessToolchain, ToolchainFactory, ToolchainSettings};
use tracing_subscriber::EnvFilter;

use crate::{GlobalArgs, IsolationArg};

/// Environment variable holding a log filter, e.g. `TINKER_LOG=tinker_provider=debug`.
pub const LOG_ENV: &str = "TINKER_LOG";

/// Installs the stderr log subscriber.
///
/// `TINKER_LOG` wins over `--quiet`/`--verbose`.
pub fn init_logging(global: &GlobalArgs) {
    let default = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Walks up from `start` looking for the nearest directory containing
/// `tinker.toml`.
pub fn find_host_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(HOST_CONFIG_FILE).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolves the directory whose `tinker.toml` applies.
///
/// `--config` names a file (its parent is used) or a directory. Otherwise the
/// nearest ancestor of the current directory holding `tinker.toml` is used,
/// falling back to the current directory itself.
pub fn resolve_host_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        let cwd = std::env::current_dir()?;
        Ok(find_host_root(&cwd).unwrap_or(cwd))
    }
}

/// Loads the host configuration for this invocation.
pub fn load_config(global: &GlobalArgs) -> Result<HostConfig, Box<dyn std::error::Error>> {
    let root = resolve_host_root(global)?;
    let config = load_host_config(&root)?;
    tracing::debug!(root = %root.display(), cache = %config.cache_root().display(), "host configuration loaded");
    Ok(config)
}

/// Loads a plugin descriptor from a file or the directory containing it.
pub fn load_plugin(path: &Path) -> Result<PluginDescriptor, Box<dyn std::error::Error>> {
    let file = if path.is_dir() {
        path.join(PLUGIN_DESCRIPTOR_FILE)
    } else {
        path.to_path_buf()
    };
    Ok(load_plugin_descriptor(&file)?)
}

/// Applies a command-line isolation override.
pub fn apply_isolation(config: &mut HostConfig, isolation: Option<IsolationArg>) {
    match isolation {
        Some(IsolationArg::Process) => config.toolchain.isolation = Isolation::Process,
        Some(IsolationArg::InProcess) => config.toolchain.isolation = Isolation::InProcess,
        None => {}
    }
}

/// The executable serving `toolchain-worker`: the configured one, else this
/// binary.
pub fn worker_executable(config: &HostConfig) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &config.toolchain.worker {
        Some(worker) => Ok(worker.clone()),
        None => Ok(std::env::current_exe()?),
    }
}

/// Creates the configured toolchain, uninitialized.
pub fn toolchain(config: &HostConfig) -> Result<Box<dyn ToolchainFactory>, Box<dyn std::error::Error>> {
    let settings = ToolchainSettings {
        probe_dirs: config.toolchain.probe_dirs.clone(),
        references: config.toolchain.references.clone(),
        deny_warnings: config.toolchain.deny_warnings,
    };
    Ok(match config.toolchain.isolation {
        Isolation::Process => Box::new(ProcessToolchain::new(settings, worker_executable(config)?)),
        Isolation::InProcess => Box::new(InProcessToolchain::new(settings)),
    })
}
