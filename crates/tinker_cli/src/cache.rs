//! `tinker cache`: maintain the module cache tree.

use tinker_provider::maintenance;

use crate::setup::{load_config, load_plugin};
use crate::{CacheCommand, GlobalArgs};

/// Runs a `tinker cache` subcommand. Never starts the toolchain.
pub fn run(command: &CacheCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_config(global)?;
    let cache_root = config.cache_root();
    match command {
        CacheCommand::Gc => {
            let removed = maintenance::collect_garbage(&cache_root)?;
            if !global.quiet {
                eprintln!("   Removed {removed} unknown staged file(s)");
            }
        }
        CacheCommand::Clear => {
            maintenance::clear_cache(&cache_root)?;
            if !global.quiet {
                eprintln!("   Cleared {}", cache_root.display());
            }
        }
        CacheCommand::Invalidate { plugin } => {
            let descriptor = load_plugin(plugin)?;
            let invalidated = maintenance::invalidate(&cache_root, &descriptor)?;
            if !global.quiet {
                if invalidated {
                    eprintln!("  Invalidated {}", descriptor.plugin.name);
                } else {
                    eprintln!("  {} is a local plugin and is never cached", descriptor.plugin.name);
                }
            }
        }
    }
    Ok(0)
}
