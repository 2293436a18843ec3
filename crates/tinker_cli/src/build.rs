//! `tinker build`: produce one plugin's module through the cache.

use tinker_provider::{provider_from_config, ModuleLocation, ModuleStatus, ProviderError};

use crate::setup::{apply_isolation, load_config, load_plugin, worker_executable};
use crate::{BuildArgs, GlobalArgs, EXIT_TRANSIENT};

/// Runs the `tinker build` command.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_config(global)?;
    apply_isolation(&mut config, args.isolation);
    if args.debug {
        config.toolchain.debug = true;
    }
    let plugin = load_plugin(&args.plugin)?;
    let worker = worker_executable(&config)?;
    let mut provider = provider_from_config(&config, &worker)?;

    let result = provider.produce_version(&plugin, args.select.as_deref());
    provider.dispose();
    let produced = match result {
        Ok(produced) => produced,
        Err(ProviderError::Compile { plugin, failures }) => {
            eprintln!("error: plugin {plugin} failed to compile");
            for failure in failures.iter() {
                eprintln!("  {failure}");
            }
            return Ok(1);
        }
        Err(err) if err.is_transient() => {
            eprintln!("error: {} is temporarily unavailable: {err}", plugin.plugin.name);
            return Ok(EXIT_TRANSIENT);
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(output) = &args.output {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, produced.image_bytes()?)?;
    }

    if !global.quiet {
        let verb = match produced.status {
            ModuleStatus::Cached => "Fresh",
            ModuleStatus::Compiled => "Compiled",
        };
        let revision = produced
            .revision
            .as_deref()
            .map(|r| format!(" ({r})"))
            .unwrap_or_default();
        match &produced.location {
            ModuleLocation::File { module, .. } => {
                eprintln!("  {verb} {}{revision} -> {}", produced.plugin, module.display())
            }
            ModuleLocation::Memory { image, .. } => {
                eprintln!("  {verb} {}{revision} ({} bytes)", produced.plugin, image.len())
            }
        }
        if let Some(assets) = &produced.asset_dir {
            eprintln!("   Assets {}", assets.display());
        }
        if let Some(staged) = &produced.staged_dir {
            eprintln!("  Packages {}", staged.display());
        }
    }
    Ok(0)
}
