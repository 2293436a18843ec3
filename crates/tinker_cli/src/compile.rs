//! `tinker compile`: compile loose script files into a module.

use std::path::Path;

use tinker_module::DEBUG_EXTENSION;

use crate::setup::{apply_isolation, load_config, toolchain};
use crate::{CompileArgs, GlobalArgs};

/// Runs the `tinker compile` command.
///
/// Each file is loaded under its file name. Returns exit code 0 on success,
/// 1 when compilation fails.
pub fn run(args: &CompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = load_config(global)?;
    apply_isolation(&mut config, args.isolation);
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or("cannot derive a module name from the output path")?,
    };

    let mut toolchain = toolchain(&config)?;
    toolchain.init()?;
    let result = compile_files(toolchain.as_mut(), &args.files, &name, args.debug);
    toolchain.dispose();
    let module = match result? {
        Ok(module) => module,
        Err(failures) => {
            eprintln!("error: {failures}");
            return Ok(1);
        }
    };

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, &module.image)?;
    if let Some(debug) = &module.debug {
        std::fs::write(args.output.with_extension(DEBUG_EXTENSION), debug)?;
    }
    if !global.quiet {
        eprintln!(
            "  Compiled {name} from {} file(s) -> {}",
            args.files.len(),
            args.output.display()
        );
    }
    Ok(0)
}

fn compile_files(
    toolchain: &mut dyn tinker_toolchain::ToolchainFactory,
    files: &[std::path::PathBuf],
    name: &str,
    debug: bool,
) -> Result<tinker_toolchain::CompilationResult, Box<dyn std::error::Error>> {
    let mut session = toolchain.create(debug)?;
    for file in files {
        let display = display_name(file);
        let mut reader = std::fs::File::open(file)
            .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
        session.load(&mut reader, &display)?;
    }
    Ok(session.compile(name)?)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_file_name() {
        assert_eq!(display_name(Path::new("scripts/main.tks")), "main.tks");
        assert_eq!(display_name(Path::new("main.tks")), "main.tks");
    }
}
