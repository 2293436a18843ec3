//! `tinker inspect`: print module images and debug data.

use tinker_module::{has_module_extension, DebugInfo, ModuleImage, DEBUG_EXTENSION};

use crate::{InspectArgs, ReportFormat};

/// Runs the `tinker inspect` command.
pub fn run(args: &InspectArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let is_debug = args
        .file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DEBUG_EXTENSION));
    if is_debug {
        let debug = DebugInfo::read_file(&args.file)?;
        match args.format {
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&debug)?),
            ReportFormat::Text => print!("{}", render_debug(&debug)),
        }
    } else {
        if !has_module_extension(&args.file) {
            tracing::warn!(file = %args.file.display(), "unexpected extension, reading as a module");
        }
        let image = ModuleImage::read_file(&args.file)?;
        match args.format {
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&image)?),
            ReportFormat::Text => print!("{}", render_module(&image)),
        }
    }
    Ok(0)
}

fn render_module(image: &ModuleImage) -> String {
    let mut out = format!(
        "module {}{}\n",
        image.name,
        if image.optimized { "" } else { " (unoptimized)" }
    );
    if !image.dependencies.is_empty() {
        out.push_str(&format!("  dependencies: {}\n", image.dependencies.join(", ")));
    }
    for import in &image.imports {
        out.push_str(&format!(
            "  import {}::{}/{}\n",
            import.module, import.symbol, import.arity
        ));
    }
    for export in &image.exports {
        out.push_str(&format!(
            "  export {} {}/{}\n",
            export.visibility, export.name, export.arity
        ));
    }
    out.push_str(&format!("  functions: {}\n", image.functions.len()));
    out
}

fn render_debug(debug: &DebugInfo) -> String {
    let mut out = format!("debug info for {}\n", debug.module);
    for unit in &debug.units {
        let embedded = match &unit.text {
            Some(text) => format!("{} bytes embedded", text.len()),
            None => "not embedded".to_string(),
        };
        out.push_str(&format!("  unit {} ({embedded})\n", unit.name));
    }
    out.push_str(&format!("  line tables: {}\n", debug.functions.len()));
    out
}
