//! The Tinker module binary format.
//!
//! A compiled plugin, and every host reference it is compiled against, is a
//! `.tkm` module image: a validated header followed by the module's interface
//! (dependencies, imports, exports) and its function bodies. Debug builds also
//! produce a `.tkd` file mapping code back to source lines.

#![warn(missing_docs)]

mod container;
pub mod debug;
pub mod error;
pub mod image;

pub use debug::{DebugInfo, DebugUnit, FunctionLines, LineEntry};
pub use error::ModuleError;
pub use image::{BinOp, Export, Function, Import, ModuleImage, Op, UnOp, Visibility};

/// File extension of compiled module images.
pub const MODULE_EXTENSION: &str = "tkm";

/// File extension of debug data files.
pub const DEBUG_EXTENSION: &str = "tkd";

/// Current module format version. Increment on breaking changes to the
/// header or body encoding.
pub const MODULE_FORMAT_VERSION: u32 = 1;

/// Describes the runtime this process produces and loads modules for.
///
/// Stored in every cache manifest; a manifest written by a different runtime
/// is never reused.
pub fn runtime_descriptor() -> String {
    format!(
        "tinker {} (module format {MODULE_FORMAT_VERSION})",
        env!("CARGO_PKG_VERSION")
    )
}

/// Returns `true` if `path` has the module extension, ignoring case.
pub fn has_module_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MODULE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn runtime_descriptor_names_format_version() {
        let rt = runtime_descriptor();
        assert!(rt.starts_with("tinker "));
        assert!(rt.contains(&format!("module format {MODULE_FORMAT_VERSION}")));
    }

    #[test]
    fn module_extension_is_case_insensitive() {
        assert!(has_module_extension(Path::new("refs/host_core.tkm")));
        assert!(has_module_extension(Path::new("refs/HOST_CORE.TKM")));
        assert!(!has_module_extension(Path::new("refs/host_core.tks")));
        assert!(!has_module_extension(Path::new("refs/host_core")));
    }
}
