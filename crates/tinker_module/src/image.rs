//! Module images: the interface and code of one compiled Tinker module.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::container;
use crate::error::ModuleError;

const MODULE_MAGIC: [u8; 4] = *b"TKMD";

/// Whether an exported symbol is visible to every consumer or only to
/// consumers granted internals access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Declared with `pub`; callable from any module that references this one.
    Public,
    /// Declared without `pub`; callable only with `access_internals`.
    Internal,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
        }
    }
}

/// A function exported by a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// The exported symbol name.
    pub name: String,
    /// Number of parameters.
    pub arity: u8,
    /// Who may call it.
    pub visibility: Visibility,
    /// Index into [`ModuleImage::functions`].
    pub function: u32,
}

/// A symbol this module calls from one of its references.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    /// Name of the referenced module.
    pub module: String,
    /// Name of the symbol within that module.
    pub symbol: String,
    /// Number of parameters the callee declares.
    pub arity: u8,
}

/// Binary operators understood by the bytecode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Unary operators understood by the bytecode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not.
    Not,
}

/// One stack-machine instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Push an integer constant.
    PushInt(i64),
    /// Push a boolean constant.
    PushBool(bool),
    /// Push the string at this index of the string table.
    PushStr(u32),
    /// Push the value of a local slot.
    LoadLocal(u16),
    /// Pop into a local slot.
    StoreLocal(u16),
    /// Call a function defined in this module.
    Call {
        /// Index into the function table.
        function: u32,
        /// Number of arguments on the stack.
        argc: u8,
    },
    /// Call an imported function.
    CallImport {
        /// Index into the import table.
        import: u32,
        /// Number of arguments on the stack.
        argc: u8,
    },
    /// Pop two operands and push the result.
    Binary(BinOp),
    /// Pop one operand and push the result.
    Unary(UnOp),
    /// Jump to an absolute instruction offset.
    Jump(u32),
    /// Pop a boolean; jump if it is false.
    JumpIfFalse(u32),
    /// Discard the top of the stack.
    Pop,
    /// Return the top of the stack to the caller.
    Return,
}

/// A compiled function body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Source-level name.
    pub name: String,
    /// Number of parameters, which occupy the first local slots.
    pub arity: u8,
    /// Total local slots, parameters included.
    pub locals: u16,
    /// Instruction stream.
    pub code: Vec<Op>,
}

/// A complete module: its identity, its interface, and its code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleImage {
    /// Module name. Also the file stem it is published under.
    pub name: String,
    /// Names of the modules this module was compiled against.
    pub dependencies: Vec<String>,
    /// Symbols called from dependencies.
    pub imports: Vec<Import>,
    /// Functions other modules may call.
    pub exports: Vec<Export>,
    /// All function bodies, exported or not.
    pub functions: Vec<Function>,
    /// String constant table.
    pub strings: Vec<String>,
    /// Whether the code was built with optimizations.
    pub optimized: bool,
}

impl ModuleImage {
    /// Creates an empty module with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            strings: Vec::new(),
            optimized: false,
        }
    }

    /// Adds a dependency name and returns `self`.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Adds an exported function whose body returns zero.
    ///
    /// Useful for host modules whose implementation lives outside Tinker code.
    pub fn with_export(mut self, name: impl Into<String>, arity: u8, visibility: Visibility) -> Self {
        let name = name.into();
        let index = self.functions.len() as u32;
        self.functions.push(Function {
            name: name.clone(),
            arity,
            locals: u16::from(arity),
            code: vec![Op::PushInt(0), Op::Return],
        });
        self.exports.push(Export {
            name,
            arity,
            visibility,
            function: index,
        });
        self
    }

    /// Looks up an export by name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Iterates over exports visible without internals access.
    pub fn public_exports(&self) -> impl Iterator<Item = &Export> {
        self.exports
            .iter()
            .filter(|e| e.visibility == Visibility::Public)
    }

    /// Encodes the module into its on-disk representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModuleError> {
        container::encode(MODULE_MAGIC, &self.name, self)
    }

    /// Decodes and validates a module from its on-disk representation.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ModuleError> {
        let (header, image): (_, ModuleImage) = container::decode(MODULE_MAGIC, raw)?;
        if header.name != image.name {
            return Err(ModuleError::InvalidHeader {
                reason: format!(
                    "header names '{}' but body names '{}'",
                    header.name, image.name
                ),
            });
        }
        Ok(image)
    }

    /// Reads only the module name from a header, without validating the body.
    pub fn peek_name(raw: &[u8]) -> Result<String, ModuleError> {
        container::decode_header(MODULE_MAGIC, raw).map(|(header, _)| header.name)
    }

    /// Reads a module file from disk.
    pub fn read_file(path: &Path) -> Result<Self, ModuleError> {
        let raw = std::fs::read(path).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&raw)
    }

    /// Writes this module to disk, replacing any existing file.
    pub fn write_file(&self, path: &Path) -> Result<(), ModuleError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleImage {
        ModuleImage::new("host_ui")
            .with_dependency("host_core")
            .with_export("draw", 2, Visibility::Public)
            .with_export("reset_canvas", 0, Visibility::Internal)
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host_ui.tkm");
        let image = sample();
        image.write_file(&path).unwrap();
        let back = ModuleImage::read_file(&path).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn export_lookup_and_visibility() {
        let image = sample();
        assert_eq!(image.export("draw").map(|e| e.arity), Some(2));
        assert!(image.export("missing").is_none());
        let public: Vec<_> = image.public_exports().map(|e| e.name.as_str()).collect();
        assert_eq!(public, vec!["draw"]);
    }

    #[test]
    fn peek_name_reads_header_only() {
        let mut raw = sample().to_bytes().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        assert_eq!(ModuleImage::peek_name(&raw).unwrap(), "host_ui");
        assert!(ModuleImage::from_bytes(&raw).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModuleImage::read_file(&dir.path().join("nope.tkm")).unwrap_err();
        assert!(matches!(err, ModuleError::Io { .. }));
    }

    #[test]
    fn debug_magic_is_not_a_module() {
        let debug = crate::DebugInfo::new("host_ui");
        let raw = debug.to_bytes().unwrap();
        assert!(matches!(
            ModuleImage::from_bytes(&raw),
            Err(ModuleError::InvalidHeader { .. })
        ));
    }
}
