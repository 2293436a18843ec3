//! Debug data written next to modules built in debug mode.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::container;
use crate::error::ModuleError;

const DEBUG_MAGIC: [u8; 4] = *b"TKDB";

/// A source unit that contributed to a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugUnit {
    /// The unit's file name as given when it was loaded.
    pub name: String,
    /// The full unit text, embedded so the module can be debugged without
    /// the original sources.
    pub text: Option<String>,
}

/// Maps one instruction offset to a source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    /// First instruction offset covered by this entry.
    pub offset: u32,
    /// Index into [`DebugInfo::units`].
    pub unit: u32,
    /// 1-based source line.
    pub line: u32,
}

/// The line table for one function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLines {
    /// Index into the module's function table.
    pub function: u32,
    /// Entries sorted by `offset`.
    pub entries: Vec<LineEntry>,
}

/// Debug data for one module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Name of the module this data describes.
    pub module: String,
    /// Contributing source units.
    pub units: Vec<DebugUnit>,
    /// Per-function line tables.
    pub functions: Vec<FunctionLines>,
}

impl DebugInfo {
    /// Creates empty debug data for the named module.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            units: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Finds the source location of an instruction.
    ///
    /// Returns the unit name and 1-based line of the closest entry at or
    /// before `offset`.
    pub fn locate(&self, function: u32, offset: u32) -> Option<(&str, u32)> {
        let lines = self.functions.iter().find(|f| f.function == function)?;
        let entry = lines
            .entries
            .iter()
            .take_while(|e| e.offset <= offset)
            .last()?;
        let unit = self.units.get(entry.unit as usize)?;
        Some((unit.name.as_str(), entry.line))
    }

    /// Encodes the debug data into its on-disk representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModuleError> {
        container::encode(DEBUG_MAGIC, &self.module, self)
    }

    /// Decodes and validates debug data.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ModuleError> {
        container::decode(DEBUG_MAGIC, raw).map(|(_, info)| info)
    }

    /// Reads a debug data file from disk.
    pub fn read_file(path: &Path) -> Result<Self, ModuleError> {
        let raw = std::fs::read(path).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&raw)
    }

    /// Writes debug data to disk, replacing any existing file.
    pub fn write_file(&self, path: &Path) -> Result<(), ModuleError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
