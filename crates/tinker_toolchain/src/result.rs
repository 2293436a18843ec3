//! Compilation outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The encoded output of a successful compile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledModule {
    /// Module image bytes, ready to write as `.tkm`.
    pub image: Vec<u8>,
    /// Debug data bytes for `.tkd`, debug builds only.
    pub debug: Option<Vec<u8>>,
}

/// One diagnostic that failed the build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileFailure {
    /// Diagnostic code, e.g. `E002`.
    pub code: String,
    /// Message text.
    pub message: String,
    /// Display name of the source unit.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} in {} ({},{})",
            self.code, self.message, self.file, self.line, self.column
        )
    }
}

/// Every diagnostic that failed one build, in emission order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileFailures(pub Vec<CompileFailure>);

impl CompileFailures {
    /// Iterates over the failures.
    pub fn iter(&self) -> impl Iterator<Item = &CompileFailure> {
        self.0.iter()
    }

    /// Returns the number of failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are none.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompileFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compilation failed with {} error(s)", self.0.len())?;
        for failure in &self.0 {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileFailures {}

/// Result of one `compile` call.
pub type CompilationResult = Result<CompiledModule, CompileFailures>;
