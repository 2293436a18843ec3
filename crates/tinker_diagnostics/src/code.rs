//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
        }
    }
}

/// A category prefix plus a number, displayed as `E002` or `W001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Invalid character, unterminated string or comment.
    pub const LEXICAL: Self = Self::error(1);
    /// Unexpected token.
    pub const SYNTAX: Self = Self::error(2);
    /// A `use` names a reference that is not in the reference set.
    pub const UNRESOLVED_REFERENCE: Self = Self::error(101);
    /// A `use` names a symbol the reference does not export.
    pub const UNRESOLVED_SYMBOL: Self = Self::error(102);
    /// A `use` names an internal symbol without `access_internals`.
    pub const INACCESSIBLE_SYMBOL: Self = Self::error(103);
    /// A call or variable names nothing in scope.
    pub const UNKNOWN_NAME: Self = Self::error(104);
    /// A call passes the wrong number of arguments.
    pub const ARITY_MISMATCH: Self = Self::error(105);
    /// Two functions share a name.
    pub const DUPLICATE_DEFINITION: Self = Self::error(106);
    /// An imported symbol is never called.
    pub const UNUSED_IMPORT: Self = Self::warning(1);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    const fn error(number: u16) -> Self {
        Self::new(Category::Error, number)
    }

    const fn warning(number: u16) -> Self {
        Self::new(Category::Warning, number)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
    }

    #[test]
    fn display_format() {
        assert_eq!(DiagnosticCode::SYNTAX.to_string(), "E002");
        assert_eq!(DiagnosticCode::UNRESOLVED_REFERENCE.to_string(), "E101");
        assert_eq!(DiagnosticCode::UNUSED_IMPORT.to_string(), "W001");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::ARITY_MISMATCH;
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
