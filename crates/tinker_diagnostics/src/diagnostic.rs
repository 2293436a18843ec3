//! Structured diagnostic messages with severity, codes, and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use tinker_source::Span;

/// A structured diagnostic message anchored to a source span.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Where the issue was detected.
    pub primary_span: Span,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code, message, and span.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            primary_span: span,
            notes: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic with the given code, message, and span.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            primary_span: span,
            notes: Vec::new(),
        }
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Returns `true` if this diagnostic fails the build.
    ///
    /// Warnings count as failures when `deny_warnings` is set.
    pub fn is_failure(&self, deny_warnings: bool) -> bool {
        match self.severity {
            Severity::Error => true,
            Severity::Warning => deny_warnings,
            Severity::Note => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(DiagnosticCode::SYNTAX, "unexpected token", Span::DUMMY);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "unexpected token");
        assert_eq!(format!("{}", diag.code), "E002");
    }

    #[test]
    fn with_note_appends() {
        let diag = Diagnostic::error(DiagnosticCode::UNKNOWN_NAME, "unknown function", Span::DUMMY)
            .with_note("functions must be declared in a loaded source unit");
        assert_eq!(diag.notes.len(), 1);
    }

    #[test]
    fn warnings_escalate_only_when_denied() {
        let diag = Diagnostic::warning(DiagnosticCode::UNUSED_IMPORT, "unused", Span::DUMMY);
        assert!(!diag.is_failure(false));
        assert!(diag.is_failure(true));
    }
}
