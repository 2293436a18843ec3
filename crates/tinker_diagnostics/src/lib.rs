//! Diagnostic creation, severity management, and accumulation.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels
//! and codes. The [`DiagnosticSink`] accumulates diagnostics while a session
//! parses and checks its source units.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use severity::Severity;
pub use sink::DiagnosticSink;
