//! Compilation sessions.
//!
//! A session accumulates source units and extra references, then compiles
//! them once into a named module. [`LocalSession`] does the work; sessions
//! handed out by the process toolchain forward every call to one of these
//! living in the worker.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use tinker_common::Interner;
use tinker_diagnostics::{Diagnostic, DiagnosticSink};
use tinker_lang::{CompileOptions, CompileUnit, ReferenceSet};
use tinker_refs::{ReferenceCatalog, ReferenceEntry};
use tinker_source::SourceDb;

use crate::error::ToolchainError;
use crate::result::{CompilationResult, CompileFailure, CompileFailures, CompiledModule};

/// Sources larger than this are not embedded in debug data.
pub const MAX_EMBEDDED_SOURCE: usize = 1024 * 1024;

/// One unit of source text as handed to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    /// Display name used in diagnostics and debug data.
    pub name: String,
    /// The text.
    pub text: String,
    /// Whether debug data carries the text.
    pub embed: bool,
}

impl SourceUnit {
    /// Creates a unit, embedding its text unless it is very large.
    pub fn new(name: impl Into<String>, text: String) -> Self {
        let embed = text.len() <= MAX_EMBEDDED_SOURCE;
        Self {
            name: name.into(),
            text,
            embed,
        }
    }
}

/// A single compilation.
pub trait CompilationSession {
    /// Reads a source unit to completion and adds it under `name`.
    fn load(&mut self, source: &mut dyn Read, name: &str) -> Result<(), ToolchainError>;

    /// Adds a module file as an extra reference for this session only.
    ///
    /// Best-effort: a path without the module extension, a missing file or
    /// an unreadable module is ignored.
    fn add_dependency(&mut self, path: &Path);

    /// Compiles everything loaded so far into a module named `output_name`.
    fn compile(&mut self, output_name: &str) -> Result<CompilationResult, ToolchainError>;
}

/// Reads `source` fully as UTF-8.
pub(crate) fn read_source(source: &mut dyn Read, name: &str) -> Result<String, ToolchainError> {
    let mut bytes = Vec::new();
    source
        .read_to_end(&mut bytes)
        .map_err(|e| ToolchainError::Load {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|_| ToolchainError::Load {
        name: name.to_string(),
        reason: "source is not valid UTF-8".to_string(),
    })
}

struct LoadedUnit {
    ast: tinker_lang::SourceUnit,
    embed: bool,
}

/// A session compiling in the current process.
pub struct LocalSession {
    debug: bool,
    deny_warnings: bool,
    references: ReferenceSet,
    custom: Vec<ReferenceEntry>,
    internals: BTreeSet<String>,
    db: SourceDb,
    interner: Interner,
    units: Vec<LoadedUnit>,
    parse_diagnostics: Vec<Diagnostic>,
}

impl LocalSession {
    /// Creates a session compiling against `references`.
    pub fn new(references: ReferenceSet, debug: bool, deny_warnings: bool) -> Self {
        Self {
            debug,
            deny_warnings,
            references,
            custom: Vec::new(),
            internals: BTreeSet::new(),
            db: SourceDb::new(),
            interner: Interner::new(),
            units: Vec::new(),
            parse_diagnostics: Vec::new(),
        }
    }

    /// Parses `unit` and records the internals access it asks for.
    pub fn load_unit(&mut self, unit: SourceUnit) {
        let sink = DiagnosticSink::new();
        let file = self.db.add_source(unit.name, unit.text);
        let ast = tinker_lang::parse_unit(file, &self.db, &self.interner, &sink);
        for name in tinker_lang::access_internals(&ast, &self.interner) {
            self.internals.insert(name);
        }
        self.parse_diagnostics.extend(sink.take_all());
        self.units.push(LoadedUnit {
            ast,
            embed: unit.embed,
        });
    }

    /// Returns the number of units loaded.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    fn effective_references(&self) -> ReferenceSet {
        let mut refs = self.references.clone();
        for entry in &self.custom {
            refs.insert(entry.image.clone());
        }
        for name in &self.internals {
            if !refs.publicize(name) {
                tracing::debug!(reference = %name, "internals requested for unknown reference");
            }
        }
        refs
    }

    fn failure(&self, diag: &Diagnostic) -> CompileFailure {
        let (file, line, column) = if diag.primary_span.is_dummy() {
            (String::new(), 0, 0)
        } else {
            let resolved = self.db.resolve_span(diag.primary_span);
            (resolved.file, resolved.start_line, resolved.start_col)
        };
        CompileFailure {
            code: diag.code.to_string(),
            message: diag.message.clone(),
            file,
            line,
            column,
        }
    }
}

impl CompilationSession for LocalSession {
    fn load(&mut self, source: &mut dyn Read, name: &str) -> Result<(), ToolchainError> {
        let text = read_source(source, name)?;
        self.load_unit(SourceUnit::new(name, text));
        Ok(())
    }

    fn add_dependency(&mut self, path: &Path) {
        if let Some(entry) = ReferenceCatalog::add_reference(path) {
            tracing::debug!(reference = %entry.name, path = %path.display(), "added custom reference");
            self.custom.push(entry);
        }
    }

    fn compile(&mut self, output_name: &str) -> Result<CompilationResult, ToolchainError> {
        let refs = self.effective_references();
        let options = CompileOptions::new(output_name, self.debug);
        let sink = DiagnosticSink::new();
        for diag in &self.parse_diagnostics {
            sink.emit(diag.clone());
        }

        let units: Vec<CompileUnit<'_>> = self
            .units
            .iter()
            .map(|unit| CompileUnit {
                ast: &unit.ast,
                embed: unit.embed,
            })
            .collect();
        let output = tinker_lang::compile(&self.db, &units, &refs, &options, &self.interner, &sink);

        let failures: Vec<CompileFailure> = sink
            .take_all()
            .iter()
            .filter(|diag| diag.is_failure(self.deny_warnings))
            .map(|diag| self.failure(diag))
            .collect();

        match output {
            Some(output) if failures.is_empty() => {
                let image = output.image.to_bytes()?;
                let debug = output.debug.map(|debug| debug.to_bytes()).transpose()?;
                tracing::debug!(
                    module = %output_name,
                    units = self.units.len(),
                    bytes = image.len(),
                    "compiled module"
                );
                Ok(Ok(CompiledModule { image, debug }))
            }
            _ => Ok(Err(CompileFailures(failures))),
        }
    }
}
