//! Compiler for Tinker script, the language plugins are written in.
//!
//! The pipeline is lex, parse, resolve, generate. [`parse_unit`] turns one
//! loaded source file into a [`SourceUnit`]; [`compile`] takes every unit of a
//! plugin together with the [`ReferenceSet`] it is built against and produces a
//! [`ModuleImage`], plus [`DebugInfo`] for debug builds.
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): tokens, comments, string escapes.
//! - **Parser** ([`parser`]): recursive descent with Pratt expressions and
//!   error recovery through `Error` nodes.
//! - **Resolution**: module-level names (`use`, functions, `#[cfg]`).
//! - **Codegen**: body lowering, body-level name checks, constant folding.

#![warn(missing_docs)]

/// AST node types.
pub mod ast;
mod codegen;
mod expr;
mod fold;
/// Lexical analyzer.
pub mod lexer;
/// Recursive descent parser.
pub mod parser;
pub mod references;
mod resolve;
mod stmt;
/// Token types.
pub mod token;

use std::collections::BTreeSet;

use tinker_common::Interner;
use tinker_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tinker_module::{DebugInfo, DebugUnit, Export, ModuleImage, Visibility};
use tinker_source::{FileId, SourceDb};

pub use ast::SourceUnit;
pub use references::{ReferenceSet, VisibleModule};

/// Preprocessor flags defined in every build.
pub const RELEASE_FLAGS: &[&str] = &["TINKER", "TRACE"];

/// Additional flag defined in debug builds.
pub const DEBUG_FLAG: &str = "DEBUG";

/// Build options for one module.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Name of the produced module.
    pub module_name: String,
    /// Debug build: no folding, line tables, embedded sources.
    pub debug: bool,
    /// Defined preprocessor flags.
    pub flags: BTreeSet<String>,
}

impl CompileOptions {
    /// Options for a release or debug build with the standard flags.
    pub fn new(module_name: impl Into<String>, debug: bool) -> Self {
        let mut flags: BTreeSet<String> = RELEASE_FLAGS.iter().map(|f| f.to_string()).collect();
        if debug {
            flags.insert(DEBUG_FLAG.to_string());
        }
        Self {
            module_name: module_name.into(),
            debug,
            flags,
        }
    }
}

/// One unit handed to [`compile`].
#[derive(Clone, Copy, Debug)]
pub struct CompileUnit<'a> {
    /// The parsed unit.
    pub ast: &'a SourceUnit,
    /// Embed the unit's text in debug data.
    pub embed: bool,
}

/// A successfully compiled module.
#[derive(Clone, Debug)]
pub struct CompileOutput {
    /// The module image.
    pub image: ModuleImage,
    /// Debug data, for debug builds.
    pub debug: Option<DebugInfo>,
}

/// Lexes and parses one file of `db`.
pub fn parse_unit(
    file: FileId,
    db: &SourceDb,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> SourceUnit {
    let source = &db.get_file(file).content;
    let tokens = lexer::lex(source, file, sink);
    parser::Parser::new(tokens, source, file, interner, sink).parse_source_unit()
}

/// Returns the reference names a unit requests internals access to.
pub fn access_internals(unit: &SourceUnit, interner: &Interner) -> Vec<String> {
    unit.attributes
        .iter()
        .filter(|attr| interner.resolve(attr.name) == parser::ACCESS_INTERNALS)
        .flat_map(|attr| attr.args.iter().map(|arg| arg.value.clone()))
        .collect()
}

/// Compiles a set of parsed units into a module.
///
/// Every problem is reported to `sink`. Returns `None` if the sink holds any
/// error afterwards, including errors from parsing.
pub fn compile(
    db: &SourceDb,
    units: &[CompileUnit<'_>],
    refs: &ReferenceSet,
    options: &CompileOptions,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> Option<CompileOutput> {
    let asts: Vec<&SourceUnit> = units.iter().map(|u| u.ast).collect();
    let scope = resolve::collect(&asts, refs, &options.flags, interner, sink);
    let generated = codegen::generate(
        &scope,
        db,
        codegen::CodegenOptions {
            optimize: !options.debug,
            line_tables: options.debug,
        },
        interner,
        sink,
    );

    for (unit_idx, bindings) in scope.unit_imports.iter().enumerate() {
        let mut unused: Vec<_> = bindings
            .iter()
            .filter(|(name, _)| !generated.used_imports.contains(&(unit_idx, **name)))
            .collect();
        unused.sort_by_key(|(_, binding)| binding.span.start);
        for (name, binding) in unused {
            sink.emit(Diagnostic::warning(
                DiagnosticCode::UNUSED_IMPORT,
                format!("unused import `{}`", interner.resolve(*name)),
                binding.span,
            ));
        }
    }

    if sink.has_errors() {
        tracing::debug!(
            module = %options.module_name,
            errors = sink.error_count(),
            "compilation failed"
        );
        return None;
    }

    let exports = scope
        .functions
        .iter()
        .enumerate()
        .map(|(index, live)| Export {
            name: interner.resolve(live.decl.name).to_string(),
            arity: generated.functions[index].arity,
            visibility: if live.decl.public {
                Visibility::Public
            } else {
                Visibility::Internal
            },
            function: index as u32,
        })
        .collect();

    let dependencies: BTreeSet<String> =
        scope.imports.iter().map(|i| i.module.clone()).collect();

    let image = ModuleImage {
        name: options.module_name.clone(),
        dependencies: dependencies.into_iter().collect(),
        imports: scope.imports,
        exports,
        functions: generated.functions,
        strings: generated.strings,
        optimized: !options.debug,
    };

    let debug = options.debug.then(|| DebugInfo {
        module: options.module_name.clone(),
        units: units
            .iter()
            .map(|unit| {
                let file = db.get_file(unit.ast.file);
                DebugUnit {
                    name: file.name.clone(),
                    text: unit.embed.then(|| file.content.clone()),
                }
            })
            .collect(),
        functions: generated.lines,
    });

    Some(CompileOutput { image, debug })
}

#[cfg(test)]
pub(crate) fn parse_source(
    name: &str,
    text: &str,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> (SourceDb, SourceUnit) {
    let mut db = SourceDb::new();
    let file = db.add_source(name, text.to_string());
    let unit = parse_unit(file, &db, interner, sink);
    (db, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tinker_diagnostics::Severity;
    use tinker_module::Op;

    fn host_refs() -> ReferenceSet {
        let mut set = ReferenceSet::new();
        set.insert(Arc::new(
            ModuleImage::new("host_core")
                .with_export("log", 1, Visibility::Public)
                .with_export("raw_handle", 0, Visibility::Internal),
        ));
        set.insert(Arc::new(
            ModuleImage::new("host_ui").with_export("draw", 2, Visibility::Public),
        ));
        set
    }

    struct Build {
        output: Option<CompileOutput>,
        diagnostics: Vec<Diagnostic>,
    }

    fn build(sources: &[(&str, &str)], refs: &ReferenceSet, debug: bool) -> Build {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut db = SourceDb::new();
        let files: Vec<FileId> = sources
            .iter()
            .map(|(name, text)| db.add_source(*name, text.to_string()))
            .collect();
        let asts: Vec<SourceUnit> = files
            .iter()
            .map(|f| parse_unit(*f, &db, &interner, &sink))
            .collect();
        let units: Vec<CompileUnit<'_>> = asts
            .iter()
            .map(|ast| CompileUnit { ast, embed: true })
            .collect();
        let options = CompileOptions::new("widget", debug);
        let output = compile(&db, &units, refs, &options, &interner, &sink);
        Build {
            output,
            diagnostics: sink.take_all(),
        }
    }

    fn codes(build: &Build) -> Vec<String> {
        build.diagnostics.iter().map(|d| d.code.to_string()).collect()
    }

    #[test]
    fn compiles_module_with_imports() {
        let b = build(
            &[
                ("main.tks", "use host_core::log;\npub fn on_load() { log(\"hi\"); helper(1); }"),
                ("util.tks", "fn helper(x) { return x + 1; }"),
            ],
            &host_refs(),
            false,
        );
        assert!(b.diagnostics.is_empty(), "{:?}", codes(&b));
        let image = b.output.unwrap().image;
        assert_eq!(image.name, "widget");
        assert_eq!(image.dependencies, vec!["host_core"]);
        assert_eq!(image.imports.len(), 1);
        assert_eq!(image.export("on_load").unwrap().visibility, Visibility::Public);
        assert_eq!(image.export("helper").unwrap().visibility, Visibility::Internal);
        assert_eq!(image.strings, vec!["hi"]);
        assert!(image.optimized);
    }

    #[test]
    fn release_folds_constants() {
        let b = build(&[("m.tks", "fn f() { return 2 * 3 + 4; }")], &host_refs(), false);
        let image = b.output.unwrap().image;
        assert_eq!(image.functions[0].code[0], Op::PushInt(10));
    }

    #[test]
    fn debug_keeps_operations_and_lines() {
        let b = build(
            &[("m.tks", "fn f() {\n  let x = 2 * 3;\n  return x;\n}")],
            &host_refs(),
            true,
        );
        let output = b.output.unwrap();
        assert!(!output.image.optimized);
        assert!(output.image.functions[0]
            .code
            .contains(&Op::Binary(tinker_module::BinOp::Mul)));
        let debug = output.debug.unwrap();
        assert_eq!(debug.units[0].name, "m.tks");
        assert!(debug.units[0].text.is_some());
        let lines: Vec<u32> = debug.functions[0].entries.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn cfg_debug_only_in_debug_builds() {
        let src = "#[cfg(DEBUG)]\npub fn dump() { }\n#[cfg(TRACE)]\npub fn trace() { }";
        let release = build(&[("m.tks", src)], &host_refs(), false).output.unwrap();
        assert!(release.image.export("dump").is_none());
        assert!(release.image.export("trace").is_some());
        let debug = build(&[("m.tks", src)], &host_refs(), true).output.unwrap();
        assert!(debug.image.export("dump").is_some());
    }

    #[test]
    fn every_error_reported() {
        let b = build(
            &[(
                "m.tks",
                "use host_ui::draw;\nfn f() { missing(); draw(1); let y = z; }",
            )],
            &host_refs(),
            false,
        );
        assert!(b.output.is_none());
        assert_eq!(codes(&b), vec!["E104", "E105", "E104"]);
    }

    #[test]
    fn unused_import_is_warning() {
        let b = build(&[("m.tks", "use host_core::log;\nfn f() { }")], &host_refs(), false);
        assert!(b.output.is_some());
        assert_eq!(b.diagnostics.len(), 1);
        assert_eq!(b.diagnostics[0].severity, Severity::Warning);
        assert_eq!(codes(&b), vec!["W001"]);
    }

    #[test]
    fn syntax_error_blocks_output() {
        let b = build(&[("m.tks", "fn f() { let = 1; }")], &host_refs(), false);
        assert!(b.output.is_none());
        assert_eq!(codes(&b), vec!["E002"]);
    }

    #[test]
    fn access_internals_lists_references() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let (_, unit) = parse_source(
            "m.tks",
            "#![access_internals(\"host_core\")]\n#![access_internals(\"host_ui\")]\n",
            &interner,
            &sink,
        );
        assert_eq!(access_internals(&unit, &interner), vec!["host_core", "host_ui"]);
    }

    #[test]
    fn scoped_variables() {
        let b = build(
            &[("m.tks", "fn f(a) { if a { let t = 1; } return t; }")],
            &host_refs(),
            false,
        );
        assert_eq!(codes(&b), vec!["E104"]);
    }
}
