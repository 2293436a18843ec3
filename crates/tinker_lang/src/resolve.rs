//! Module-level name resolution.
//!
//! Collects the functions of every unit that survives `#[cfg]` filtering and
//! resolves each unit's `use` declarations against the reference set. Bodies
//! are resolved later, during code generation.

use std::collections::{BTreeSet, HashMap};

use tinker_common::{Ident, Interner};
use tinker_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tinker_module::Import;
use tinker_source::Span;

use crate::ast::{FnDecl, SourceUnit};
use crate::references::ReferenceSet;

/// An imported symbol as seen from one unit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ImportBinding {
    /// Index into [`ModuleScope::imports`].
    pub index: u32,
    pub arity: u8,
    pub span: Span,
}

/// A function definition that takes part in this build.
pub(crate) struct LiveFn<'a> {
    /// Index of the defining unit.
    pub unit: usize,
    pub decl: &'a FnDecl,
}

/// Everything code generation needs to resolve a call.
pub(crate) struct ModuleScope<'a> {
    pub functions: Vec<LiveFn<'a>>,
    pub fn_index: HashMap<Ident, u32>,
    pub imports: Vec<Import>,
    /// Per unit, the symbols its `use` declarations bring into scope.
    pub unit_imports: Vec<HashMap<Ident, ImportBinding>>,
}

/// Returns `true` if `decl` is compiled under `flags`.
pub(crate) fn is_active(decl: &FnDecl, flags: &BTreeSet<String>, interner: &Interner) -> bool {
    decl.cfg
        .map_or(true, |cfg| flags.contains(interner.resolve(cfg.flag)))
}

/// Builds the module scope, reporting duplicate and unresolved names.
pub(crate) fn collect<'a>(
    units: &[&'a SourceUnit],
    refs: &ReferenceSet,
    flags: &BTreeSet<String>,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> ModuleScope<'a> {
    let mut scope = ModuleScope {
        functions: Vec::new(),
        fn_index: HashMap::new(),
        imports: Vec::new(),
        unit_imports: vec![HashMap::new(); units.len()],
    };

    for (unit_idx, unit) in units.iter().enumerate() {
        for decl in unit.functions() {
            if !is_active(decl, flags, interner) {
                continue;
            }
            if scope.fn_index.contains_key(&decl.name) {
                sink.emit(Diagnostic::error(
                    DiagnosticCode::DUPLICATE_DEFINITION,
                    format!(
                        "function `{}` is defined more than once",
                        interner.resolve(decl.name)
                    ),
                    decl.name_span,
                ));
                continue;
            }
            scope
                .fn_index
                .insert(decl.name, scope.functions.len() as u32);
            scope.functions.push(LiveFn {
                unit: unit_idx,
                decl,
            });
        }
    }

    let mut import_index: HashMap<(String, String), u32> = HashMap::new();
    for (unit_idx, unit) in units.iter().enumerate() {
        for decl in unit.uses() {
            let reference = interner.resolve(decl.reference);
            let symbol = interner.resolve(decl.symbol);

            let Some(module) = refs.get(reference) else {
                sink.emit(Diagnostic::error(
                    DiagnosticCode::UNRESOLVED_REFERENCE,
                    format!("unresolved reference `{reference}`"),
                    decl.reference_span,
                ));
                continue;
            };
            let export = match module.accessible(symbol) {
                None => {
                    sink.emit(Diagnostic::error(
                        DiagnosticCode::UNRESOLVED_SYMBOL,
                        format!("`{reference}` has no symbol `{symbol}`"),
                        decl.symbol_span,
                    ));
                    continue;
                }
                Some(Err(_)) => {
                    sink.emit(
                        Diagnostic::error(
                            DiagnosticCode::INACCESSIBLE_SYMBOL,
                            format!("`{symbol}` is internal to `{reference}`"),
                            decl.symbol_span,
                        )
                        .with_note(format!(
                            "grant access with #![access_internals(\"{reference}\")]"
                        )),
                    );
                    continue;
                }
                Some(Ok(export)) => export,
            };

            if scope.unit_imports[unit_idx].contains_key(&decl.symbol) {
                sink.emit(Diagnostic::error(
                    DiagnosticCode::DUPLICATE_DEFINITION,
                    format!("`{symbol}` is imported more than once"),
                    decl.span,
                ));
                continue;
            }
            if scope.fn_index.contains_key(&decl.symbol) {
                sink.emit(Diagnostic::error(
                    DiagnosticCode::DUPLICATE_DEFINITION,
                    format!("import `{symbol}` conflicts with a function of the same name"),
                    decl.span,
                ));
                continue;
            }

            let key = (reference.to_string(), symbol.to_string());
            let index = *import_index.entry(key).or_insert_with(|| {
                scope.imports.push(Import {
                    module: reference.to_string(),
                    symbol: symbol.to_string(),
                    arity: export.arity,
                });
                (scope.imports.len() - 1) as u32
            });
            scope.unit_imports[unit_idx].insert(
                decl.symbol,
                ImportBinding {
                    index,
                    arity: export.arity,
                    span: decl.span,
                },
            );
        }
    }

    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;
    use std::sync::Arc;
    use tinker_module::{ModuleImage, Visibility};

    fn refs() -> ReferenceSet {
        let mut set = ReferenceSet::new();
        set.insert(Arc::new(
            ModuleImage::new("host_core")
                .with_export("log", 1, Visibility::Public)
                .with_export("raw_handle", 0, Visibility::Internal),
        ));
        set
    }

    fn codes(sources: &[&str], refs: &ReferenceSet, flags: &[&str]) -> Vec<String> {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let units: Vec<SourceUnit> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| parse_source(&format!("u{i}.tks"), s, &interner, &sink).1)
            .collect();
        let unit_refs: Vec<&SourceUnit> = units.iter().collect();
        let flags: BTreeSet<String> = flags.iter().map(|f| f.to_string()).collect();
        collect(&unit_refs, refs, &flags, &interner, &sink);
        sink.take_all().iter().map(|d| d.code.to_string()).collect()
    }

    #[test]
    fn clean_module() {
        assert!(codes(&["use host_core::log;\nfn f() { log(1); }"], &refs(), &[]).is_empty());
    }

    #[test]
    fn duplicate_function_across_units() {
        let found = codes(&["fn f() { }", "fn f() { }"], &refs(), &[]);
        assert_eq!(found, vec!["E106"]);
    }

    #[test]
    fn inactive_cfg_does_not_collide() {
        let src = "#[cfg(DEBUG)]\nfn f() { }\nfn f() { }";
        assert!(codes(&[src], &refs(), &["TINKER"]).is_empty());
        assert_eq!(codes(&[src], &refs(), &["DEBUG"]), vec!["E106"]);
    }

    #[test]
    fn unresolved_reference_and_symbol() {
        let found = codes(
            &["use host_ui::draw;\nuse host_core::missing;"],
            &refs(),
            &[],
        );
        assert_eq!(found, vec!["E101", "E102"]);
    }

    #[test]
    fn internal_symbol_needs_access() {
        let src = "use host_core::raw_handle;";
        assert_eq!(codes(&[src], &refs(), &[]), vec!["E103"]);
        let mut publicized = refs();
        publicized.publicize("host_core");
        assert!(codes(&[src], &publicized, &[]).is_empty());
    }

    #[test]
    fn import_conflicting_with_function() {
        let found = codes(&["use host_core::log;\nfn log(x) { }"], &refs(), &[]);
        assert_eq!(found, vec!["E106"]);
    }

    #[test]
    fn imports_deduplicated_across_units() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let a = parse_source("a.tks", "use host_core::log;", &interner, &sink).1;
        let b = parse_source("b.tks", "use host_core::log;", &interner, &sink).1;
        let scope = collect(&[&a, &b], &refs(), &BTreeSet::new(), &interner, &sink);
        assert_eq!(scope.imports.len(), 1);
        assert_eq!(scope.unit_imports[0].len(), 1);
        assert_eq!(scope.unit_imports[1].len(), 1);
    }
}
