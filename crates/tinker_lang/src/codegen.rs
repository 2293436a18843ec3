//! Lowering of function bodies to stack-machine code.
//!
//! Name resolution inside bodies happens here: unknown variables and
//! functions, and arity mismatches, are reported while the code is emitted.

use std::collections::{HashMap, HashSet};

use tinker_common::{Ident, Interner};
use tinker_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tinker_module::{Function, FunctionLines, LineEntry, Op};
use tinker_source::{SourceDb, Span};

use crate::ast::{Block, Expr, FnDecl, Stmt};
use crate::fold;
use crate::resolve::ModuleScope;

/// Output of code generation for a whole module.
pub(crate) struct Generated {
    pub functions: Vec<Function>,
    pub strings: Vec<String>,
    /// One line table per function when line tables were requested.
    pub lines: Vec<FunctionLines>,
    /// `(unit, symbol)` pairs of imports that were called.
    pub used_imports: HashSet<(usize, Ident)>,
}

/// Options that shape the emitted code.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CodegenOptions {
    pub optimize: bool,
    pub line_tables: bool,
}

#[derive(Default)]
struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }
}

/// Lowers every live function of `scope`.
pub(crate) fn generate(
    scope: &ModuleScope<'_>,
    db: &SourceDb,
    options: CodegenOptions,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> Generated {
    let mut strings = StringTable::default();
    let mut used_imports = HashSet::new();
    let mut functions = Vec::with_capacity(scope.functions.len());
    let mut lines = Vec::new();

    for (index, live) in scope.functions.iter().enumerate() {
        let mut lowering = FnLowering {
            scope,
            unit: live.unit,
            db,
            options,
            interner,
            sink,
            strings: &mut strings,
            used_imports: &mut used_imports,
            code: Vec::new(),
            scopes: Vec::new(),
            next_slot: 0,
            lines: Vec::new(),
        };
        let function = lowering.lower_fn(live.decl);
        if options.line_tables {
            lines.push(FunctionLines {
                function: index as u32,
                entries: std::mem::take(&mut lowering.lines),
            });
        }
        functions.push(function);
    }

    Generated {
        functions,
        strings: strings.strings,
        lines,
        used_imports,
    }
}

struct FnLowering<'a, 's> {
    scope: &'a ModuleScope<'s>,
    unit: usize,
    db: &'a SourceDb,
    options: CodegenOptions,
    interner: &'a Interner,
    sink: &'a DiagnosticSink,
    strings: &'a mut StringTable,
    used_imports: &'a mut HashSet<(usize, Ident)>,
    code: Vec<Op>,
    scopes: Vec<Vec<(Ident, u16)>>,
    next_slot: u16,
    lines: Vec<LineEntry>,
}

impl FnLowering<'_, '_> {
    fn lower_fn(&mut self, decl: &FnDecl) -> Function {
        self.scopes.push(Vec::new());
        for param in &decl.params {
            if self.scopes[0].iter().any(|(name, _)| *name == param.name) {
                self.sink.emit(Diagnostic::error(
                    DiagnosticCode::DUPLICATE_DEFINITION,
                    format!(
                        "parameter `{}` is declared more than once",
                        self.interner.resolve(param.name)
                    ),
                    param.span,
                ));
            }
            self.declare(param.name);
        }
        self.lower_block(&decl.body);
        self.scopes.pop();

        self.code.push(Op::PushInt(0));
        self.code.push(Op::Return);

        Function {
            name: self.interner.resolve(decl.name).to_string(),
            arity: decl.params.len().min(usize::from(u8::MAX)) as u8,
            locals: self.next_slot,
            code: std::mem::take(&mut self.code),
        }
    }

    fn declare(&mut self, name: Ident) -> u16 {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.saturating_add(1);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name, slot));
        }
        slot
    }

    fn lookup(&self, name: Ident) -> Option<u16> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(n, _)| *n == name)
            .map(|(_, slot)| *slot)
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn mark_line(&mut self, span: Span) {
        if !self.options.line_tables || span.is_dummy() {
            return;
        }
        let line = self.db.get_file(span.file).line_col(span.start).line + 1;
        let unit = self.unit as u32;
        if self
            .lines
            .last()
            .is_some_and(|last| last.line == line && last.unit == unit)
        {
            return;
        }
        let offset = self.here();
        if let Some(last) = self.lines.last_mut() {
            if last.offset == offset {
                last.line = line;
                last.unit = unit;
                return;
            }
        }
        self.lines.push(LineEntry { offset, unit, line });
    }

    fn unknown(&self, what: &str, name: Ident, span: Span) {
        self.sink.emit(Diagnostic::error(
            DiagnosticCode::UNKNOWN_NAME,
            format!("unknown {what} `{}`", self.interner.resolve(name)),
            span,
        ));
    }

    fn lower_block(&mut self, block: &Block) {
        self.scopes.push(Vec::new());
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        self.mark_line(stmt.span());
        match stmt {
            Stmt::Let { name, value, .. } => {
                self.lower_expr(value);
                let slot = self.declare(*name);
                self.code.push(Op::StoreLocal(slot));
            }
            Stmt::Assign {
                name,
                name_span,
                value,
                ..
            } => {
                self.lower_expr(value);
                match self.lookup(*name) {
                    Some(slot) => self.code.push(Op::StoreLocal(slot)),
                    None => self.unknown("variable", *name, *name_span),
                }
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.lower_expr(expr),
                    None => self.code.push(Op::PushInt(0)),
                }
                self.code.push(Op::Return);
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.lower_expr(condition);
                let to_else = self.here();
                self.code.push(Op::JumpIfFalse(0));
                self.lower_block(then_block);
                match else_block {
                    Some(else_block) => {
                        let to_end = self.here();
                        self.code.push(Op::Jump(0));
                        self.patch(to_else);
                        self.lower_block(else_block);
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                let top = self.here();
                self.lower_expr(condition);
                let to_end = self.here();
                self.code.push(Op::JumpIfFalse(0));
                self.lower_block(body);
                self.code.push(Op::Jump(top));
                self.patch(to_end);
            }
            Stmt::Expr { expr, .. } => {
                self.lower_expr(expr);
                self.code.push(Op::Pop);
            }
            Stmt::Error(_) => {}
        }
    }

    /// Points the jump at `at` to the current offset.
    fn patch(&mut self, at: u32) {
        let target = self.here();
        match &mut self.code[at as usize] {
            Op::Jump(t) | Op::JumpIfFalse(t) => *t = target,
            _ => {}
        }
    }

    fn lower_expr(&mut self, expr: &Expr) {
        if self.options.optimize {
            if let Some(value) = fold::evaluate(expr) {
                self.code.push(value.to_op());
                return;
            }
        }
        match expr {
            Expr::Int { value, .. } => self.code.push(Op::PushInt(*value)),
            Expr::Bool { value, .. } => self.code.push(Op::PushBool(*value)),
            Expr::Str(lit) => {
                let index = self.strings.intern(&lit.value);
                self.code.push(Op::PushStr(index));
            }
            Expr::Var { name, span } => match self.lookup(*name) {
                Some(slot) => self.code.push(Op::LoadLocal(slot)),
                None => self.unknown("variable", *name, *span),
            },
            Expr::Call {
                callee,
                callee_span,
                args,
                span,
            } => {
                for arg in args {
                    self.lower_expr(arg);
                }
                self.lower_call(*callee, *callee_span, args.len(), *span);
            }
            Expr::Unary { op, operand, .. } => {
                self.lower_expr(operand);
                self.code.push(Op::Unary(*op));
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.lower_expr(lhs);
                self.lower_expr(rhs);
                self.code.push(Op::Binary(*op));
            }
            Expr::Error(_) => self.code.push(Op::PushInt(0)),
        }
    }

    fn lower_call(&mut self, callee: Ident, callee_span: Span, argc: usize, span: Span) {
        let (expected, op) = if let Some(&function) = self.scope.fn_index.get(&callee) {
            let decl = self.scope.functions[function as usize].decl;
            (
                decl.params.len(),
                Op::Call {
                    function,
                    argc: argc.min(255) as u8,
                },
            )
        } else if let Some(binding) = self.scope.unit_imports[self.unit].get(&callee) {
            self.used_imports.insert((self.unit, callee));
            (
                usize::from(binding.arity),
                Op::CallImport {
                    import: binding.index,
                    argc: argc.min(255) as u8,
                },
            )
        } else {
            self.unknown("function", callee, callee_span);
            return;
        };

        if expected != argc {
            self.sink.emit(Diagnostic::error(
                DiagnosticCode::ARITY_MISMATCH,
                format!(
                    "`{}` takes {expected} argument{} but {argc} {} supplied",
                    self.interner.resolve(callee),
                    if expected == 1 { "" } else { "s" },
                    if argc == 1 { "was" } else { "were" },
                ),
                span,
            ));
        }
        self.code.push(op);
    }
}
