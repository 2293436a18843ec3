//! AST node types for Tinker script.

use serde::{Deserialize, Serialize};
use tinker_common::Ident;
use tinker_module::{BinOp, UnOp};
use tinker_source::{FileId, Span};

/// One parsed source unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceUnit {
    /// The file this unit was parsed from.
    pub file: FileId,
    /// File-leading `#![...]` attributes.
    pub attributes: Vec<InnerAttribute>,
    /// Top-level items in source order.
    pub items: Vec<Item>,
}

/// A file-level attribute such as `#![access_internals("host_core")]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InnerAttribute {
    /// Attribute name.
    pub name: Ident,
    /// String arguments.
    pub args: Vec<StringLit>,
    /// Span of the whole attribute.
    pub span: Span,
}

/// A string literal after escape decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringLit {
    /// Decoded value.
    pub value: String,
    /// Span of the literal, quotes included.
    pub span: Span,
}

/// A top-level item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Item {
    /// `use reference::symbol;`
    Use(UseDecl),
    /// A function definition.
    Fn(FnDecl),
    /// An unparseable region, kept so later passes can skip it.
    Error(Span),
}

/// An import of one symbol from a reference module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UseDecl {
    /// Reference module name.
    pub reference: Ident,
    /// Span of the reference name.
    pub reference_span: Span,
    /// Imported symbol name.
    pub symbol: Ident,
    /// Span of the symbol name.
    pub symbol_span: Span,
    /// Span of the whole declaration.
    pub span: Span,
}

/// A `#[cfg(FLAG)]` condition on a function.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CfgAttr {
    /// The flag that must be defined for the function to be compiled.
    pub flag: Ident,
    /// Span of the attribute.
    pub span: Span,
}

/// A named parameter.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name.
    pub name: Ident,
    /// Span of the name.
    pub span: Span,
}

/// A function definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FnDecl {
    /// Function name.
    pub name: Ident,
    /// Span of the name.
    pub name_span: Span,
    /// Declared with `pub`.
    pub public: bool,
    /// Conditional compilation attribute, if any.
    pub cfg: Option<CfgAttr>,
    /// Parameters in order.
    pub params: Vec<Param>,
    /// Function body.
    pub body: Block,
    /// Span of the whole definition.
    pub span: Span,
}

/// A braced statement list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Statements in order.
    pub stmts: Vec<Stmt>,
    /// Span from `{` to `}`.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = value;`
    Let {
        /// Bound name.
        name: Ident,
        /// Span of the name.
        name_span: Span,
        /// Initializer.
        value: Expr,
        /// Span of the statement.
        span: Span,
    },
    /// `name = value;`
    Assign {
        /// Target variable.
        name: Ident,
        /// Span of the name.
        name_span: Span,
        /// New value.
        value: Expr,
        /// Span of the statement.
        span: Span,
    },
    /// `return [value];`
    Return {
        /// Returned value, zero when absent.
        value: Option<Expr>,
        /// Span of the statement.
        span: Span,
    },
    /// `if cond { } [else { }]`. `else if` is an else block holding one `If`.
    If {
        /// Condition.
        condition: Expr,
        /// Taken when the condition is true.
        then_block: Block,
        /// Taken otherwise.
        else_block: Option<Block>,
        /// Span of the statement.
        span: Span,
    },
    /// `while cond { }`
    While {
        /// Loop condition.
        condition: Expr,
        /// Loop body.
        body: Block,
        /// Span of the statement.
        span: Span,
    },
    /// An expression evaluated for its effect.
    Expr {
        /// The expression.
        expr: Expr,
        /// Span of the statement, semicolon included.
        span: Span,
    },
    /// An unparseable statement.
    Error(Span),
}

impl Stmt {
    /// Returns the span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Expr { span, .. } => *span,
            Stmt::Error(span) => *span,
        }
    }
}

/// An expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal.
    Int {
        /// Value.
        value: i64,
        /// Span.
        span: Span,
    },
    /// `true` or `false`.
    Bool {
        /// Value.
        value: bool,
        /// Span.
        span: Span,
    },
    /// String literal.
    Str(StringLit),
    /// Variable reference.
    Var {
        /// Variable name.
        name: Ident,
        /// Span.
        span: Span,
    },
    /// Function call.
    Call {
        /// Called function or imported symbol.
        callee: Ident,
        /// Span of the callee name.
        callee_span: Span,
        /// Arguments.
        args: Vec<Expr>,
        /// Span of the whole call.
        span: Span,
    },
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnOp,
        /// Operand.
        operand: Box<Expr>,
        /// Span.
        span: Span,
    },
    /// Infix operator.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Span.
        span: Span,
    },
    /// An unparseable expression.
    Error(Span),
}

impl Expr {
    /// Returns the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Var { span, .. }
            | Expr::Call { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. } => *span,
            Expr::Str(lit) => lit.span,
            Expr::Error(span) => *span,
        }
    }
}

impl SourceUnit {
    /// Iterates over the function definitions of this unit.
    pub fn functions(&self) -> impl Iterator<Item = &FnDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Fn(f) => Some(f),
            _ => None,
        })
    }

    /// Iterates over the `use` declarations of this unit.
    pub fn uses(&self) -> impl Iterator<Item = &UseDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Use(u) => Some(u),
            _ => None,
        })
    }
}
