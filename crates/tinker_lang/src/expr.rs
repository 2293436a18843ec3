//! Pratt expression parser for Tinker script.
//!
//! | BP (L,R) | Operators |
//! |----------|-----------|
//! | (1,2)    | `\|\|` |
//! | (3,4)    | `&&` |
//! | (5,6)    | `==` `!=` |
//! | (7,8)    | `<` `<=` `>` `>=` |
//! | (9,10)   | `+` `-` |
//! | (11,12)  | `*` `/` `%` |
//! | prefix 13 | `-` `!` |

use crate::ast::*;
use crate::lexer::unescape;
use crate::parser::Parser;
use crate::token::TokenKind;
use tinker_diagnostics::{Diagnostic, DiagnosticCode};
use tinker_module::{BinOp, UnOp};

const PREFIX_BP: u8 = 13;

fn infix_op(kind: TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::OrOr => BinOp::Or,
        TokenKind::AndAnd => BinOp::And,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::BangEq => BinOp::Ne,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Ge => BinOp::Ge,
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Rem,
        _ => return None,
    })
}

/// Binding power for binary operators. Returns (left_bp, right_bp).
fn infix_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 2),
        BinOp::And => (3, 4),
        BinOp::Eq | BinOp::Ne => (5, 6),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (7, 8),
        BinOp::Add | BinOp::Sub => (9, 10),
        BinOp::Mul | BinOp::Div | BinOp::Rem => (11, 12),
    }
}

impl Parser<'_> {
    /// Parses an expression.
    pub fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let mut lhs = self.parse_prefix_expr();

        while let Some(op) = infix_op(self.current()) {
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_prefix_expr(&mut self) -> Expr {
        let op = match self.current() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                let start = self.current_span();
                self.advance();
                let operand = self.parse_expr_bp(PREFIX_BP);
                let span = start.to(operand.span());
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    span,
                }
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let span = self.current_span();
        match self.current() {
            TokenKind::Int => {
                let text = self.current_text();
                self.advance();
                match text.parse::<i64>() {
                    Ok(value) => Expr::Int { value, span },
                    Err(_) => {
                        self.sink.emit(Diagnostic::error(
                            DiagnosticCode::LEXICAL,
                            format!("integer literal `{text}` is out of range"),
                            span,
                        ));
                        Expr::Error(span)
                    }
                }
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                Expr::Bool { value, span }
            }
            TokenKind::Str => {
                let value = unescape(self.current_text());
                self.advance();
                Expr::Str(StringLit { value, span })
            }
            TokenKind::Ident => {
                let name = self.interner.get_or_intern(self.current_text());
                self.advance();
                if self.at(TokenKind::LeftParen) {
                    self.parse_call(name, span)
                } else {
                    Expr::Var { name, span }
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RightParen);
                inner
            }
            _ => {
                self.expected("expression");
                // Leave `;` and `}` for the statement parser to resync on.
                if !matches!(
                    self.current(),
                    TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
                ) {
                    self.advance();
                }
                Expr::Error(span)
            }
        }
    }

    fn parse_call(&mut self, callee: tinker_common::Ident, callee_span: tinker_source::Span) -> Expr {
        self.advance(); // (
        let mut args = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at_eof() {
            args.push(self.parse_expr());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen);
        Expr::Call {
            callee,
            callee_span,
            args,
            span: callee_span.to(self.prev_span()),
        }
    }
}
