//! Statement and block parsing.

use crate::ast::*;
use crate::parser::Parser;
use crate::token::TokenKind;

impl Parser<'_> {
    /// Parses `{ stmt* }`. The current token must be `{`.
    pub(crate) fn parse_block(&mut self) -> Block {
        let start = self.current_span();
        self.expect(TokenKind::LeftBrace);
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at_eof() {
            let before = self.pos;
            stmts.push(self.parse_stmt());
            if self.pos == before {
                self.advance();
            }
        }
        self.expect(TokenKind::RightBrace);
        Block {
            stmts,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_stmt(&mut self) -> Stmt {
        match self.current() {
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Ident if self.peek_kind(1) == TokenKind::Assign => self.parse_assign(),
            _ => self.parse_expr_stmt(),
        }
    }

    /// Consumes the terminating `;`, recovering if it is missing.
    fn finish_stmt(&mut self) -> bool {
        if self.expect(TokenKind::Semicolon) {
            true
        } else {
            self.recover_to_semicolon();
            false
        }
    }

    fn parse_let(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance(); // let
        let Some((name, name_span)) = self.expect_ident() else {
            self.recover_to_semicolon();
            return Stmt::Error(start.to(self.prev_span()));
        };
        if !self.expect(TokenKind::Assign) {
            self.recover_to_semicolon();
            return Stmt::Error(start.to(self.prev_span()));
        }
        let value = self.parse_expr();
        if !self.finish_stmt() {
            return Stmt::Error(start.to(self.prev_span()));
        }
        Stmt::Let {
            name,
            name_span,
            value,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_assign(&mut self) -> Stmt {
        let start = self.current_span();
        let Some((name, name_span)) = self.expect_ident() else {
            return Stmt::Error(start);
        };
        self.advance(); // =
        let value = self.parse_expr();
        if !self.finish_stmt() {
            return Stmt::Error(start.to(self.prev_span()));
        }
        Stmt::Assign {
            name,
            name_span,
            value,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_return(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance(); // return
        let value = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr())
        };
        if !self.finish_stmt() {
            return Stmt::Error(start.to(self.prev_span()));
        }
        Stmt::Return {
            value,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_if(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance(); // if
        let condition = self.parse_expr();
        if !self.at(TokenKind::LeftBrace) {
            self.expected("`{`");
            self.recover_to_semicolon();
            return Stmt::Error(start.to(self.prev_span()));
        }
        let then_block = self.parse_block();
        let else_block = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                let nested = self.parse_if();
                let span = nested.span();
                Some(Block {
                    stmts: vec![nested],
                    span,
                })
            } else if self.at(TokenKind::LeftBrace) {
                Some(self.parse_block())
            } else {
                self.expected("`{` or `if`");
                None
            }
        } else {
            None
        };
        Stmt::If {
            condition,
            then_block,
            else_block,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_while(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance(); // while
        let condition = self.parse_expr();
        if !self.at(TokenKind::LeftBrace) {
            self.expected("`{`");
            self.recover_to_semicolon();
            return Stmt::Error(start.to(self.prev_span()));
        }
        let body = self.parse_block();
        Stmt::While {
            condition,
            body,
            span: start.to(self.prev_span()),
        }
    }

    fn parse_expr_stmt(&mut self) -> Stmt {
        let start = self.current_span();
        let expr = self.parse_expr();
        if matches!(expr, Expr::Error(_)) {
            self.recover_to_semicolon();
            return Stmt::Error(start.to(self.prev_span()));
        }
        if !self.finish_stmt() {
            return Stmt::Error(start.to(self.prev_span()));
        }
        Stmt::Expr {
            expr,
            span: start.to(self.prev_span()),
        }
    }
}
