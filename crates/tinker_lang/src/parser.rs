//! Core parser infrastructure and top-level Tinker script rules.
//!
//! [`Parser`] provides the primitive operations (advance, expect, eat) and
//! error recovery. Items, attributes and `use` declarations are parsed here;
//! statements and expressions live in `stmt` and `expr`.

use crate::ast::*;
use crate::lexer::unescape;
use crate::token::{Token, TokenKind};
use tinker_common::{Ident, Interner};
use tinker_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tinker_source::{FileId, Span};

/// Name of the inner attribute that grants internals access to a reference.
pub const ACCESS_INTERNALS: &str = "access_internals";

/// Name of the function attribute for conditional compilation.
pub const CFG: &str = "cfg";

/// A recursive descent parser over a lexed token stream.
///
/// Errors go to the diagnostic sink with code `E002`; the AST keeps `Error`
/// nodes in their place so later passes can continue.
pub struct Parser<'src> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) source: &'src str,
    file: FileId,
    pub(crate) interner: &'src Interner,
    pub(crate) sink: &'src DiagnosticSink,
}

impl<'src> Parser<'src> {
    /// Creates a parser over tokens lexed from `source`.
    pub fn new(
        tokens: Vec<Token>,
        source: &'src str,
        file: FileId,
        interner: &'src Interner,
        sink: &'src DiagnosticSink,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            file,
            interner,
            sink,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    pub(crate) fn current(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    pub(crate) fn current_text(&self) -> &'src str {
        let span = self.current_span();
        &self.source[span.start as usize..span.end as usize]
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current() == TokenKind::Eof
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects `kind`; emits an error and returns `false` if it is absent.
    ///
    /// A missing `;` is reported right after the token it should follow.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else if kind == TokenKind::Semicolon && self.pos > 0 {
            self.expected_after_prev(kind.describe());
            false
        } else {
            self.expected(kind.describe());
            false
        }
    }

    /// Expects an identifier and returns it with its span.
    pub(crate) fn expect_ident(&mut self) -> Option<(Ident, Span)> {
        if self.at(TokenKind::Ident) {
            let span = self.current_span();
            let ident = self.interner.get_or_intern(self.current_text());
            self.advance();
            Some((ident, span))
        } else {
            self.expected("identifier");
            None
        }
    }

    // ========================================================================
    // Error handling and recovery
    // ========================================================================

    pub(crate) fn error_at(&self, msg: impl Into<String>, span: Span) {
        self.sink
            .emit(Diagnostic::error(DiagnosticCode::SYNTAX, msg, span));
    }

    pub(crate) fn expected(&self, what: &str) {
        // The lexer already reported invalid tokens.
        if self.at(TokenKind::Error) {
            return;
        }
        self.error_at(
            format!("expected {what}, found {}", self.current().describe()),
            self.current_span(),
        );
    }

    fn expected_after_prev(&self, what: &str) {
        if self.at(TokenKind::Error) {
            return;
        }
        let prev = self.prev_span();
        self.error_at(
            format!("expected {what}, found {}", self.current().describe()),
            Span::new(prev.file, prev.end, prev.end),
        );
    }

    /// Skips to just past the next `;`, stopping early at `}`.
    pub(crate) fn recover_to_semicolon(&mut self) {
        while !self.at_eof() && !self.at(TokenKind::Semicolon) && !self.at(TokenKind::RightBrace)
        {
            self.advance();
        }
        self.eat(TokenKind::Semicolon);
    }

    /// Skips to the next token that can start a top-level item.
    fn recover_to_item(&mut self) {
        while !self.at_eof() {
            match self.current() {
                TokenKind::Use | TokenKind::Fn | TokenKind::Pub | TokenKind::Hash => return,
                _ => self.advance(),
            }
        }
    }

    // ========================================================================
    // Top-level parsing
    // ========================================================================

    /// Parses a complete source unit.
    pub fn parse_source_unit(&mut self) -> SourceUnit {
        let mut attributes = Vec::new();
        while self.at(TokenKind::Hash) && self.peek_kind(1) == TokenKind::Bang {
            if let Some(attr) = self.parse_inner_attribute() {
                attributes.push(attr);
            }
        }

        let mut items = Vec::new();
        while !self.at_eof() {
            let start = self.pos;
            let item = self.parse_item();
            if self.pos == start {
                // No progress; skip the offending token so the loop terminates.
                self.advance();
            }
            items.push(item);
        }

        SourceUnit {
            file: self.file,
            attributes,
            items,
        }
    }

    fn parse_inner_attribute(&mut self) -> Option<InnerAttribute> {
        let start = self.current_span();
        self.advance(); // #
        self.advance(); // !
        if !self.expect(TokenKind::LeftBracket) {
            self.recover_to_item();
            return None;
        }
        let (name, name_span) = match self.expect_ident() {
            Some(n) => n,
            None => {
                self.recover_to_item();
                return None;
            }
        };
        let mut args = Vec::new();
        if self.eat(TokenKind::LeftParen) {
            while !self.at(TokenKind::RightParen) && !self.at_eof() {
                if self.at(TokenKind::Str) {
                    args.push(StringLit {
                        value: unescape(self.current_text()),
                        span: self.current_span(),
                    });
                    self.advance();
                } else {
                    self.expected("string literal");
                    self.recover_to_item();
                    return None;
                }
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightParen);
        }
        self.expect(TokenKind::RightBracket);
        let span = start.to(self.prev_span());

        if self.interner.resolve(name) != ACCESS_INTERNALS {
            self.error_at(
                format!("unknown attribute `{}`", self.interner.resolve(name)),
                name_span,
            );
            return None;
        }
        if args.len() != 1 {
            self.error_at(
                format!("`{ACCESS_INTERNALS}` takes exactly one reference name"),
                span,
            );
            return None;
        }
        Some(InnerAttribute { name, args, span })
    }

    fn parse_item(&mut self) -> Item {
        let start = self.current_span();
        match self.current() {
            TokenKind::Use => self.parse_use(),
            TokenKind::Hash | TokenKind::Pub | TokenKind::Fn => {
                let cfg = if self.at(TokenKind::Hash) {
                    self.parse_cfg_attribute()
                } else {
                    None
                };
                match self.parse_fn(cfg) {
                    Some(f) => Item::Fn(f),
                    None => {
                        self.recover_to_item();
                        Item::Error(start.to(self.prev_span()))
                    }
                }
            }
            _ => {
                self.expected("`use` or `fn`");
                self.advance();
                self.recover_to_item();
                Item::Error(start.to(self.prev_span()))
            }
        }
    }

    fn parse_use(&mut self) -> Item {
        let start = self.current_span();
        self.advance(); // use
        match self.parse_use_path() {
            Some((reference, reference_span, symbol, symbol_span)) => Item::Use(UseDecl {
                reference,
                reference_span,
                symbol,
                symbol_span,
                span: start.to(self.prev_span()),
            }),
            None => {
                self.recover_to_item();
                Item::Error(start.to(self.prev_span()))
            }
        }
    }

    /// Parses `reference::symbol;` after the `use` keyword.
    fn parse_use_path(&mut self) -> Option<(Ident, Span, Ident, Span)> {
        let (reference, reference_span) = self.expect_ident()?;
        if !self.expect(TokenKind::ColonColon) {
            return None;
        }
        let (symbol, symbol_span) = self.expect_ident()?;
        if !self.expect(TokenKind::Semicolon) {
            return None;
        }
        Some((reference, reference_span, symbol, symbol_span))
    }

    /// Parses `#[cfg(FLAG)]` in front of a function.
    fn parse_cfg_attribute(&mut self) -> Option<CfgAttr> {
        let start = self.current_span();
        if self.peek_kind(1) == TokenKind::Bang {
            self.error_at("inner attributes must come before any item", start);
            self.advance();
            self.advance();
            return None;
        }
        self.advance(); // #
        if !self.expect(TokenKind::LeftBracket) {
            return None;
        }
        let (name, name_span) = self.expect_ident()?;
        let known = self.interner.resolve(name) == CFG;
        if !known {
            self.error_at(
                format!("unknown attribute `{}`", self.interner.resolve(name)),
                name_span,
            );
        }
        let mut flag = None;
        if self.expect(TokenKind::LeftParen) {
            flag = self.expect_ident().map(|(f, _)| f);
            self.expect(TokenKind::RightParen);
        }
        self.expect(TokenKind::RightBracket);
        let span = start.to(self.prev_span());
        flag.filter(|_| known).map(|flag| CfgAttr { flag, span })
    }

    fn parse_fn(&mut self, cfg: Option<CfgAttr>) -> Option<FnDecl> {
        let start = cfg.map_or_else(|| self.current_span(), |c| c.span);
        let public = self.eat(TokenKind::Pub);
        if !self.expect(TokenKind::Fn) {
            return None;
        }
        let (name, name_span) = self.expect_ident()?;
        if !self.expect(TokenKind::LeftParen) {
            return None;
        }
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at_eof() {
            let (pname, pspan) = self.expect_ident()?;
            params.push(Param {
                name: pname,
                span: pspan,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !self.expect(TokenKind::RightParen) {
            return None;
        }
        if params.len() > usize::from(u8::MAX) {
            self.error_at("too many parameters", name_span);
        }
        if !self.at(TokenKind::LeftBrace) {
            self.expected("`{`");
            return None;
        }
        let body = self.parse_block();
        Some(FnDecl {
            name,
            name_span,
            public,
            cfg,
            params,
            span: start.to(body.span),
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lexer;
    use tinker_diagnostics::Diagnostic;

    pub(crate) fn parse(source: &str) -> (SourceUnit, Vec<Diagnostic>, Interner) {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let file = FileId::from_raw(0);
        let tokens = lexer::lex(source, file, &sink);
        let unit = Parser::new(tokens, source, file, &interner, &sink).parse_source_unit();
        (unit, sink.take_all(), interner)
    }

    fn parse_ok(source: &str) -> (SourceUnit, Interner) {
        let (unit, errors, interner) = parse(source);
        assert!(
            errors.is_empty(),
            "unexpected errors: {:?}",
            errors.iter().map(|e| &e.message).collect::<Vec<_>>()
        );
        (unit, interner)
    }

    #[test]
    fn empty_unit() {
        let (unit, _) = parse_ok("");
        assert!(unit.items.is_empty());
        assert!(unit.attributes.is_empty());
    }

    #[test]
    fn missing_semicolon_points_past_previous_token() {
        let source = "pub fn f() {\n  let x = 1\n  return x;\n}";
        let (_, errors, _) = parse(source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected `;`, found `return`");
        let span = errors[0].primary_span;
        assert_eq!((span.start, span.end), (24, 24));
        assert_eq!(&source[..span.start as usize], "pub fn f() {\n  let x = 1");

        let (_, errors, _) = parse("use host_core::log\npub fn f() { }");
        assert_eq!(errors[0].primary_span.start, 18);
    }

    #[test]
    fn use_and_function() {
        let (unit, interner) = parse_ok(
            "use host_core::log;\npub fn on_load(a, b) { log(a); }\nfn helper() { return 1; }",
        );
        let uses: Vec<_> = unit.uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(interner.resolve(uses[0].reference), "host_core");
        assert_eq!(interner.resolve(uses[0].symbol), "log");

        let fns: Vec<_> = unit.functions().collect();
        assert_eq!(fns.len(), 2);
        assert!(fns[0].public);
        assert_eq!(fns[0].params.len(), 2);
        assert!(!fns[1].public);
    }

    #[test]
    fn access_internals_attribute() {
        let (unit, interner) =
            parse_ok("#![access_internals(\"host_core\")]\nfn f() { }");
        assert_eq!(unit.attributes.len(), 1);
        assert_eq!(interner.resolve(unit.attributes[0].name), ACCESS_INTERNALS);
        assert_eq!(unit.attributes[0].args[0].value, "host_core");
    }

    #[test]
    fn unknown_inner_attribute_rejected() {
        let (unit, errors, _) = parse("#![no_std]\nfn f() { }");
        assert!(unit.attributes.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unknown attribute"));
    }

    #[test]
    fn cfg_attribute_on_function() {
        let (unit, interner) = parse_ok("#[cfg(DEBUG)]\nfn trace() { }");
        let f = unit.functions().next().unwrap();
        let cfg = f.cfg.unwrap();
        assert_eq!(interner.resolve(cfg.flag), "DEBUG");
    }

    #[test]
    fn missing_semicolon_after_use() {
        let (unit, errors, _) = parse("use host_core::log\nfn f() { }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, DiagnosticCode::SYNTAX);
        assert!(errors[0].message.contains("expected `;`"));
        assert!(matches!(unit.items[0], Item::Error(_)));
    }

    #[test]
    fn recovery_continues_to_next_item() {
        let (unit, errors, _) = parse("fn broken( { }\nfn good() { return 2; }");
        assert!(!errors.is_empty());
        assert_eq!(unit.functions().count(), 1);
    }

    #[test]
    fn stray_token_at_top_level() {
        let (_, errors, _) = parse("42 fn f() { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("expected `use` or `fn`"));
    }
}
