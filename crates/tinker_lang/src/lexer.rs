//! Lexical analyzer for Tinker script.
//!
//! Converts source text into [`Token`]s. Whitespace, `//` line comments and
//! `/* */` block comments are skipped. Errors are reported to the
//! [`DiagnosticSink`] with code `E001` and produce [`TokenKind::Error`] tokens.

use crate::token::{lookup_keyword, Token, TokenKind};
use tinker_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tinker_source::{FileId, Span};

/// Lexes the given source text into a vector of tokens.
///
/// The returned vector always ends with a [`TokenKind::Eof`] token.
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        sink,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, msg: impl Into<String>, span: Span) {
        self.sink
            .emit(Diagnostic::error(DiagnosticCode::LEXICAL, msg, span));
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        self.error("unterminated block comment", self.span_from(start));
                        break;
                    }
                    if self.peek() == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let c = self.peek();

        if c.is_ascii_alphabetic() || c == b'_' {
            return self.lex_word(start);
        }
        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == b'"' {
            return self.lex_string(start);
        }

        let (kind, len) = match (c, self.peek_at(1)) {
            (b':', b':') => (TokenKind::ColonColon, 2),
            (b'=', b'=') => (TokenKind::EqEq, 2),
            (b'!', b'=') => (TokenKind::BangEq, 2),
            (b'<', b'=') => (TokenKind::Le, 2),
            (b'>', b'=') => (TokenKind::Ge, 2),
            (b'&', b'&') => (TokenKind::AndAnd, 2),
            (b'|', b'|') => (TokenKind::OrOr, 2),
            (b'(', _) => (TokenKind::LeftParen, 1),
            (b')', _) => (TokenKind::RightParen, 1),
            (b'{', _) => (TokenKind::LeftBrace, 1),
            (b'}', _) => (TokenKind::RightBrace, 1),
            (b'[', _) => (TokenKind::LeftBracket, 1),
            (b']', _) => (TokenKind::RightBracket, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b';', _) => (TokenKind::Semicolon, 1),
            (b'#', _) => (TokenKind::Hash, 1),
            (b'!', _) => (TokenKind::Bang, 1),
            (b'=', _) => (TokenKind::Assign, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            _ => {
                self.skip_invalid_char();
                let span = self.span_from(start);
                let text = String::from_utf8_lossy(&self.source[start..self.pos]);
                self.error(format!("unexpected character '{text}'"), span);
                return Token {
                    kind: TokenKind::Error,
                    span,
                };
            }
        };
        self.pos += len;
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    /// Skips one UTF-8 encoded character.
    fn skip_invalid_char(&mut self) {
        self.pos += 1;
        while self.pos < self.source.len() && (self.source[self.pos] & 0xC0) == 0x80 {
            self.pos += 1;
        }
    }

    fn lex_word(&mut self, start: usize) -> Token {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        Token {
            kind: lookup_keyword(text).unwrap_or(TokenKind::Ident),
            span: self.span_from(start),
        }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek().is_ascii_alphabetic() || self.peek() == b'_' {
            while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                self.pos += 1;
            }
            let span = self.span_from(start);
            self.error("invalid suffix on integer literal", span);
            return Token {
                kind: TokenKind::Error,
                span,
            };
        }
        Token {
            kind: TokenKind::Int,
            span: self.span_from(start),
        }
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1;
        let mut valid = true;
        loop {
            match self.peek() {
                0 if self.pos >= self.source.len() => {
                    self.error("unterminated string literal", self.span_from(start));
                    return Token {
                        kind: TokenKind::Error,
                        span: self.span_from(start),
                    };
                }
                b'\n' => {
                    self.error("unterminated string literal", self.span_from(start));
                    return Token {
                        kind: TokenKind::Error,
                        span: self.span_from(start),
                    };
                }
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    let esc_start = self.pos;
                    self.pos += 1;
                    match self.peek() {
                        b'"' | b'\\' | b'n' | b't' => self.pos += 1,
                        _ => {
                            if self.pos < self.source.len() {
                                self.skip_invalid_char();
                            }
                            self.error("unknown escape sequence", self.span_from(esc_start));
                            valid = false;
                        }
                    }
                }
                _ => self.pos += 1,
            }
        }
        Token {
            kind: if valid { TokenKind::Str } else { TokenKind::Error },
            span: self.span_from(start),
        }
    }
}

/// Decodes the escapes of a string literal's text, quotes included.
///
/// The lexer has already rejected unknown escapes, so they are kept verbatim.
pub fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let sink = DiagnosticSink::new();
        lex(source, FileId::from_raw(0), &sink)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_errors(source: &str) -> Vec<String> {
        let sink = DiagnosticSink::new();
        lex(source, FileId::from_raw(0), &sink);
        sink.take_all().into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn function_header() {
        assert_eq!(
            kinds("pub fn area(w, h) {"),
            vec![
                TokenKind::Pub,
                TokenKind::Fn,
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && || ::"),
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::ColonColon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn inner_attribute_tokens() {
        assert_eq!(
            kinds("#![access_internals(\"host_core\")]"),
            vec![
                TokenKind::Hash,
                TokenKind::Bang,
                TokenKind::LeftBracket,
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::Str,
                TokenKind::RightParen,
                TokenKind::RightBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// line\nlet /* block\n over lines */ x"),
            vec![TokenKind::Let, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment() {
        let errors = lex_errors("let x; /* never closed");
        assert_eq!(errors, vec!["unterminated block comment"]);
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(kinds("\"abc\nx")[0], TokenKind::Error);
        assert_eq!(lex_errors("\"abc"), vec!["unterminated string literal"]);
    }

    #[test]
    fn bad_escape_reported() {
        assert_eq!(lex_errors(r#""a\qb""#), vec!["unknown escape sequence"]);
    }

    #[test]
    fn unexpected_character() {
        let errors = lex_errors("let x = 1 @ 2;");
        assert_eq!(errors, vec!["unexpected character '@'"]);
    }

    #[test]
    fn number_with_suffix_is_error() {
        assert_eq!(kinds("12abc")[0], TokenKind::Error);
    }

    #[test]
    fn unescape_handles_all_escapes() {
        assert_eq!(unescape(r#""a\"b\\c\nd\te""#), "a\"b\\c\nd\te");
        assert_eq!(unescape("\"plain\""), "plain");
    }
}
