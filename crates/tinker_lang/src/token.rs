//! Token types for the Tinker script lexer.

use serde::{Deserialize, Serialize};
use tinker_source::Span;

/// A Tinker script token kind.
///
/// Literal values are not stored in the token; the parser reads them back
/// from the source text through the token's span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    // === Keywords ===
    /// `use`
    Use,
    /// `fn`
    Fn,
    /// `pub`
    Pub,
    /// `let`
    Let,
    /// `return`
    Return,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `true`
    True,
    /// `false`
    False,

    // === Literals and names ===
    /// An identifier.
    Ident,
    /// A decimal integer literal.
    Int,
    /// A double-quoted string literal, quotes included.
    Str,

    // === Punctuation ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `::`
    ColonColon,
    /// `#`
    Hash,

    // === Operators ===
    /// `!`
    Bang,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,

    // === Special ===
    /// A character sequence the lexer could not classify.
    Error,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns a short human-readable description for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Use => "`use`",
            TokenKind::Fn => "`fn`",
            TokenKind::Pub => "`pub`",
            TokenKind::Let => "`let`",
            TokenKind::Return => "`return`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::While => "`while`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer literal",
            TokenKind::Str => "string literal",
            TokenKind::LeftParen => "`(`",
            TokenKind::RightParen => "`)`",
            TokenKind::LeftBrace => "`{`",
            TokenKind::RightBrace => "`}`",
            TokenKind::LeftBracket => "`[`",
            TokenKind::RightBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::ColonColon => "`::`",
            TokenKind::Hash => "`#`",
            TokenKind::Bang => "`!`",
            TokenKind::Assign => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::BangEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::Le => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::Ge => "`>=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// A token with its kind and source location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The source span covering this token's text.
    pub span: Span,
}

/// Looks up a keyword by its text.
pub fn lookup_keyword(text: &str) -> Option<TokenKind> {
    match text {
        "use" => Some(TokenKind::Use),
        "fn" => Some(TokenKind::Fn),
        "pub" => Some(TokenKind::Pub),
        "let" => Some(TokenKind::Let),
        "return" => Some(TokenKind::Return),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(lookup_keyword("fn"), Some(TokenKind::Fn));
        assert_eq!(lookup_keyword("Fn"), None);
        assert_eq!(lookup_keyword("widget"), None);
    }

    #[test]
    fn describe_quotes_punctuation() {
        assert_eq!(TokenKind::Semicolon.describe(), "`;`");
        assert_eq!(TokenKind::Ident.describe(), "identifier");
    }
}
