use logos::Logos;

use crate::error::SyntaxError;
use crate::token::{Token, TokenKind};

/// Tokenizes a whole compilation unit; the last token is always `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(kind) = lexer.next() {
        let span = lexer.span();
        let kind = kind.map_err(|_| {
            SyntaxError::new(format!("unexpected character `{}`", &source[span.clone()]), span.start)
        })?;
        tokens.push(Token {
            kind,
            text: &source[span.clone()],
            offset: span.start,
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: "",
        offset: source.len(),
    });
    Ok(tokens)
}

/// Value of a `Number` or `Char` token.
pub fn parse_number(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix('%') {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(ch) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        ch.chars().next().map(|c| c as i64)
    } else {
        text.parse::<i64>().ok()
    }
}

/// Contents of a `Str` token with escapes resolved.
pub fn unescape(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
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
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
