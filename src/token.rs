use logos::Logos;
use serde::Serialize;

/// Byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Region {
    pub start: usize,
    pub length: usize,
}

impl Region {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Smallest region covering both.
    pub fn merge(self, other: Region) -> Region {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Region::new(start, end - start)
    }

    /// 1-based line and column of the region start. A start inside a
    /// multi-byte character counts from that character.
    pub fn line_col(&self, text: &str) -> (usize, usize) {
        let mut start = self.start.min(text.len());
        while !text.is_char_boundary(start) {
            start -= 1;
        }
        let upto = &text[..start];
        let line = upto.matches('\n').count() + 1;
        let col = upto.rfind('\n').map_or(upto.len(), |nl| upto.len() - nl - 1) + 1;
        (line, col)
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum TokenKind {
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("#")]
    Hash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\n")]
    Newline,

    #[regex(r"\$[0-9A-Fa-f]+")]
    #[regex(r"0[xX][0-9A-Fa-f]+")]
    #[regex(r"%[01]+")]
    #[regex(r"[0-9]+")]
    Number,
    #[regex(r"'[^'\n]'")]
    Char,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,
    #[regex(r"[A-Za-z_.][A-Za-z0-9_.]*")]
    Identifier,
    #[regex(r";[^\n]*")]
    Comment,

    Eof,
}

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Hash => "`#`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Newline => "end of line",
            TokenKind::Number => "number",
            TokenKind::Char => "character",
            TokenKind::Str => "string",
            TokenKind::Identifier => "identifier",
            TokenKind::Comment => "comment",
            TokenKind::Eof => "end of input",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl Token<'_> {
    pub fn region(&self) -> Region {
        Region::new(self.offset, self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let r = Region::new(4, 2).merge(Region::new(10, 3));
        assert_eq!(r, Region::new(4, 9));
    }

    #[test]
    fn line_col_is_one_based() {
        let text = "nop\n  rts\n";
        assert_eq!(Region::new(0, 1).line_col(text), (1, 1));
        assert_eq!(Region::new(6, 3).line_col(text), (2, 3));
    }

    #[test]
    fn line_col_inside_a_multibyte_character() {
        // `é` occupies bytes 6 and 7
        let text = "dc.b \"é\"\nnop\n";
        assert_eq!(Region::new(7, 1).line_col(text), (1, 7));
        assert_eq!(Region::new(6, 2).line_col(text), (1, 7));
        assert_eq!(Region::new(999, 0).line_col(text), (3, 1));
    }
}
