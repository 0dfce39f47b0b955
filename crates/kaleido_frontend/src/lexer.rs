// crates/kaleido_frontend/src/lexer.rs
//
// Kaleido lexer: tokens only, pulled one at a time.
// - Produces Spanned<Token> with byte spans.
// - Identifiers: ASCII letter first, ASCII letters/digits after. `def` and
//   `extern` are keywords.
// - Numbers: a run of digits and '.', valued by its longest numeric prefix.
// - Skips whitespace and `#` comments to end of line.
// - Every other character comes back as Token::Char; the lexer never fails.
//
// Once the input is exhausted, every further call returns Token::Eof.

use crate::ast::{Span, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Def,
    Extern,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Eof,
    Keyword(Keyword),
    Ident(String),
    Number(f64),
    Char(char),
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    i: usize,
    len: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            i: 0,
            len: src.len(),
        }
    }

    /// Drains the lexer, including the trailing `Eof`.
    pub fn lex_all(mut self) -> Vec<Spanned<Token>> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token();
            let is_eof = matches!(t.node, Token::Eof);
            out.push(t);
            if is_eof {
                break;
            }
        }
        out
    }

    pub fn next_token(&mut self) -> Spanned<Token> {
        self.skip_ws_and_comments();

        let start = self.i as u32;
        let ch = match self.peek_char() {
            Some(c) => c,
            None => return self.span(Token::Eof, start, start),
        };

        if ch.is_ascii_alphabetic() {
            return self.lex_ident_or_keyword();
        }

        if ch.is_ascii_digit() || ch == '.' {
            return self.lex_number();
        }

        self.bump_char();
        self.span(Token::Char(ch), start, self.i as u32)
    }

    // ---- lexing helpers ----

    fn span(&self, node: Token, start: u32, end: u32) -> Spanned<Token> {
        Spanned::new(node, Span::new(start, end))
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while let Some(c) = self.peek_char() {
                if c.is_whitespace() {
                    self.bump_char();
                } else {
                    break;
                }
            }

            if self.peek_u8() == Some(b'#') {
                while let Some(b) = self.peek_u8() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.bump_char();
                }
                continue;
            }

            break;
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Spanned<Token> {
        let start = self.i;
        while let Some(b) = self.peek_u8() {
            if b.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }

        let text = &self.src[start..self.i];
        let tok = match text {
            "def" => Token::Keyword(Keyword::Def),
            "extern" => Token::Keyword(Keyword::Extern),
            _ => Token::Ident(text.to_string()),
        };
        self.span(tok, start as u32, self.i as u32)
    }

    fn lex_number(&mut self) -> Spanned<Token> {
        let start = self.i;
        while let Some(b) = self.peek_u8() {
            if b.is_ascii_digit() || b == b'.' {
                self.bump();
            } else {
                break;
            }
        }

        let value = numeric_prefix(&self.src[start..self.i]);
        self.span(Token::Number(value), start as u32, self.i as u32)
    }

    // ---- cursor helpers ----

    fn peek_u8(&self) -> Option<u8> {
        if self.i < self.len {
            Some(self.bytes[self.i])
        } else {
            None
        }
    }

    fn bump(&mut self) {
        self.i += 1;
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.i..].chars().next()
    }

    fn bump_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.i += ch.len_utf8();
        }
    }
}

/// Value of the longest prefix of `text` that reads as a number, so that
/// `1.2.3` is `1.2` and a lone `.` is `0`.
fn numeric_prefix(text: &str) -> f64 {
    (1..=text.len())
        .rev()
        .find_map(|end| text[..end].parse::<f64>().ok())
        .unwrap_or(0.0)
}
