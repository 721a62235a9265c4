//! Module `scanner` implements a one-pass, streaming lexer for the Sable
//! language.
//!
//! It transforms a source string into a sequence of `Token<'src>`s, skipping
//! whitespace and comments, and emitting exactly one `Eof` token at the end.
//! Designed as a `FusedIterator`, it can be chained safely with other
//! iterator adapters, and it keeps yielding after a lex error so one pass
//! surfaces every bad character in the input.
//!
//! Core phases:
//!
//! 1. **Primitive helpers** — `advance()`, `peek()`, `peek_next()`, and
//!    `match_byte()` give inlined access to the underlying byte stream;
//!    `is_at_end()` guards against overrun.
//! 2. **Lexing loop** (`next`) — reset `start`, call `scan_token()`, and
//!    build a token from the recognised kind; whitespace and comments yield
//!    no kind and the loop continues.
//! 3. **Token recognition** (`scan_token`) — punctuators, two-character
//!    operators, string and number literals, identifiers resolved against a
//!    perfect-hash `KEYWORDS` map. Any unexpected byte yields
//!    `SableError::lex(line, message)`.
//!
//! Lexemes are zero-copy slices of the original source. Every slice boundary
//! lands on an ASCII delimiter, so plain `&str` indexing is safe; multi-byte
//! characters can only occur inside string literals and comments.

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{Result, SableError};
use crate::token::{Token, TokenType};

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile-time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::And,
    "class"  => TokenType::Class,
    "else"   => TokenType::Else,
    "false"  => TokenType::False,
    "fun"    => TokenType::Fun,
    "for"    => TokenType::For,
    "if"     => TokenType::If,
    "nil"    => TokenType::Nil,
    "or"     => TokenType::Or,
    "print"  => TokenType::Print,
    "return" => TokenType::Return,
    "super"  => TokenType::Super,
    "this"   => TokenType::This,
    "true"   => TokenType::True,
    "var"    => TokenType::Var,
    "while"  => TokenType::While,
};

/// A single-pass **scanner / lexer** converting source text into a sequence
/// of [`Token`]s. The lifetime `'src` ties every emitted token's `lexeme`
/// slice back to the original source buffer.
pub struct Scanner<'src> {
    src: &'src str,   // entire source file
    bytes: &'src [u8], // same buffer, viewed as bytes for the hot path
    start: usize,     // index of the first byte of the current lexeme
    curr: usize,      // index one past the last byte examined
    line: usize,      // 1-based line counter (\n increments)
}

impl<'src> Scanner<'src> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'src str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it. Callers guard with [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it. Returns `0` past EOF
    /// to avoid branching at call-site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes[self.curr]
        }
    }

    /// Peek one byte beyond [`Self::peek`]. Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.bytes[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* lexeme starting at `self.start`. Returns the
    /// recognised token kind, or `None` for whitespace and comments.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let b = self.advance();

        let kind = match b {
            // ── single-character punctuators ──────────────────────────────
            b'(' => TokenType::LeftParen,
            b')' => TokenType::RightParen,
            b'{' => TokenType::LeftBrace,
            b'}' => TokenType::RightBrace,
            b',' => TokenType::Comma,
            b'.' => TokenType::Dot,
            b'-' => TokenType::Minus,
            b'+' => TokenType::Plus,
            b';' => TokenType::Semicolon,
            b'*' => TokenType::Star,

            // ── one- or two-character operators ──────────────────────────
            b'!' => {
                if self.match_byte(b'=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                }
            }

            b'=' => {
                if self.match_byte(b'=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }

            b'<' => {
                if self.match_byte(b'=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }

            b'>' => {
                if self.match_byte(b'=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;

                return Ok(None);
            }

            // ── comments (// … until newline) ────────────────────────────
            b'/' => {
                if self.match_byte(b'/') {
                    // Fast-forward to the next newline with `memchr`; if
                    // none is found, skip to EOF.
                    if let Some(pos) = memchr(b'\n', &self.bytes[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }

                    return Ok(None);
                }

                TokenType::Slash
            }

            // ── string literal " … " ─────────────────────────────────────
            b'"' => return self.scan_string().map(Some),

            // ── number literal (digit-leading) ───────────────────────────
            b'0'..=b'9' => self.scan_number(),

            // ── identifiers / keywords (alpha or underscore-leading) ─────
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),

            // ── unexpected character ─────────────────────────────────────
            _ => {
                return Err(SableError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        };

        Ok(Some(kind))
    }

    /// Scan a double-quoted string literal. `self.start` points at the
    /// opening `"`; on return `self.curr` points past the closing `"`.
    /// Multi-line strings are allowed.
    fn scan_string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(SableError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // consume closing quote

        // Slice excluding the surrounding quotes; the quote bytes are ASCII
        // so the boundaries are valid.
        let contents: &str = &self.src[self.start + 1..self.curr - 1];

        Ok(TokenType::Str(contents.to_owned()))
    }

    /// Scan a numeric literal (`123`, `3.14`). Fractions are optional.
    fn scan_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme: &str = &self.src[self.start..self.curr];
        let n: f64 = lexeme.parse::<f64>().unwrap_or(0.0); // digits only, cannot fail

        TokenType::Number(n)
    }

    /// Scan an identifier and decide if it is a **keyword** or a generic
    /// `Identifier` token.
    fn scan_identifier(&mut self) -> TokenType {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let lexeme: &str = &self.src[self.start..self.curr];

        KEYWORDS
            .get(lexeme)
            .cloned()
            .unwrap_or(TokenType::Identifier)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'src> Iterator for Scanner<'src> {
    type Item = Result<Token<'src>>;

    fn next(&mut self) -> Option<Self::Item> {
        // Loop until we either emit a token, hit EOF, or see an error.
        while self.curr <= self.len() {
            // EOF guard: emit exactly one Eof token, then terminate.
            if self.curr == self.len() {
                self.curr += 1; // ensure fused semantics
                return Some(Ok(Token::new(TokenType::Eof, "", self.line)));
            }

            self.start = self.curr;

            match self.scan_token() {
                Err(e) => return Some(Err(e)),

                Ok(Some(kind)) => {
                    let lexeme: &str = &self.src[self.start..self.curr];
                    debug!("Scanned token ({:?}) on line {}", kind, self.line);

                    return Some(Ok(Token::new(kind, lexeme, self.line)));
                }

                // Whitespace or comment: keep scanning.
                Ok(None) => {}
            }
        }

        None // already yielded Eof
    }
}

impl FusedIterator for Scanner<'_> {}
