//! Single-character-lookahead lexer with mark/rewind (§4.6).
//!
//! Buffers the whole source as a `Vec<char>` up front (UTF-8 decoded once)
//! so mark/rewind is just saving and restoring an index — no re-reading a
//! byte stream, no backtracking state machine.

use crate::error::{ParseError, ParseErrorKind};
use crate::token::{keyword, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

/// A saved lexer position, for backtracking (§4.6's "marks and rewinds").
#[derive(Clone, Copy)]
pub struct Mark {
    pos: usize,
    line: u32,
    column: u32,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    pub fn rewind(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Tokenize the whole source up front. The parser consumes the result
    /// as a buffer; the streaming lexer itself is what mark/rewind
    /// exercises (used by the parser for a handful of two-token
    /// lookaheads, e.g. distinguishing `load <int>` from `load abs <int>`).
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()? {
                Some(tok) => {
                    let is_eof = tok.kind == TokenKind::Eof;
                    tokens.push(tok);
                    if is_eof {
                        break;
                    }
                }
                None => continue,
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_insignificant_whitespace();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.peek() else {
            return Ok(Some(Token { kind: TokenKind::Eof, line, column }));
        };

        // `#!` terminates the stream outright (a debugging aid); a bare
        // `#` introduces a line comment.
        if ch == '#' {
            if self.peek_at(1) == Some('!') {
                return Ok(Some(Token { kind: TokenKind::Eof, line, column }));
            }
            while self.peek().is_some() && self.peek() != Some('\n') {
                self.advance();
            }
            return Ok(None);
        }

        if ch == '\n' || ch == ';' {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::Newline, line, column }));
        }

        if ch == '(' {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::LParen, line, column }));
        }
        if ch == ')' {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::RParen, line, column }));
        }
        if ch == '{' {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::LBrace, line, column }));
        }
        if ch == '}' {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::RBrace, line, column }));
        }

        if ch == '"' {
            return self.lex_string(line, column).map(Some);
        }
        if ch == '\'' {
            return self.lex_char(line, column).map(Some);
        }

        if ch == '-' && !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            return Ok(Some(Token { kind: TokenKind::Minus, line, column }));
        }

        if ch.is_ascii_digit() || (ch == '-' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
            return self.lex_number(line, column).map(Some);
        }

        if is_ident_start(ch) {
            return Ok(Some(self.lex_ident(line, column)));
        }

        Err(self.error(ParseErrorKind::UnexpectedChar(ch), line, column))
    }

    fn skip_insignificant_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' || ch == ';' || ch == '#' {
                break;
            }
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn lex_string(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\n') | None => {
                    return Err(self.error(ParseErrorKind::UnterminatedString, line, column));
                }
                Some(ch) => out.push(ch),
            }
        }
        Ok(Token { kind: TokenKind::Str(out), line, column })
    }

    fn lex_char(&mut self, line: u32, column: u32) -> Result<Token> {
        self.advance();
        let ch = self
            .advance()
            .ok_or_else(|| self.error(ParseErrorKind::UnterminatedChar, line, column))?;
        match self.advance() {
            Some('\'') => Ok(Token { kind: TokenKind::Char(ch), line, column }),
            _ => Err(self.error(ParseErrorKind::UnterminatedChar, line, column)),
        }
    }

    /// Integers: `(-)?(0x|0X|0b|0B)?[0-9A-Fa-f_]+`. Floats:
    /// `[0-9_]+.[0-9_]+(([e@^])(-?[0-9]+))?`; the exponent marker is
    /// rewritten to `@` (§4.6) so non-decimal radixes parse the same way.
    fn lex_number(&mut self, line: u32, column: u32) -> Result<Token> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push(self.advance().unwrap());
        }

        let mut radix_prefix = String::new();
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X' | 'b' | 'B')) {
            radix_prefix.push(self.advance().unwrap());
            radix_prefix.push(self.advance().unwrap());
        }
        text.push_str(&radix_prefix);

        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_hexdigit() || c == '_' {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        digits.retain(|c| c != '_');

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            // Float literal; radix prefixes don't apply to floats (§4.6).
            self.advance();
            let mut frac = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    frac.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            frac.retain(|c| c != '_');

            let mut exponent = String::new();
            if matches!(self.peek(), Some('e' | 'E' | '@' | '^')) {
                self.advance();
                exponent.push('@');
                if self.peek() == Some('-') {
                    exponent.push(self.advance().unwrap());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        exponent.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }

            let canonical = format!("{}{}.{}{}", text, digits, frac, exponent);
            let canonical = loom_core::numeric::canonicalize_float_text(&canonical);
            let parsed = rug::Float::parse(&canonical)
                .map_err(|e| self.error(ParseErrorKind::BadFloatLiteral(e.to_string()), line, column))?;
            let value = rug::Float::with_val(loom_core::DEFAULT_FLOAT_PRECISION, parsed);
            return Ok(Token { kind: TokenKind::Float(value), line, column });
        }

        let radix = match radix_prefix.to_ascii_lowercase().as_str() {
            "0x" => 16,
            "0b" => 2,
            _ => 10,
        };
        let negative = text.starts_with('-');
        let value = rug::Integer::parse_radix(digits.as_str(), radix)
            .map(rug::Integer::from)
            .map_err(|e| self.error(ParseErrorKind::BadIntLiteral(e.to_string()), line, column))?;
        let value = if negative { -value } else { value };
        Ok(Token { kind: TokenKind::Int(value), line, column })
    }

    fn lex_ident(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = keyword(&text).unwrap_or(TokenKind::Ident(text));
        Token { kind, line, column }
    }

    fn error(&self, kind: ParseErrorKind, line: u32, column: u32) -> ParseError {
        ParseError { kind, line, column }
    }
}

/// Anything not whitespace/`;`/`(`/`)`/`{`/`}`/`"`/`'` and not a bare digit
/// start (§4.6).
fn is_ident_start(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, ';' | '(' | ')' | '{' | '}' | '"' | '\'' | '#')
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch)
}
