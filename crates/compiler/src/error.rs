//! Lex/parse diagnostics (§7 tier 1): carry file/line/column of the
//! offending lexeme plus a human-readable reason.

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
    UnterminatedChar,
    BadIntLiteral(String),
    BadFloatLiteral(String),
    UnexpectedToken { expected: String, found: String },
    UnexpectedEof { expected: String },
    UnknownDefine(String),
    DuplicateCheckpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: ", self.line, self.column)?;
        match &self.kind {
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            ParseErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            ParseErrorKind::UnterminatedChar => write!(f, "unterminated character literal"),
            ParseErrorKind::BadIntLiteral(e) => write!(f, "invalid integer literal: {e}"),
            ParseErrorKind::BadFloatLiteral(e) => write!(f, "invalid float literal: {e}"),
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ParseErrorKind::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            ParseErrorKind::UnknownDefine(name) => write!(f, "undefined name '{name}'"),
            ParseErrorKind::DuplicateCheckpoint => {
                write!(f, "an expression list may contain at most one checkpoint")
            }
        }
    }
}

impl std::error::Error for ParseError {}
