//! loom-compiler: lexer, parser, and canonical-text externalizer for loom
//! source (§4.6-§4.8).
//!
//! # Modules
//!
//! - `token`/`lexer`: single-pass tokenization with mark/rewind.
//! - `error`: `ParseError`/`ParseErrorKind`, shared by lexer and parser.
//! - `parser`: recursive-descent parser producing `loom_core::ExpressionList`.
//! - `externalize`: the inverse direction, re-emitting canonical source text.

mod error;
mod externalize;
mod lexer;
mod parser;
mod token;

pub use error::{ParseError, ParseErrorKind};
pub use externalize::externalize;
pub use parser::parse;
