//! Tier-2 "evaluation diagnostics" (§7): raised from opcode evaluation,
//! caught and enriched with a source location at the nearest
//! expression-list boundary, then re-raised. Already-enriched diagnostics
//! pass through unchanged.

use loom_core::SourceLocation;

#[derive(Debug, Clone)]
pub enum EvalErrorKind {
    TypeMismatch { expected: String, found: String },
    StackUnderflow,
    IndexOutOfRange { index: i64 },
    MixedNumericTypes,
    DivisionByZero,
    ConstViolation,
    UntrackedObjectMisuse,
    CastFailure { from: String, to: String },
    UndefinedSymbol(String),
    NoMatchingPredicate,
    Ffi(String),
    Halt(i32),
    Other(String),
}

impl std::fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalErrorKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            EvalErrorKind::StackUnderflow => write!(f, "stack underflow"),
            EvalErrorKind::IndexOutOfRange { index } => write!(f, "index {index} out of range"),
            EvalErrorKind::MixedNumericTypes => {
                write!(f, "mixed integer/float operands require an explicit cast")
            }
            EvalErrorKind::DivisionByZero => write!(f, "division by zero"),
            EvalErrorKind::ConstViolation => write!(f, "attempt to mutate a const value"),
            EvalErrorKind::UntrackedObjectMisuse => write!(f, "untracked object misuse"),
            EvalErrorKind::CastFailure { from, to } => write!(f, "cannot cast {from} to {to}"),
            EvalErrorKind::UndefinedSymbol(name) => write!(f, "undefined symbol: {name}"),
            EvalErrorKind::NoMatchingPredicate => write!(f, "no predicate matched"),
            EvalErrorKind::Ffi(msg) => write!(f, "ffi error: {msg}"),
            EvalErrorKind::Halt(code) => write!(f, "halt({code})"),
            EvalErrorKind::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// An evaluation-time diagnostic, optionally enriched with the source
/// location of the node that raised it.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub location: Option<SourceLocation>,
    /// Set once enrichment has happened, so a re-raise at an outer
    /// expression-list boundary doesn't clobber the original site (§7:
    /// "nested re-raises are not further enriched").
    pub enriched: bool,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            location: None,
            enriched: false,
        }
    }

    pub fn enrich(mut self, location: SourceLocation) -> Self {
        if !self.enriched {
            self.location = Some(location);
            self.enriched = true;
        }
        self
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{loc}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<loom_core::StackError> for EvalError {
    fn from(e: loom_core::StackError) -> Self {
        EvalError::new(EvalErrorKind::Other(e.to_string()))
    }
}

impl From<loom_core::HeapError> for EvalError {
    fn from(e: loom_core::HeapError) -> Self {
        match e {
            loom_core::HeapError::DoubleTrack(_) => {
                EvalError::new(EvalErrorKind::UntrackedObjectMisuse)
            }
            other => EvalError::new(EvalErrorKind::Other(other.to_string())),
        }
    }
}

impl From<loom_core::VmError> for EvalError {
    fn from(e: loom_core::VmError) -> Self {
        EvalError::new(EvalErrorKind::Other(e.to_string()))
    }
}
