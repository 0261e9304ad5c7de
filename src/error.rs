use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instructions::EncodeError;
use crate::token::TokenError;

/// 1-based line and column inside assembly source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Who produced a diagnostic: user source, or a defect in the instruction catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Source,
    Catalog,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error(transparent)]
    Syntax(#[from] TokenError),
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("too few operands for `{mnemonic}`, expected `{expected}`")]
    MissingOperand { mnemonic: String, expected: String },
    #[error("too many operands for `{mnemonic}`, expected `{expected}`")]
    ExtraOperand { mnemonic: String, expected: String },
    #[error("operand `{found}` does not fit `{expected}`")]
    OperandMismatch { found: String, expected: String },
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("label `{0}` is already defined")]
    DuplicateLabel(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),
    #[error("bad operand for `{directive}`: {reason}")]
    Directive { directive: String, reason: String },
    #[error("instructions are not allowed in the data segment")]
    InstructionInData,
    #[error("segment overflows the address space")]
    AddressOverflow,

    #[error("example `{example}` does not tokenize: {reason}")]
    InvalidExample { example: String, reason: String },
    #[error("mask `{mask}` of `{mnemonic}` is invalid: {reason}")]
    InvalidMask { mnemonic: String, mask: String, reason: String },
    #[error("`{first}` and `{second}` have overlapping encodings")]
    Collision { first: String, second: String },
    #[error("mnemonic `{0}` is registered twice")]
    DuplicateMnemonic(String),
    #[error("pseudo-instruction `{example}` expands to `{expansion}`: {reason}")]
    InvalidPseudo { example: String, expansion: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub origin: Origin,
    pub pos: Option<SourcePos>,
    pub kind: ErrorKind,
}

impl Diagnostic {
    pub fn at(pos: SourcePos, kind: ErrorKind) -> Self {
        Self { origin: Origin::Source, pos: Some(pos), kind }
    }

    pub fn catalog(kind: ErrorKind) -> Self {
        Self { origin: Origin::Catalog, pos: None, kind }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.origin, self.pos) {
            (Origin::Catalog, _) => write!(f, "catalog defect: {}", self.kind),
            (Origin::Source, Some(pos)) => write!(f, "{pos}: error: {}", self.kind),
            (Origin::Source, None) => write!(f, "error: {}", self.kind),
        }
    }
}

impl std::error::Error for Diagnostic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

/// Every diagnostic collected by one assembler or catalog build run.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{} error(s){}", .0.len(), render(.0))]
pub struct Diagnostics(pub Vec<Diagnostic>);

fn render(items: &[Diagnostic]) -> String {
    items.iter().map(|d| format!("\n  {d}")).collect()
}

impl Diagnostics {
    pub fn push(&mut self, d: Diagnostic) {
        self.0.push(d);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
