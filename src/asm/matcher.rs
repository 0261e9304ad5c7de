//! Binds the operand tokens of a source line to an entry's token pattern.

use crate::softfloat::RM_DYNAMIC;
use crate::token::{Token, TokenClass, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Register index, CSR address, rounding mode or literal value.
    Value(i64),
    /// Label reference, resolved in pass 2.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOperand {
    pub operand: Operand,
    pub text: String,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    TooFew { column: usize },
    TooMany { column: usize },
    Mismatch { column: usize, found: String },
}

impl MatchError {
    pub fn column(&self) -> usize {
        match self {
            MatchError::TooFew { column }
            | MatchError::TooMany { column }
            | MatchError::Mismatch { column, .. } => *column,
        }
    }
}

fn implied(value: i64, text: &str, column: usize) -> MatchedOperand {
    MatchedOperand { operand: Operand::Value(value), text: text.into(), column }
}

/// Matches `tokens` (the operands after the mnemonic) against `pattern`.
///
/// A numeric literal may stand in for a label (absolute address) or a CSR
/// name, a missing trailing rounding mode means `dyn`, and `(reg)` without
/// an offset means offset 0. `end` is the column just past the line's last
/// token, used to report missing operands.
pub fn match_operands(
    pattern: &[TokenClass],
    tokens: &[Token],
    end: usize,
) -> Result<Vec<MatchedOperand>, MatchError> {
    let mut out = Vec::with_capacity(pattern.len());
    let mut i = 0;
    for (pi, &class) in pattern.iter().enumerate() {
        let tok = tokens.get(i);
        match (class, tok) {
            (TokenClass::RoundingMode, None) if pi + 1 == pattern.len() => {
                out.push(implied(RM_DYNAMIC as i64, "dyn", end));
                continue;
            }
            (TokenClass::Integer, Some(t))
                if t.kind == TokenKind::LParen
                    && pattern.get(pi + 1) == Some(&TokenClass::LParen) =>
            {
                out.push(implied(0, "0", t.column));
                continue;
            }
            _ => {}
        }
        let Some(t) = tok else {
            return Err(MatchError::TooFew { column: end });
        };
        let operand = match (class, &t.kind) {
            (TokenClass::LParen, TokenKind::LParen)
            | (TokenClass::RParen, TokenKind::RParen) => None,
            (TokenClass::IntRegister, TokenKind::IntRegister(r))
            | (TokenClass::FpRegister, TokenKind::FpRegister(r))
            | (TokenClass::RoundingMode, TokenKind::RoundingMode(r)) => {
                Some(Operand::Value(*r as i64))
            }
            (TokenClass::Csr, TokenKind::Csr(a)) => Some(Operand::Value(*a as i64)),
            (
                TokenClass::Csr | TokenClass::Integer | TokenClass::Identifier,
                TokenKind::Integer(v),
            ) => Some(Operand::Value(*v)),
            (TokenClass::Identifier, TokenKind::Identifier) => {
                Some(Operand::Symbol(t.text.clone()))
            }
            _ => {
                return Err(MatchError::Mismatch { column: t.column, found: t.text.clone() });
            }
        };
        if let Some(operand) = operand {
            out.push(MatchedOperand { operand, text: t.text.clone(), column: t.column });
        }
        i += 1;
    }
    match tokens.get(i) {
        Some(extra) => Err(MatchError::TooMany { column: extra.column }),
        None => Ok(out),
    }
}
