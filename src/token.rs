//! Line tokenizer shared by catalog examples and user source.
//!
//! A line is split on whitespace and commas, parentheses are kept as
//! punctuation and `#` starts a comment. Every piece is classified so that a
//! catalog example like `lw t1, -100(t2)` and a user line like
//! `lw a0, 8(sp)` produce token lists of identical shape.

use crate::csr::csr_address;
use crate::isa::abi::{fpr_index, gpr_index};
use crate::softfloat::RM_DYNAMIC;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Mnemonic,
    Directive,
    /// `name:` label definition; the text excludes the colon.
    Label,
    IntRegister(u8),
    FpRegister(u8),
    Csr(u16),
    RoundingMode(u8),
    Integer(i64),
    /// binary32 bits of a real literal
    Real(u32),
    Str(String),
    Identifier,
    LParen,
    RParen,
}

/// Operand shape used by instruction patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    IntRegister,
    FpRegister,
    Csr,
    RoundingMode,
    Integer,
    Real,
    Str,
    Identifier,
    LParen,
    RParen,
}

impl TokenClass {
    pub fn is_operand(self) -> bool {
        !matches!(self, TokenClass::LParen | TokenClass::RParen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text as written.
    pub text: String,
    /// 1-based column of the first character.
    pub column: usize,
}

impl Token {
    /// Column just past the token.
    pub fn end_column(&self) -> usize {
        self.column + self.text.chars().count()
    }

    /// `None` for the line-structure tokens (mnemonic, directive, label).
    pub fn class(&self) -> Option<TokenClass> {
        let class = match self.kind {
            TokenKind::Mnemonic | TokenKind::Directive | TokenKind::Label => return None,
            TokenKind::IntRegister(_) => TokenClass::IntRegister,
            TokenKind::FpRegister(_) => TokenClass::FpRegister,
            TokenKind::Csr(_) => TokenClass::Csr,
            TokenKind::RoundingMode(_) => TokenClass::RoundingMode,
            TokenKind::Integer(_) => TokenClass::Integer,
            TokenKind::Real(_) => TokenClass::Real,
            TokenKind::Str(_) => TokenClass::Str,
            TokenKind::Identifier => TokenClass::Identifier,
            TokenKind::LParen => TokenClass::LParen,
            TokenKind::RParen => TokenClass::RParen,
        };
        Some(class)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated character literal")]
    UnterminatedChar,
    #[error("malformed numeric literal `{0}`")]
    MalformedNumber(String),
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("empty operand")]
    EmptyOperand,
    #[error("unexpected character `{0}`")]
    StrayChar(char),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct TokenError {
    pub column: usize,
    pub kind: TokenErrorKind,
}

pub fn rounding_mode_index(name: &str) -> Option<u8> {
    match name {
        "rne" => Some(0),
        "rtz" => Some(1),
        "rdn" => Some(2),
        "rup" => Some(3),
        "rmm" => Some(4),
        "dyn" => Some(RM_DYNAMIC),
        _ => None,
    }
}

pub fn rounding_mode_name(bits: u8) -> &'static str {
    match bits {
        0 => "rne",
        1 => "rtz",
        2 => "rdn",
        3 => "rup",
        4 => "rmm",
        RM_DYNAMIC => "dyn",
        _ => "?",
    }
}

pub fn tokenize(line: &str) -> Result<Vec<Token>, TokenError> {
    Lexer {
        chars: line.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
        open_parens: Vec::new(),
        pending_comma: None,
    }
    .run()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '-' | '+')
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '$'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

fn looks_numeric(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+') => matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.'),
        Some('.') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

/// Integer literals must fit 32 bits, signed or unsigned.
fn parse_number(word: &str) -> Option<TokenKind> {
    let (negative, body) = match word.as_bytes().first() {
        Some(b'-') => (true, &word[1..]),
        Some(b'+') => (false, &word[1..]),
        _ => (false, word),
    };
    let lower = body.to_ascii_lowercase();
    let magnitude = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else if !lower.is_empty() && lower.bytes().all(|b| b.is_ascii_digit()) {
        lower.parse::<u64>().ok()
    } else {
        return word.parse::<f32>().ok().map(|v| TokenKind::Real(v.to_bits()));
    };
    let magnitude = i64::try_from(magnitude?).ok()?;
    let value = if negative { magnitude.checked_neg()? } else { magnitude };
    (i32::MIN as i64..=u32::MAX as i64)
        .contains(&value)
        .then_some(TokenKind::Integer(value))
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    open_parens: Vec<usize>,
    pending_comma: Option<usize>,
}

impl Lexer {
    fn err(column: usize, kind: TokenErrorKind) -> TokenError {
        TokenError { column, kind }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn push(&mut self, kind: TokenKind, text: String, column: usize) {
        self.pending_comma = None;
        self.tokens.push(Token { kind, text, column });
    }

    fn at_head(&self) -> bool {
        self.tokens.iter().all(|t| t.kind == TokenKind::Label)
    }

    /// A comma is only legal right after an operand.
    fn comma_allowed(&self) -> bool {
        self.pending_comma.is_none()
            && self
                .tokens
                .last()
                .and_then(Token::class)
                .is_some_and(|c| c != TokenClass::LParen)
    }

    fn run(mut self) -> Result<Vec<Token>, TokenError> {
        while let Some(c) = self.peek() {
            let column = self.pos + 1;
            match c {
                '#' => break,
                c if c.is_whitespace() => self.pos += 1,
                ',' => {
                    if !self.comma_allowed() {
                        return Err(Self::err(column, TokenErrorKind::EmptyOperand));
                    }
                    self.pending_comma = Some(column);
                    self.pos += 1;
                }
                '(' => {
                    self.open_parens.push(column);
                    self.pos += 1;
                    self.push(TokenKind::LParen, "(".into(), column);
                }
                ')' => {
                    if self.open_parens.pop().is_none() {
                        return Err(Self::err(column, TokenErrorKind::UnbalancedParen));
                    }
                    self.pos += 1;
                    self.push(TokenKind::RParen, ")".into(), column);
                }
                '"' => self.string(column)?,
                '\'' => self.character(column)?,
                c if is_word_char(c) => self.word(column)?,
                c => return Err(Self::err(column, TokenErrorKind::StrayChar(c))),
            }
        }
        if let Some(&column) = self.open_parens.first() {
            return Err(Self::err(column, TokenErrorKind::UnbalancedParen));
        }
        if let Some(column) = self.pending_comma {
            return Err(Self::err(column, TokenErrorKind::EmptyOperand));
        }
        Ok(self.tokens)
    }

    fn escape(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        })
    }

    fn string(&mut self, column: usize) -> Result<(), TokenError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(Self::err(column, TokenErrorKind::UnterminatedString)),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    let c = self
                        .escape()
                        .ok_or(Self::err(column, TokenErrorKind::UnterminatedString))?;
                    value.push(c);
                }
                Some(c) => {
                    self.pos += 1;
                    value.push(c);
                }
            }
        }
        let text = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Str(value), text, column);
        Ok(())
    }

    fn character(&mut self, column: usize) -> Result<(), TokenError> {
        let start = self.pos;
        self.pos += 1;
        let unterminated = Self::err(column, TokenErrorKind::UnterminatedChar);
        let c = match self.peek() {
            None | Some('\'') => return Err(unterminated),
            Some('\\') => {
                self.pos += 1;
                self.escape().ok_or(unterminated.clone())?
            }
            Some(c) => {
                self.pos += 1;
                c
            }
        };
        if self.peek() != Some('\'') {
            return Err(unterminated);
        }
        self.pos += 1;
        let text = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Integer(c as i64), text, column);
        Ok(())
    }

    fn word(&mut self, column: usize) -> Result<(), TokenError> {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if self.at_head() {
            if self.peek() == Some(':') && is_identifier(&word) {
                self.pos += 1;
                self.push(TokenKind::Label, word, column);
                return Ok(());
            }
            let kind = if word.starts_with('.') {
                TokenKind::Directive
            } else if is_identifier(&word) {
                TokenKind::Mnemonic
            } else {
                let bad = word.chars().next().unwrap_or(' ');
                return Err(Self::err(column, TokenErrorKind::StrayChar(bad)));
            };
            self.push(kind, word, column);
            return Ok(());
        }

        let kind = if looks_numeric(&word) {
            parse_number(&word)
                .ok_or_else(|| Self::err(column, TokenErrorKind::MalformedNumber(word.clone())))?
        } else if let Some(r) = gpr_index(&word) {
            TokenKind::IntRegister(r)
        } else if let Some(r) = fpr_index(&word) {
            TokenKind::FpRegister(r)
        } else if let Some(rm) = rounding_mode_index(&word) {
            TokenKind::RoundingMode(rm)
        } else if let Some(csr) = csr_address(&word) {
            TokenKind::Csr(csr)
        } else if is_identifier(&word) {
            TokenKind::Identifier
        } else {
            let (offset, bad) = word
                .char_indices()
                .find(|&(i, c)| {
                    let symbolic = c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$');
                    !symbolic || (i == 0 && c.is_ascii_digit())
                })
                .unwrap_or((0, ' '));
            let at = column + word[..offset].chars().count();
            return Err(Self::err(at, TokenErrorKind::StrayChar(bad)));
        };
        self.push(kind, word, column);
        Ok(())
    }
}
