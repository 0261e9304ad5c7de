//! Assembler directives.

use crate::error::{Diagnostic, ErrorKind, SourcePos};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Text,
    Data,
    Globl,
    Word,
    Half,
    Byte,
    Float,
    Space,
    Align,
    Ascii,
    Asciz,
}

impl Directive {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            ".text" => Directive::Text,
            ".data" => Directive::Data,
            ".globl" | ".global" => Directive::Globl,
            ".word" => Directive::Word,
            ".half" => Directive::Half,
            ".byte" => Directive::Byte,
            ".float" => Directive::Float,
            ".space" => Directive::Space,
            ".align" => Directive::Align,
            ".ascii" => Directive::Ascii,
            ".asciz" | ".string" => Directive::Asciz,
            _ => return None,
        })
    }

    /// Natural alignment applied before emitting, so labels on the same
    /// line name the aligned address.
    pub fn alignment(self) -> u32 {
        match self {
            Directive::Word | Directive::Float => 4,
            Directive::Half => 2,
            _ => 1,
        }
    }
}

/// A `.word label` slot patched in pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    pub offset: usize,
    pub symbol: String,
    pub pos: SourcePos,
}

/// Pads `data` (which starts at `base`) up to a multiple of `align`.
pub fn pad_to(data: &mut Vec<u8>, base: u32, align: u32) {
    while (base as u64 + data.len() as u64) % align as u64 != 0 {
        data.push(0);
    }
}

pub struct DataEmitter<'a> {
    pub data: &'a mut Vec<u8>,
    pub base: u32,
    pub fixups: &'a mut Vec<Fixup>,
    pub line: usize,
}

impl DataEmitter<'_> {
    fn error(&self, column: usize, name: &str, reason: impl Into<String>) -> Diagnostic {
        Diagnostic::at(
            SourcePos::new(self.line, column),
            ErrorKind::Directive { directive: name.into(), reason: reason.into() },
        )
    }

    fn integer(&self, tok: &Token, name: &str, min: i64, max: i64) -> Result<i64, Diagnostic> {
        match tok.kind {
            TokenKind::Integer(v) if (min..=max).contains(&v) => Ok(v),
            TokenKind::Integer(v) => {
                Err(self.error(tok.column, name, format!("{v} is outside [{min}, {max}]")))
            }
            _ => Err(self.error(tok.column, name, format!("`{}` is not an integer", tok.text))),
        }
    }

    fn single(&self, args: &[Token], name: &str) -> Result<(), Diagnostic> {
        match args.get(1) {
            Some(extra) => Err(self.error(extra.column, name, "takes one operand")),
            None => Ok(()),
        }
    }

    /// Emits the bytes of one data directive. `head` is the directive token.
    /// The caller has already padded to [`Directive::alignment`].
    pub fn emit(
        &mut self,
        directive: Directive,
        head: &Token,
        args: &[Token],
    ) -> Result<(), Diagnostic> {
        let name = head.text.as_str();
        if args.is_empty() {
            return Err(self.error(head.end_column(), name, "missing operand"));
        }
        match directive {
            Directive::Word => {
                for tok in args {
                    if tok.kind == TokenKind::Identifier {
                        self.fixups.push(Fixup {
                            offset: self.data.len(),
                            symbol: tok.text.clone(),
                            pos: SourcePos::new(self.line, tok.column),
                        });
                        self.data.extend_from_slice(&[0; 4]);
                    } else {
                        let v = self.integer(tok, name, i32::MIN as i64, u32::MAX as i64)?;
                        self.data.extend_from_slice(&(v as u32).to_le_bytes());
                    }
                }
            }
            Directive::Half => {
                for tok in args {
                    let v = self.integer(tok, name, i16::MIN as i64, u16::MAX as i64)?;
                    self.data.extend_from_slice(&(v as u16).to_le_bytes());
                }
            }
            Directive::Byte => {
                for tok in args {
                    let v = self.integer(tok, name, i8::MIN as i64, u8::MAX as i64)?;
                    self.data.push(v as u8);
                }
            }
            Directive::Float => {
                for tok in args {
                    let bits = match tok.kind {
                        TokenKind::Real(bits) => bits,
                        TokenKind::Integer(v) => (v as f32).to_bits(),
                        _ => {
                            let reason = format!("`{}` is not a number", tok.text);
                            return Err(self.error(tok.column, name, reason));
                        }
                    };
                    self.data.extend_from_slice(&bits.to_le_bytes());
                }
            }
            Directive::Space => {
                self.single(args, name)?;
                let n = self.integer(&args[0], name, 0, 1 << 24)?;
                self.data.resize(self.data.len() + n as usize, 0);
            }
            Directive::Align => {
                self.single(args, name)?;
                let n = self.integer(&args[0], name, 0, 16)?;
                pad_to(self.data, self.base, 1 << n);
            }
            Directive::Ascii | Directive::Asciz => {
                for tok in args {
                    let TokenKind::Str(s) = &tok.kind else {
                        let reason = format!("`{}` is not a string", tok.text);
                        return Err(self.error(tok.column, name, reason));
                    };
                    self.data.extend_from_slice(s.as_bytes());
                    if directive == Directive::Asciz {
                        self.data.push(0);
                    }
                }
            }
            Directive::Text | Directive::Data | Directive::Globl => {}
        }
        Ok(())
    }
}
