//! Declarative instruction entries and the mask-driven encoder/decoder.
//!
//! Each entry is described by an example line (`bge t1, t2, label`) and a
//! 32-character mask (`ttttttt sssss fffff 101 ttttt 1100011`). Mask
//! characters `0`/`1` are literal bits; the letters `f s t q p` mark where the
//! 1st..5th operand of the example is stored, scanned from bit 31 down.

use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::exec::Semantics;
use crate::token::{tokenize, TokenClass, TokenKind};

pub const WORD_LEN: u32 = 4;
pub const MAX_OPERANDS: usize = 5;
const SLOT_LETTERS: [char; MAX_OPERANDS] = ['f', 's', 't', 'q', 'p'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionFormat {
    R,
    R4,
    I,
    IShift,
    S,
    B,
    U,
    J,
    Csr,
    CsrImm,
    Fence,
    System,
}

/// Static description of one operation, as listed in the ISA tables.
#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub example: &'static str,
    pub description: &'static str,
    pub format: InstructionFormat,
    pub mask: &'static str,
    pub semantics: Semantics,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("value {value} is outside [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("offset {value} is not a multiple of {align}")]
    Misaligned { value: i64, align: i64 },
    #[error("expected {expected} operands, got {got}")]
    Arity { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Register,
    Signed,
    Unsigned,
    /// 20-bit upper immediate; also accepts the signed range and wraps it.
    Upper,
}

/// Immediate bit carried by each mask position, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    Natural,
    /// imm[12|10:5] ... imm[4:1|11]
    Branch,
    /// imm[20|10:1|11|19:12]
    Jump,
}

const BRANCH_BITS: [u8; 12] = [12, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 11];
const JUMP_BITS: [u8; 20] = [20, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 11, 19, 18, 17, 16, 15, 14, 13, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub order: BitOrder,
    /// Architectural width, including implied low zero bits.
    pub width: u32,
}

impl FieldSpec {
    fn for_operand(
        format: InstructionFormat,
        class: TokenClass,
        bits: usize,
    ) -> Result<Self, String> {
        use InstructionFormat as F;
        let natural = |kind| Ok(Self { kind, order: BitOrder::Natural, width: bits as u32 });
        match class {
            TokenClass::IntRegister | TokenClass::FpRegister if bits == 5 => {
                natural(FieldKind::Register)
            }
            TokenClass::IntRegister | TokenClass::FpRegister => {
                Err(format!("register slot has {bits} bits"))
            }
            TokenClass::Csr | TokenClass::RoundingMode => natural(FieldKind::Unsigned),
            TokenClass::Integer | TokenClass::Identifier => match format {
                F::B if bits == BRANCH_BITS.len() => {
                    Ok(Self { kind: FieldKind::Signed, order: BitOrder::Branch, width: 13 })
                }
                F::J if bits == JUMP_BITS.len() => {
                    Ok(Self { kind: FieldKind::Signed, order: BitOrder::Jump, width: 21 })
                }
                F::B | F::J => Err(format!("offset slot has {bits} bits")),
                F::U => natural(FieldKind::Upper),
                F::I | F::S => natural(FieldKind::Signed),
                _ => natural(FieldKind::Unsigned),
            },
            other => Err(format!("{other:?} operands cannot be encoded")),
        }
    }

    pub fn is_pc_relative(&self) -> bool {
        self.order != BitOrder::Natural
    }

    fn align(&self) -> i64 {
        if self.is_pc_relative() { 2 } else { 1 }
    }

    /// Inclusive range accepted by [`FieldSpec::normalize`].
    pub fn range(&self) -> (i64, i64) {
        let w = self.width;
        match self.kind {
            FieldKind::Signed => (-(1i64 << (w - 1)), (1i64 << (w - 1)) - 1),
            FieldKind::Register | FieldKind::Unsigned => (0, (1i64 << w) - 1),
            FieldKind::Upper => (-(1i64 << (w - 1)), (1i64 << w) - 1),
        }
    }

    /// Range and alignment check; returns the canonical stored operand.
    pub fn normalize(&self, value: i64) -> Result<i32, EncodeError> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(EncodeError::OutOfRange { value, min, max });
        }
        let align = self.align();
        if value % align != 0 {
            return Err(EncodeError::Misaligned { value, align });
        }
        let value = if self.kind == FieldKind::Upper && value < 0 {
            value + (1i64 << self.width)
        } else {
            value
        };
        Ok(value as i32)
    }

    fn bit_numbers(&self, count: usize) -> Vec<u8> {
        match self.order {
            BitOrder::Natural => (0..count as u8).rev().collect(),
            BitOrder::Branch => BRANCH_BITS.to_vec(),
            BitOrder::Jump => JUMP_BITS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub text: &'static str,
    /// Bits that are literal in the mask.
    pub fixed: u32,
    /// Values of the literal bits.
    pub value: u32,
    /// Word bit positions per operand slot, MSB first.
    pub slots: Vec<Vec<u8>>,
}

impl Mask {
    pub fn parse(text: &'static str) -> Result<Self, String> {
        let significant: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let expected = (WORD_LEN * 8) as usize;
        if significant.len() != expected {
            return Err(format!(
                "{} significant characters, expected {expected}",
                significant.len()
            ));
        }
        let mut fixed = 0u32;
        let mut value = 0u32;
        let mut slots: Vec<Vec<u8>> = vec![Vec::new(); MAX_OPERANDS];
        for (i, c) in significant.into_iter().enumerate() {
            let pos = (expected - 1 - i) as u8;
            match c {
                '0' => fixed |= 1 << pos,
                '1' => {
                    fixed |= 1 << pos;
                    value |= 1 << pos;
                }
                c => match SLOT_LETTERS.iter().position(|&l| l == c) {
                    Some(slot) => slots[slot].push(pos),
                    None => return Err(format!("unexpected character `{c}`")),
                },
            }
        }
        let used = slots.iter().rposition(|s| !s.is_empty()).map_or(0, |i| i + 1);
        if let Some(gap) = slots[..used].iter().position(Vec::is_empty) {
            return Err(format!("slot `{}` is unused", SLOT_LETTERS[gap]));
        }
        slots.truncate(used);
        Ok(Self { text, fixed, value, slots })
    }

    pub fn matches(&self, word: u32) -> bool {
        word & self.fixed == self.value
    }
}

/// Resolved operand values in example order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operands {
    vals: [i32; MAX_OPERANDS],
    len: u8,
}

impl Operands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values past [`MAX_OPERANDS`] are dropped.
    pub fn from_slice(values: &[i32]) -> Self {
        values.iter().copied().collect()
    }

    pub fn push(&mut self, value: i32) {
        if (self.len as usize) < MAX_OPERANDS {
            self.vals[self.len as usize] = value;
            self.len += 1;
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.vals[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Missing operands read as zero.
    pub fn get(&self, index: usize) -> i32 {
        self.as_slice().get(index).copied().unwrap_or(0)
    }

    /// Operand as a register index.
    pub fn reg(&self, index: usize) -> u8 {
        (self.get(index) & 31) as u8
    }
}

impl fmt::Debug for Operands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl FromIterator<i32> for Operands {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut ops = Operands::new();
        for v in iter {
            ops.push(v);
        }
        ops
    }
}

/// One validated catalog record.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub mnemonic: &'static str,
    pub example: &'static str,
    pub description: &'static str,
    pub format: InstructionFormat,
    /// Token classes of the example's operands, parentheses included.
    pub pattern: Vec<TokenClass>,
    pub mask: Mask,
    /// One field per operand slot.
    pub fields: Vec<FieldSpec>,
    pub semantics: Semantics,
}

impl CatalogEntry {
    pub fn from_desc(desc: &InstrDesc) -> Result<Self, ErrorKind> {
        let invalid_example = |reason: String| ErrorKind::InvalidExample {
            example: desc.example.to_string(),
            reason,
        };
        let tokens = tokenize(desc.example).map_err(|e| invalid_example(e.to_string()))?;
        let mnemonic = desc.example.split_whitespace().next().unwrap_or_default();
        match tokens.first() {
            Some(t) if t.kind == TokenKind::Mnemonic && t.text == mnemonic => {}
            _ => return Err(invalid_example("does not start with a mnemonic".into())),
        }
        let mut pattern = Vec::with_capacity(tokens.len() - 1);
        for t in &tokens[1..] {
            let class = t
                .class()
                .ok_or_else(|| invalid_example(format!("unexpected `{}`", t.text)))?;
            pattern.push(class);
        }

        let invalid_mask = |reason: String| ErrorKind::InvalidMask {
            mnemonic: mnemonic.to_string(),
            mask: desc.mask.to_string(),
            reason,
        };
        let mask = Mask::parse(desc.mask).map_err(invalid_mask)?;
        let operands: Vec<TokenClass> =
            pattern.iter().copied().filter(|c| c.is_operand()).collect();
        if operands.len() != mask.slots.len() {
            return Err(invalid_mask(format!(
                "{} operand slots for {} operands",
                mask.slots.len(),
                operands.len()
            )));
        }
        let fields = operands
            .iter()
            .zip(&mask.slots)
            .map(|(&class, bits)| FieldSpec::for_operand(desc.format, class, bits.len()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_mask)?;

        Ok(Self {
            mnemonic,
            example: desc.example,
            description: desc.description,
            format: desc.format,
            pattern,
            mask,
            fields,
            semantics: desc.semantics,
        })
    }

    pub fn word_len(&self) -> u32 {
        WORD_LEN
    }

    pub fn operand_count(&self) -> usize {
        self.fields.len()
    }

    pub fn matches(&self, word: u32) -> bool {
        self.mask.matches(word)
    }

    pub fn encode(&self, ops: &Operands) -> Result<u32, EncodeError> {
        if ops.len() != self.fields.len() {
            return Err(EncodeError::Arity { expected: self.fields.len(), got: ops.len() });
        }
        let mut word = self.mask.value;
        for (i, (field, positions)) in self.fields.iter().zip(&self.mask.slots).enumerate() {
            let value = field.normalize(ops.get(i) as i64)? as u32;
            let src = value.view_bits::<Lsb0>();
            let dst = word.view_bits_mut::<Lsb0>();
            for (&pos, bit) in positions.iter().zip(field.bit_numbers(positions.len())) {
                dst.set(pos as usize, src[bit as usize]);
            }
        }
        Ok(word)
    }

    pub fn decode(&self, word: u32) -> Operands {
        let src = word.view_bits::<Lsb0>();
        self.fields
            .iter()
            .zip(&self.mask.slots)
            .map(|(field, positions)| {
                let mut value = 0u32;
                let dst = value.view_bits_mut::<Lsb0>();
                for (&pos, bit) in positions.iter().zip(field.bit_numbers(positions.len())) {
                    dst.set(bit as usize, src[pos as usize]);
                }
                if field.kind == FieldKind::Signed {
                    let shift = 32 - field.width;
                    ((value << shift) as i32) >> shift
                } else {
                    value as i32
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Semantics;
    use pretty_assertions::assert_eq;

    fn nop(_: &mut crate::exec::ExecCtx<'_>) -> Result<(), crate::cpu::Trap> {
        Ok(())
    }

    fn entry(
        example: &'static str,
        format: InstructionFormat,
        mask: &'static str,
    ) -> Result<CatalogEntry, ErrorKind> {
        CatalogEntry::from_desc(&InstrDesc {
            example,
            description: "",
            format,
            mask,
            semantics: Semantics::Exec(nop),
        })
    }

    #[test]
    fn mask_parse_records_slots_msb_first() {
        let m = Mask::parse("ttttttt sssss fffff 101 ttttt 1100011").unwrap();
        assert_eq!(m.fixed, 0x0000_707F);
        assert_eq!(m.value, 0x0000_5063);
        assert_eq!(m.slots[0], vec![19, 18, 17, 16, 15]);
        assert_eq!(m.slots[1], vec![24, 23, 22, 21, 20]);
        assert_eq!(m.slots[2], vec![31, 30, 29, 28, 27, 26, 25, 11, 10, 9, 8, 7]);
    }

    #[test]
    fn mask_errors() {
        assert!(Mask::parse("1111").unwrap_err().contains("4 significant"));
        assert!(Mask::parse("0000000 sssss fffff 000 xxxxx 0110011").unwrap_err().contains("`x`"));
        assert!(Mask::parse("0000000 ttttt fffff 000 00000 0110011").unwrap_err().contains("`s`"));
    }

    #[test]
    fn branch_immediate_scrambles_bits() {
        let mask = "ttttttt sssss fffff 101 ttttt 1100011";
        let bge = entry("bge t1, t2, label", InstructionFormat::B, mask).unwrap();
        // bge x6, x7, -4
        let word = bge.encode(&Operands::from_slice(&[6, 7, -4])).unwrap();
        assert_eq!(word, 0xFE73_5EE3);
        assert_eq!(bge.decode(word).as_slice(), &[6, 7, -4]);
        assert_eq!(
            bge.encode(&Operands::from_slice(&[6, 7, 3])),
            Err(EncodeError::Misaligned { value: 3, align: 2 })
        );
        assert_eq!(
            bge.encode(&Operands::from_slice(&[6, 7, 4096])),
            Err(EncodeError::OutOfRange { value: 4096, min: -4096, max: 4095 })
        );
    }

    #[test]
    fn example_and_mask_must_agree() {
        let mask = "0000000 sssss fffff 000 00000 0110011";
        let err = entry("add t1, t2, t3", InstructionFormat::R, mask).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidMask { .. }));
        let mask = "0000000 ttttt sssss 000 fffff 0110011";
        let err = entry("add t1, t2,, t3", InstructionFormat::R, mask).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidExample { .. }));
    }

    #[test]
    fn upper_immediate_accepts_negative_form() {
        let mask = "ssssssssssssssssssss fffff 0110111";
        let lui = entry("lui t1, 100", InstructionFormat::U, mask).unwrap();
        let spec = lui.fields[1];
        assert_eq!(spec.normalize(-1), Ok(0xFFFFF));
        assert_eq!(spec.normalize(0xFFFFF), Ok(0xFFFFF));
        assert!(spec.normalize(1 << 20).is_err());
        assert!(spec.normalize(-(1 << 19) - 1).is_err());
    }
}
