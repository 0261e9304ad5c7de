//! Renders decoded instructions back into assembly text, following the
//! layout of each entry's example syntax.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::catalog::Catalog;
use crate::csr::csr_name;
use crate::decoder::Decoded;
use crate::instructions::{CatalogEntry, FieldKind, Operands};
use crate::isa::abi::{fpr_name, gpr_name};
use crate::program::{Program, ProgramStatement};
use crate::softfloat::RM_DYNAMIC;
use crate::token::{rounding_mode_name, TokenClass};

/// Address to label, for naming branch and jump targets.
pub type Labels = BTreeMap<u32, String>;

/// Inverts a program's symbol table. The first name bound to an address wins.
pub fn labels_of(program: &Program) -> Labels {
    let mut labels = Labels::new();
    for (name, &addr) in &program.symbols {
        labels.entry(addr).or_insert_with(|| name.clone());
    }
    labels
}

pub fn fmt_operands(entry: &CatalogEntry, ops: &Operands, pc: u32, labels: &Labels) -> String {
    let mut out = String::from(entry.mnemonic);
    let mut slot = 0;
    let mut after_paren = false;
    for (i, &class) in entry.pattern.iter().enumerate() {
        match class {
            TokenClass::LParen => {
                out.push('(');
                after_paren = true;
                continue;
            }
            TokenClass::RParen => {
                out.push(')');
                continue;
            }
            _ => {}
        }
        let value = ops.get(slot);
        let field = entry.fields.get(slot);
        slot += 1;
        // An implied `dyn` rounding mode is left out, as it is usually written.
        let trailing = i + 1 == entry.pattern.len();
        if class == TokenClass::RoundingMode && value as u8 == RM_DYNAMIC && trailing {
            continue;
        }
        if !after_paren {
            out.push_str(if slot == 1 { " " } else { ", " });
        }
        after_paren = false;
        match class {
            TokenClass::IntRegister => out.push_str(gpr_name(value as u8)),
            TokenClass::FpRegister => out.push_str(fpr_name(value as u8)),
            TokenClass::RoundingMode => out.push_str(rounding_mode_name(value as u8)),
            TokenClass::Csr => match csr_name(value as u16) {
                Some(name) => out.push_str(name),
                None => {
                    let _ = write!(out, "{:#05x}", value);
                }
            },
            TokenClass::Identifier if field.is_some_and(|f| f.is_pc_relative()) => {
                let target = pc.wrapping_add(value as u32);
                match labels.get(&target) {
                    Some(name) => out.push_str(name),
                    None => {
                        let _ = write!(out, "{target:#x}");
                    }
                }
            }
            _ if field.is_some_and(|f| f.kind == FieldKind::Upper) => {
                let _ = write!(out, "{value:#x}");
            }
            _ => {
                let _ = write!(out, "{value}");
            }
        }
    }
    out
}

pub fn fmt_decoded(catalog: &Catalog, d: &Decoded, pc: u32) -> String {
    fmt_operands(catalog.entry(d.entry), &d.operands, pc, &Labels::new())
}

pub fn fmt_statement(catalog: &Catalog, s: &ProgramStatement, labels: &Labels) -> String {
    fmt_operands(catalog.entry(s.entry), &s.operands, s.address, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use pretty_assertions::assert_eq;

    fn dis(word: u32, pc: u32) -> String {
        let catalog = Catalog::standard().unwrap();
        fmt_decoded(catalog, &catalog.decode(word).unwrap(), pc)
    }

    #[test]
    fn follows_example_layout() {
        assert_eq!(dis(0xFFB0_0293, 0), "addi t0, zero, -5");
        assert_eq!(dis(0x1234_5337, 0), "lui t1, 0x12345");
        assert_eq!(dis(0x0081_2503, 0), "lw a0, 8(sp)");
        assert_eq!(dis(0x00B5_0463, 0x100), "beq a0, a1, 0x108");
        assert_eq!(dis(0x0030_22F3, 0), "csrrs t0, fcsr, zero");
    }
}
