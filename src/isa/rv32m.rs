//! RV32M multiply/divide. Division by zero and signed overflow never trap.

use crate::cpu::Trap;
use crate::exec::{ExecCtx, Semantics};
use crate::instructions::{InstrDesc, InstructionFormat};

macro_rules! muldiv {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $name(c: &mut ExecCtx<'_>) -> Result<(), Trap> {
            let ($a, $b) = (c.x(1), c.x(2));
            c.set_x(0, $body);
            Ok(())
        }
    };
}

muldiv!(mul, |a, b| a.wrapping_mul(b));
muldiv!(mulh, |a, b| ((a as i32 as i64 * b as i32 as i64) >> 32) as u32);
muldiv!(mulhsu, |a, b| ((a as i32 as i64 * b as i64) >> 32) as u32);
muldiv!(mulhu, |a, b| ((a as u64 * b as u64) >> 32) as u32);
muldiv!(div, |a, b| if b == 0 { u32::MAX } else { (a as i32).wrapping_div(b as i32) as u32 });
muldiv!(divu, |a, b| a.checked_div(b).unwrap_or(u32::MAX));
muldiv!(rem, |a, b| if b == 0 { a } else { (a as i32).wrapping_rem(b as i32) as u32 });
muldiv!(remu, |a, b| a.checked_rem(b).unwrap_or(a));

const fn r(
    example: &'static str,
    description: &'static str,
    mask: &'static str,
    f: crate::exec::ExecFn,
) -> InstrDesc {
    InstrDesc {
        example,
        description,
        format: InstructionFormat::R,
        mask,
        semantics: Semantics::Exec(f),
    }
}

#[rustfmt::skip]
pub const TABLE: &[InstrDesc] = &[
    r("mul t1, t2, t3", "Multiplication: low 32 bits of t2 * t3", "0000001 ttttt sssss 000 fffff 0110011", mul),
    r("mulh t1, t2, t3", "High 32 bits of signed * signed product", "0000001 ttttt sssss 001 fffff 0110011", mulh),
    r("mulhsu t1, t2, t3", "High 32 bits of signed * unsigned product", "0000001 ttttt sssss 010 fffff 0110011", mulhsu),
    r("mulhu t1, t2, t3", "High 32 bits of unsigned * unsigned product", "0000001 ttttt sssss 011 fffff 0110011", mulhu),
    r("div t1, t2, t3", "Signed division", "0000001 ttttt sssss 100 fffff 0110011", div),
    r("divu t1, t2, t3", "Unsigned division", "0000001 ttttt sssss 101 fffff 0110011", divu),
    r("rem t1, t2, t3", "Signed remainder", "0000001 ttttt sssss 110 fffff 0110011", rem),
    r("remu t1, t2, t3", "Unsigned remainder", "0000001 ttttt sssss 111 fffff 0110011", remu),
];
