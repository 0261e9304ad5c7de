//! Zicsr control and status register access.
//!
//! The set/clear forms skip the write when the source is `x0` (or a zero
//! immediate), so they can read read-only counters.

use crate::cpu::Trap;
use crate::exec::{ExecCtx, Semantics};
use crate::instructions::{InstrDesc, InstructionFormat as F};

type Res = Result<(), Trap>;

fn csr_addr(c: &ExecCtx<'_>) -> u16 {
    c.imm(1) as u16
}

fn csrrw(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    c.write_csr(addr, c.x(2))?;
    c.set_x(0, old);
    Ok(())
}

fn csrrs(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    if c.ops.reg(2) != 0 {
        c.write_csr(addr, old | c.x(2))?;
    }
    c.set_x(0, old);
    Ok(())
}

fn csrrc(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    if c.ops.reg(2) != 0 {
        c.write_csr(addr, old & !c.x(2))?;
    }
    c.set_x(0, old);
    Ok(())
}

fn csrrwi(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    c.write_csr(addr, c.imm(2) as u32)?;
    c.set_x(0, old);
    Ok(())
}

fn csrrsi(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    let zimm = c.imm(2) as u32;
    if zimm != 0 {
        c.write_csr(addr, old | zimm)?;
    }
    c.set_x(0, old);
    Ok(())
}

fn csrrci(c: &mut ExecCtx<'_>) -> Res {
    let addr = csr_addr(c);
    let old = c.read_csr(addr)?;
    let zimm = c.imm(2) as u32;
    if zimm != 0 {
        c.write_csr(addr, old & !zimm)?;
    }
    c.set_x(0, old);
    Ok(())
}

const fn csr(
    example: &'static str,
    description: &'static str,
    format: F,
    mask: &'static str,
    f: crate::exec::ExecFn,
) -> InstrDesc {
    InstrDesc { example, description, format, mask, semantics: Semantics::Exec(f) }
}

#[rustfmt::skip]
pub const TABLE: &[InstrDesc] = &[
    csr("csrrw t0, fcsr, t1", "Atomic read/write CSR: t0 = csr, csr = t1", F::Csr, "ssssssssssss ttttt 001 fffff 1110011", csrrw),
    csr("csrrs t0, fcsr, t1", "Atomic read and set bits: t0 = csr, csr |= t1", F::Csr, "ssssssssssss ttttt 010 fffff 1110011", csrrs),
    csr("csrrc t0, fcsr, t1", "Atomic read and clear bits: t0 = csr, csr &= ~t1", F::Csr, "ssssssssssss ttttt 011 fffff 1110011", csrrc),
    csr("csrrwi t0, fcsr, 10", "Atomic read/write CSR immediate", F::CsrImm, "ssssssssssss ttttt 101 fffff 1110011", csrrwi),
    csr("csrrsi t0, fcsr, 10", "Atomic read and set bits immediate", F::CsrImm, "ssssssssssss ttttt 110 fffff 1110011", csrrsi),
    csr("csrrci t0, fcsr, 10", "Atomic read and clear bits immediate", F::CsrImm, "ssssssssssss ttttt 111 fffff 1110011", csrrci),
];
