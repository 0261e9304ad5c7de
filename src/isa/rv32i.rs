//! RV32I base integer instructions.

use crate::cpu::{MachineState, Trap};
use crate::csr::{UEPC, USTATUS, USTATUS_UIE, USTATUS_UPIE};
use crate::exec::{ExecCtx, Semantics};
use crate::instructions::{InstrDesc, InstructionFormat as F, Operands};

type Res = Result<(), Trap>;

macro_rules! reg_reg {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $name(c: &mut ExecCtx<'_>) -> Res {
            let ($a, $b) = (c.x(1), c.x(2));
            c.set_x(0, $body);
            Ok(())
        }
    };
}

macro_rules! reg_imm {
    ($name:ident, |$a:ident, $imm:ident| $body:expr) => {
        fn $name(c: &mut ExecCtx<'_>) -> Res {
            let ($a, $imm) = (c.x(1), c.imm(2));
            c.set_x(0, $body);
            Ok(())
        }
    };
}

macro_rules! branch {
    ($name:ident, |$a:ident, $b:ident| $cond:expr) => {
        fn $name(s: &MachineState, o: &Operands) -> bool {
            let ($a, $b) = (s.gpr(o.reg(0)), s.gpr(o.reg(1)));
            $cond
        }
    };
}

fn lui(c: &mut ExecCtx<'_>) -> Res {
    c.set_x(0, (c.imm(1) as u32) << 12);
    Ok(())
}

fn auipc(c: &mut ExecCtx<'_>) -> Res {
    c.set_x(0, c.pc.wrapping_add((c.imm(1) as u32) << 12));
    Ok(())
}

fn jal(c: &mut ExecCtx<'_>) -> Res {
    c.set_x(0, c.pc.wrapping_add(4));
    c.jump(c.pc.wrapping_add(c.imm(1) as u32));
    Ok(())
}

fn jalr(c: &mut ExecCtx<'_>) -> Res {
    let target = c.x(1).wrapping_add(c.imm(2) as u32) & !1;
    c.set_x(0, c.pc.wrapping_add(4));
    c.jump(target);
    Ok(())
}

branch!(beq, |a, b| a == b);
branch!(bne, |a, b| a != b);
branch!(blt, |a, b| (a as i32) < (b as i32));
branch!(bge, |a, b| (a as i32) >= (b as i32));
branch!(bltu, |a, b| a < b);
branch!(bgeu, |a, b| a >= b);

/// `op rd, imm(rs1)`: base register is operand 2, offset operand 1.
fn effective_addr(c: &ExecCtx<'_>) -> u32 {
    c.x(2).wrapping_add(c.imm(1) as u32)
}

fn lb(c: &mut ExecCtx<'_>) -> Res {
    let v = c.load_u8(effective_addr(c))?;
    c.set_x(0, v as i8 as i32 as u32);
    Ok(())
}

fn lh(c: &mut ExecCtx<'_>) -> Res {
    let v = c.load_u16(effective_addr(c))?;
    c.set_x(0, v as i16 as i32 as u32);
    Ok(())
}

fn lw(c: &mut ExecCtx<'_>) -> Res {
    let v = c.load_u32(effective_addr(c))?;
    c.set_x(0, v);
    Ok(())
}

fn lbu(c: &mut ExecCtx<'_>) -> Res {
    let v = c.load_u8(effective_addr(c))?;
    c.set_x(0, v as u32);
    Ok(())
}

fn lhu(c: &mut ExecCtx<'_>) -> Res {
    let v = c.load_u16(effective_addr(c))?;
    c.set_x(0, v as u32);
    Ok(())
}

fn sb(c: &mut ExecCtx<'_>) -> Res {
    c.store_u8(effective_addr(c), c.x(0) as u8)
}

fn sh(c: &mut ExecCtx<'_>) -> Res {
    c.store_u16(effective_addr(c), c.x(0) as u16)
}

fn sw(c: &mut ExecCtx<'_>) -> Res {
    c.store_u32(effective_addr(c), c.x(0))
}

reg_imm!(addi, |a, i| a.wrapping_add(i as u32));
reg_imm!(slti, |a, i| ((a as i32) < i) as u32);
reg_imm!(sltiu, |a, i| (a < i as u32) as u32);
reg_imm!(xori, |a, i| a ^ i as u32);
reg_imm!(ori, |a, i| a | i as u32);
reg_imm!(andi, |a, i| a & i as u32);
reg_imm!(slli, |a, i| a << (i & 31));
reg_imm!(srli, |a, i| a >> (i & 31));
reg_imm!(srai, |a, i| ((a as i32) >> (i & 31)) as u32);

reg_reg!(add, |a, b| a.wrapping_add(b));
reg_reg!(sub, |a, b| a.wrapping_sub(b));
reg_reg!(sll, |a, b| a << (b & 31));
reg_reg!(slt, |a, b| ((a as i32) < (b as i32)) as u32);
reg_reg!(sltu, |a, b| (a < b) as u32);
reg_reg!(xor, |a, b| a ^ b);
reg_reg!(srl, |a, b| a >> (b & 31));
reg_reg!(sra, |a, b| ((a as i32) >> (b & 31)) as u32);
reg_reg!(or, |a, b| a | b);
reg_reg!(and, |a, b| a & b);

/// Single hart, in-order memory: ordering and wait hints do nothing.
fn nop(_: &mut ExecCtx<'_>) -> Res {
    Ok(())
}

fn ecall(c: &mut ExecCtx<'_>) -> Res {
    c.syscall()
}

fn ebreak(_: &mut ExecCtx<'_>) -> Res {
    Err(Trap::Breakpoint)
}

fn uret(c: &mut ExecCtx<'_>) -> Res {
    let status = c.read_csr(USTATUS)?;
    let mut next = (status & !USTATUS_UIE) | USTATUS_UPIE;
    if status & USTATUS_UPIE != 0 {
        next |= USTATUS_UIE;
    }
    let epc = c.read_csr(UEPC)?;
    c.write_csr(USTATUS, next)?;
    c.jump(epc);
    Ok(())
}

const fn exec(
    example: &'static str,
    description: &'static str,
    format: F,
    mask: &'static str,
    f: crate::exec::ExecFn,
) -> InstrDesc {
    InstrDesc { example, description, format, mask, semantics: Semantics::Exec(f) }
}

const fn cond(
    example: &'static str,
    description: &'static str,
    mask: &'static str,
    f: crate::exec::BranchFn,
) -> InstrDesc {
    InstrDesc { example, description, format: F::B, mask, semantics: Semantics::Branch(f) }
}

#[rustfmt::skip]
pub const TABLE: &[InstrDesc] = &[
    exec("lui t1, 100", "Load upper immediate: t1 = 100 << 12", F::U, "ssssssssssssssssssss fffff 0110111", lui),
    exec("auipc t1, 100", "Add upper immediate to pc: t1 = pc + (100 << 12)", F::U, "ssssssssssssssssssss fffff 0010111", auipc),
    exec("jal t1, target", "Jump and link: t1 = pc + 4, jump to target", F::J, "ssssssssssssssssssss fffff 1101111", jal),
    exec("jalr t1, t2, -100", "Jump and link register: t1 = pc + 4, jump to (t2 - 100) & ~1", F::I, "tttttttttttt sssss 000 fffff 1100111", jalr),
    cond("beq t1, t2, label", "Branch if equal", "ttttttt sssss fffff 000 ttttt 1100011", beq),
    cond("bne t1, t2, label", "Branch if not equal", "ttttttt sssss fffff 001 ttttt 1100011", bne),
    cond("blt t1, t2, label", "Branch if less than (signed)", "ttttttt sssss fffff 100 ttttt 1100011", blt),
    cond("bge t1, t2, label", "Branch if greater than or equal (signed)", "ttttttt sssss fffff 101 ttttt 1100011", bge),
    cond("bltu t1, t2, label", "Branch if less than (unsigned)", "ttttttt sssss fffff 110 ttttt 1100011", bltu),
    cond("bgeu t1, t2, label", "Branch if greater than or equal (unsigned)", "ttttttt sssss fffff 111 ttttt 1100011", bgeu),
    exec("lb t1, -100(t2)", "Load sign-extended byte", F::I, "ssssssssssss ttttt 000 fffff 0000011", lb),
    exec("lh t1, -100(t2)", "Load sign-extended halfword", F::I, "ssssssssssss ttttt 001 fffff 0000011", lh),
    exec("lw t1, -100(t2)", "Load word", F::I, "ssssssssssss ttttt 010 fffff 0000011", lw),
    exec("lbu t1, -100(t2)", "Load zero-extended byte", F::I, "ssssssssssss ttttt 100 fffff 0000011", lbu),
    exec("lhu t1, -100(t2)", "Load zero-extended halfword", F::I, "ssssssssssss ttttt 101 fffff 0000011", lhu),
    exec("sb t1, -100(t2)", "Store low byte of t1", F::S, "sssssss fffff ttttt 000 sssss 0100011", sb),
    exec("sh t1, -100(t2)", "Store low halfword of t1", F::S, "sssssss fffff ttttt 001 sssss 0100011", sh),
    exec("sw t1, -100(t2)", "Store word", F::S, "sssssss fffff ttttt 010 sssss 0100011", sw),
    exec("addi t1, t2, -100", "Add immediate", F::I, "tttttttttttt sssss 000 fffff 0010011", addi),
    exec("slti t1, t2, -100", "Set if less than immediate (signed)", F::I, "tttttttttttt sssss 010 fffff 0010011", slti),
    exec("sltiu t1, t2, -100", "Set if less than immediate (unsigned compare)", F::I, "tttttttttttt sssss 011 fffff 0010011", sltiu),
    exec("xori t1, t2, -100", "Bitwise XOR with immediate", F::I, "tttttttttttt sssss 100 fffff 0010011", xori),
    exec("ori t1, t2, -100", "Bitwise OR with immediate", F::I, "tttttttttttt sssss 110 fffff 0010011", ori),
    exec("andi t1, t2, -100", "Bitwise AND with immediate", F::I, "tttttttttttt sssss 111 fffff 0010011", andi),
    exec("slli t1, t2, 10", "Shift left logical by immediate", F::IShift, "0000000 ttttt sssss 001 fffff 0010011", slli),
    exec("srli t1, t2, 10", "Shift right logical by immediate", F::IShift, "0000000 ttttt sssss 101 fffff 0010011", srli),
    exec("srai t1, t2, 10", "Shift right arithmetic by immediate", F::IShift, "0100000 ttttt sssss 101 fffff 0010011", srai),
    exec("add t1, t2, t3", "Addition", F::R, "0000000 ttttt sssss 000 fffff 0110011", add),
    exec("sub t1, t2, t3", "Subtraction", F::R, "0100000 ttttt sssss 000 fffff 0110011", sub),
    exec("sll t1, t2, t3", "Shift left logical", F::R, "0000000 ttttt sssss 001 fffff 0110011", sll),
    exec("slt t1, t2, t3", "Set if less than (signed)", F::R, "0000000 ttttt sssss 010 fffff 0110011", slt),
    exec("sltu t1, t2, t3", "Set if less than (unsigned)", F::R, "0000000 ttttt sssss 011 fffff 0110011", sltu),
    exec("xor t1, t2, t3", "Bitwise XOR", F::R, "0000000 ttttt sssss 100 fffff 0110011", xor),
    exec("srl t1, t2, t3", "Shift right logical", F::R, "0000000 ttttt sssss 101 fffff 0110011", srl),
    exec("sra t1, t2, t3", "Shift right arithmetic", F::R, "0100000 ttttt sssss 101 fffff 0110011", sra),
    exec("or t1, t2, t3", "Bitwise OR", F::R, "0000000 ttttt sssss 110 fffff 0110011", or),
    exec("and t1, t2, t3", "Bitwise AND", F::R, "0000000 ttttt sssss 111 fffff 0110011", and),
    exec("fence 1, 1", "Order memory accesses (predecessor, successor sets)", F::Fence, "0000 ffff ssss 00000 000 00000 0001111", nop),
    exec("fence.i", "Synchronize instruction and data streams", F::System, "000000000000 00000 001 00000 0001111", nop),
    exec("ecall", "Environment call; service number in a7", F::System, "000000000000 00000 000 00000 1110011", ecall),
    exec("ebreak", "Breakpoint trap", F::System, "000000000001 00000 000 00000 1110011", ebreak),
    exec("uret", "Return from user trap handler: pc = uepc", F::System, "0000000 00010 00000 000 00000 1110011", uret),
    exec("wfi", "Wait for interrupt", F::System, "0001000 00101 00000 000 00000 1110011", nop),
];
