//! RV32F single-precision floating point.
//!
//! All arithmetic goes through [`crate::softfloat`]; the rounding-mode
//! operand (always the last one) selects the mode, with `dyn` reading `frm`.

use crate::cpu::Trap;
use crate::exec::{ExecCtx, Semantics};
use crate::instructions::{InstrDesc, InstructionFormat as F};
use crate::softfloat::{self as sf, Env, SIGN};

type Res = Result<(), Trap>;

macro_rules! fp_binary {
    ($name:ident, $op:path) => {
        fn $name(c: &mut ExecCtx<'_>) -> Res {
            let mut env = c.fp_env(3)?;
            let r = $op(c.f(1), c.f(2), &mut env);
            c.merge_flags(&env);
            c.set_f(0, r);
            Ok(())
        }
    };
}

macro_rules! fp_fused {
    ($name:ident, $negate_product:expr, $negate_addend:expr) => {
        fn $name(c: &mut ExecCtx<'_>) -> Res {
            let mut env = c.fp_env(4)?;
            let r = sf::mul_add(c.f(1), c.f(2), c.f(3), $negate_product, $negate_addend, &mut env);
            c.merge_flags(&env);
            c.set_f(0, r);
            Ok(())
        }
    };
}

macro_rules! fp_compare {
    ($name:ident, $op:path) => {
        fn $name(c: &mut ExecCtx<'_>) -> Res {
            let mut env = Env::default();
            let r = $op(c.f(1), c.f(2), &mut env);
            c.merge_flags(&env);
            c.set_x(0, r as u32);
            Ok(())
        }
    };
}

fn flw(c: &mut ExecCtx<'_>) -> Res {
    let addr = c.x(2).wrapping_add(c.imm(1) as u32);
    let v = c.load_u32(addr)?;
    c.set_f(0, v);
    Ok(())
}

fn fsw(c: &mut ExecCtx<'_>) -> Res {
    let addr = c.x(2).wrapping_add(c.imm(1) as u32);
    c.store_u32(addr, c.f(0))
}

fp_fused!(fmadd, false, false);
fp_fused!(fmsub, false, true);
fp_fused!(fnmsub, true, false);
fp_fused!(fnmadd, true, true);

fp_binary!(fadd, sf::add);
fp_binary!(fsub, sf::sub);
fp_binary!(fmul, sf::mul);
fp_binary!(fdiv, sf::div);

fn fsqrt(c: &mut ExecCtx<'_>) -> Res {
    let mut env = c.fp_env(2)?;
    let r = sf::sqrt(c.f(1), &mut env);
    c.merge_flags(&env);
    c.set_f(0, r);
    Ok(())
}

fn fsgnj(c: &mut ExecCtx<'_>) -> Res {
    c.set_f(0, (c.f(1) & !SIGN) | (c.f(2) & SIGN));
    Ok(())
}

fn fsgnjn(c: &mut ExecCtx<'_>) -> Res {
    c.set_f(0, (c.f(1) & !SIGN) | (!c.f(2) & SIGN));
    Ok(())
}

fn fsgnjx(c: &mut ExecCtx<'_>) -> Res {
    c.set_f(0, c.f(1) ^ (c.f(2) & SIGN));
    Ok(())
}

fn fmin(c: &mut ExecCtx<'_>) -> Res {
    let mut env = Env::default();
    let r = sf::min(c.f(1), c.f(2), &mut env);
    c.merge_flags(&env);
    c.set_f(0, r);
    Ok(())
}

fn fmax(c: &mut ExecCtx<'_>) -> Res {
    let mut env = Env::default();
    let r = sf::max(c.f(1), c.f(2), &mut env);
    c.merge_flags(&env);
    c.set_f(0, r);
    Ok(())
}

fn fcvt_w_s(c: &mut ExecCtx<'_>) -> Res {
    let mut env = c.fp_env(2)?;
    let r = sf::to_i32(c.f(1), &mut env);
    c.merge_flags(&env);
    c.set_x(0, r as u32);
    Ok(())
}

fn fcvt_wu_s(c: &mut ExecCtx<'_>) -> Res {
    let mut env = c.fp_env(2)?;
    let r = sf::to_u32(c.f(1), &mut env);
    c.merge_flags(&env);
    c.set_x(0, r);
    Ok(())
}

fn fmv_x_w(c: &mut ExecCtx<'_>) -> Res {
    c.set_x(0, c.f(1));
    Ok(())
}

fp_compare!(feq, sf::eq);
fp_compare!(flt, sf::lt);
fp_compare!(fle, sf::le);

fn fclass(c: &mut ExecCtx<'_>) -> Res {
    c.set_x(0, sf::classify(c.f(1)));
    Ok(())
}

fn fcvt_s_w(c: &mut ExecCtx<'_>) -> Res {
    let mut env = c.fp_env(2)?;
    let r = sf::from_i32(c.x(1) as i32, &mut env);
    c.merge_flags(&env);
    c.set_f(0, r);
    Ok(())
}

fn fcvt_s_wu(c: &mut ExecCtx<'_>) -> Res {
    let mut env = c.fp_env(2)?;
    let r = sf::from_u32(c.x(1), &mut env);
    c.merge_flags(&env);
    c.set_f(0, r);
    Ok(())
}

fn fmv_w_x(c: &mut ExecCtx<'_>) -> Res {
    c.set_f(0, c.x(1));
    Ok(())
}

const fn fp(
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
    fp("flw f1, -100(t1)", "Load float word", F::I, "ssssssssssss ttttt 010 fffff 0000111", flw),
    fp("fsw f1, -100(t1)", "Store float word", F::S, "sssssss fffff ttttt 010 sssss 0100111", fsw),
    fp("fmadd.s f1, f2, f3, f4, dyn", "Fused multiply-add: f1 = f2 * f3 + f4", F::R4, "qqqqq 00 ttttt sssss ppp fffff 1000011", fmadd),
    fp("fmsub.s f1, f2, f3, f4, dyn", "Fused multiply-subtract: f1 = f2 * f3 - f4", F::R4, "qqqqq 00 ttttt sssss ppp fffff 1000111", fmsub),
    fp("fnmsub.s f1, f2, f3, f4, dyn", "Negated fused multiply-subtract: f1 = -(f2 * f3) + f4", F::R4, "qqqqq 00 ttttt sssss ppp fffff 1001011", fnmsub),
    fp("fnmadd.s f1, f2, f3, f4, dyn", "Negated fused multiply-add: f1 = -(f2 * f3) - f4", F::R4, "qqqqq 00 ttttt sssss ppp fffff 1001111", fnmadd),
    fp("fadd.s f1, f2, f3, dyn", "Floating point addition", F::R, "0000000 ttttt sssss qqq fffff 1010011", fadd),
    fp("fsub.s f1, f2, f3, dyn", "Floating point subtraction", F::R, "0000100 ttttt sssss qqq fffff 1010011", fsub),
    fp("fmul.s f1, f2, f3, dyn", "Floating point multiplication", F::R, "0001000 ttttt sssss qqq fffff 1010011", fmul),
    fp("fdiv.s f1, f2, f3, dyn", "Floating point division", F::R, "0001100 ttttt sssss qqq fffff 1010011", fdiv),
    fp("fsqrt.s f1, f2, dyn", "Floating point square root", F::R, "0101100 00000 sssss ttt fffff 1010011", fsqrt),
    fp("fsgnj.s f1, f2, f3", "Magnitude of f2 with the sign of f3", F::R, "0010000 ttttt sssss 000 fffff 1010011", fsgnj),
    fp("fsgnjn.s f1, f2, f3", "Magnitude of f2 with the inverted sign of f3", F::R, "0010000 ttttt sssss 001 fffff 1010011", fsgnjn),
    fp("fsgnjx.s f1, f2, f3", "f2 with its sign XORed with the sign of f3", F::R, "0010000 ttttt sssss 010 fffff 1010011", fsgnjx),
    fp("fmin.s f1, f2, f3", "Floating point minimum", F::R, "0010100 ttttt sssss 000 fffff 1010011", fmin),
    fp("fmax.s f1, f2, f3", "Floating point maximum", F::R, "0010100 ttttt sssss 001 fffff 1010011", fmax),
    fp("fcvt.w.s t1, f1, dyn", "Convert float to signed integer", F::R, "1100000 00000 sssss ttt fffff 1010011", fcvt_w_s),
    fp("fcvt.wu.s t1, f1, dyn", "Convert float to unsigned integer", F::R, "1100000 00001 sssss ttt fffff 1010011", fcvt_wu_s),
    fp("fmv.x.w t1, f1", "Move float bits to integer register", F::R, "1110000 00000 sssss 000 fffff 1010011", fmv_x_w),
    fp("feq.s t1, f1, f2", "Set if equal (quiet comparison)", F::R, "1010000 ttttt sssss 010 fffff 1010011", feq),
    fp("flt.s t1, f1, f2", "Set if less than (signaling comparison)", F::R, "1010000 ttttt sssss 001 fffff 1010011", flt),
    fp("fle.s t1, f1, f2", "Set if less than or equal (signaling comparison)", F::R, "1010000 ttttt sssss 000 fffff 1010011", fle),
    fp("fclass.s t1, f1", "Classify float into a 10-bit mask", F::R, "1110000 00000 sssss 001 fffff 1010011", fclass),
    fp("fcvt.s.w f1, t1, dyn", "Convert signed integer to float", F::R, "1101000 00000 sssss ttt fffff 1010011", fcvt_s_w),
    fp("fcvt.s.wu f1, t1, dyn", "Convert unsigned integer to float", F::R, "1101000 00001 sssss ttt fffff 1010011", fcvt_s_wu),
    fp("fmv.w.x f1, t1", "Move integer bits to float register", F::R, "1111000 00000 sssss 000 fffff 1010011", fmv_w_x),
];
