use pretty_assertions::assert_eq;

use rv32_rs::softfloat::{self, Env, FpFlags, RoundingMode, CANONICAL_NAN};
use rv32_rs::{
    Assembler, Catalog, Engine, Fault, LinearMemory, MachineState, NoSyscalls, RunLimits,
    RunOutcome, Trap,
};

fn run_with(src: &str, setup: impl FnOnce(&mut MachineState)) -> (RunOutcome, MachineState) {
    let catalog = Catalog::standard().unwrap();
    let program = Assembler::new(catalog).assemble(src).unwrap();
    let mut mem = LinearMemory::new(1 << 16);
    program.load(&mut mem).unwrap();
    let mut engine = Engine::with_program(catalog, &program);
    setup(engine.state_mut());
    let limits = RunLimits { max_steps: Some(1_000), ..Default::default() };
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &limits);
    (outcome, engine.state().clone())
}

#[test]
fn fcvt_s_w_uses_frm_for_dyn() {
    let (_, state) = run_with("fcvt.s.w f1, t0\nebreak\n", |s| {
        s.set_gpr(5, -7i32 as u32);
        s.csr.frm = RoundingMode::Rne as u8;
    });
    assert_eq!(state.fpr(1), 0xC0E0_0000);
    assert_eq!(state.csr.fflags, FpFlags::empty());
}

#[test]
fn rounding_mode_operand_overrides_frm() {
    // 16777217 is not representable; rtz and rup land on either side
    let src = "fcvt.s.w f1, t0, rtz\nfcvt.s.w f2, t0, rup\nfcvt.s.w f3, t0\nebreak\n";
    let (_, state) = run_with(src, |s| {
        s.set_gpr(5, 16_777_217);
        s.csr.frm = RoundingMode::Rup as u8;
    });
    assert_eq!(state.fpr(1), 0x4B80_0000);
    assert_eq!(state.fpr(2), 0x4B80_0001);
    assert_eq!(state.fpr(3), 0x4B80_0001);
    assert_eq!(state.csr.fflags, FpFlags::INEXACT);
}

#[test]
fn exception_flags_are_sticky() {
    let (_, state) = run_with(
        "
        fcvt.s.w f1, t0
        fcvt.s.w f2, zero
        fdiv.s f3, f1, f2
        fadd.s f4, f1, f1
        ebreak
    ",
        |s| s.set_gpr(5, 1),
    );
    assert_eq!(state.fpr(3), 0x7F80_0000);
    assert_eq!(state.fpr(4), 0x4000_0000);
    assert_eq!(state.csr.fflags, FpFlags::DIVIDE_BY_ZERO);
}

#[test]
fn invalid_operations_yield_canonical_nan() {
    let (_, state) = run_with(
        "
        fsqrt.s f1, f2
        fmv.w.x f3, t0
        fadd.s f4, f3, f3
        ebreak
    ",
        |s| {
            s.set_fpr(2, 0xBF80_0000); // -1.0
            s.set_gpr(5, 0x7F80_0001); // signaling NaN
        },
    );
    assert_eq!(state.fpr(1), CANONICAL_NAN);
    assert_eq!(state.fpr(4), CANONICAL_NAN);
    assert_eq!(state.csr.fflags, FpFlags::INVALID);
}

#[test]
fn reserved_frm_makes_dynamic_ops_illegal() {
    let (outcome, state) = run_with("fadd.s f1, f2, f3\n", |s| s.csr.frm = 5);
    assert_eq!(
        outcome,
        RunOutcome::Trapped(Fault { trap: Trap::IllegalInstruction { word: 0x0031_70D3 }, pc: 0 })
    );
    assert_eq!(state.fpr(1), 0);
}

#[test]
fn flags_are_readable_and_clearable_through_csrs() {
    let (_, state) = run_with(
        "
        fdiv.s f3, f1, f2
        frflags a0
        fsflags zero
        frflags a1
        ebreak
    ",
        |s| s.set_fpr(1, 0x3F80_0000),
    );
    assert_eq!(state.gpr(10), FpFlags::DIVIDE_BY_ZERO.bits() as u32);
    assert_eq!(state.gpr(11), 0);
}

#[test]
fn conversions_saturate_with_invalid() {
    let mut env = Env::new(RoundingMode::Rtz);
    assert_eq!(softfloat::to_i32(0x4F80_0000, &mut env), i32::MAX); // 2^32
    assert_eq!(env.flags, FpFlags::INVALID);
    let mut env = Env::new(RoundingMode::Rtz);
    assert_eq!(softfloat::to_u32(0xBF80_0000, &mut env), 0); // -1.0
    assert_eq!(env.flags, FpFlags::INVALID);
    let mut env = Env::new(RoundingMode::Rne);
    assert_eq!(softfloat::to_i32(CANONICAL_NAN, &mut env), i32::MAX);
}
