use pretty_assertions::assert_eq;

use rv32_rs::exec::Semantics;
use rv32_rs::instructions::Operands;
use rv32_rs::{
    Assembler, Catalog, Engine, Fault, LinearMemory, MachineState, NoSyscalls, RunLimits,
    RunOutcome, Trap,
};

fn will_branch(mnemonic: &str, state: &MachineState, ops: &[i32]) -> bool {
    let catalog = Catalog::standard().unwrap();
    let entry = catalog.entry(catalog.lookup(mnemonic).unwrap());
    match entry.semantics {
        Semantics::Branch(taken) => taken(state, &Operands::from_slice(ops)),
        Semantics::Exec(_) => panic!("{mnemonic} is not a branch"),
    }
}

fn regs(a: u32, b: u32) -> MachineState {
    let mut s = MachineState::new();
    s.set_gpr(6, a);
    s.set_gpr(7, b);
    s
}

/// Runs `src` until it traps (programs end in `ebreak`).
fn run(src: &str) -> (RunOutcome, MachineState) {
    let catalog = Catalog::standard().unwrap();
    let program = Assembler::new(catalog).assemble(src).unwrap();
    let mut mem = LinearMemory::new(1 << 16);
    program.load(&mut mem).unwrap();
    let mut engine = Engine::with_program(catalog, &program);
    let limits = RunLimits { max_steps: Some(10_000), ..Default::default() };
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &limits);
    (outcome, engine.state().clone())
}

#[test]
fn bge_compares_signed() {
    assert!(will_branch("bge", &regs(5, 5), &[6, 7, 8]));
    assert!(!will_branch("bge", &regs(-1i32 as u32, 1), &[6, 7, 8]));
    assert!(will_branch("bgeu", &regs(-1i32 as u32, 1), &[6, 7, 8]));
    assert!(will_branch("blt", &regs(-1i32 as u32, 1), &[6, 7, 8]));
    assert!(!will_branch("bltu", &regs(-1i32 as u32, 1), &[6, 7, 8]));
    assert!(will_branch("beq", &regs(9, 9), &[6, 7, -4]));
    assert!(!will_branch("bne", &regs(9, 9), &[6, 7, -4]));
}

#[test]
fn branch_predicates_leave_state_untouched() {
    let mut state = regs(3, 0x8000_0000);
    state.pc = 0x40;
    state.set_fpr(2, 0x3F80_0000);
    state.csr.frm = 1;
    let snapshot = state.clone();
    for m in ["beq", "bne", "blt", "bge", "bltu", "bgeu"] {
        let _ = will_branch(m, &state, &[6, 7, 16]);
        let _ = will_branch(m, &state, &[7, 6, -16]);
    }
    assert_eq!(state, snapshot);
}

#[test]
fn taken_branch_skips_and_loop_counts() {
    // a0 = 1 + 2 + ... + 10
    let (outcome, state) = run(
        "
        li t0, 1
        li t1, 11
        li a0, 0
    loop:
        add a0, a0, t0
        addi t0, t0, 1
        blt t0, t1, loop
        beq a0, a0, done
        li a0, -1
    done:
        ebreak
    ",
    );
    assert_eq!(state.gpr(10), 55);
    assert_eq!(outcome, RunOutcome::Trapped(Fault { trap: Trap::Breakpoint, pc: state.pc }));
}

#[test]
fn jal_and_jalr_link_the_return_address() {
    let (_, state) = run(
        "
        jal ra, sub
        li a1, 7
        ebreak
    sub:
        li a0, 3
        jalr x0, ra, 0
    ",
    );
    assert_eq!(state.gpr(1), 4);
    assert_eq!(state.gpr(10), 3);
    assert_eq!(state.gpr(11), 7);
    assert_eq!(state.pc, 8);
}

#[test]
fn call_and_ret_pseudos() {
    let (_, state) = run(
        "
    main:
        li a0, 20
        call double
        ebreak
    double:
        add a0, a0, a0
        ret
    ",
    );
    assert_eq!(state.gpr(10), 40);
    assert_eq!(state.gpr(1), 12);
}
