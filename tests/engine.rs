use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use rv32_rs::csr::{USTATUS_UIE, USTATUS_UPIE};
use rv32_rs::{
    Assembler, Bus, Catalog, Console, Engine, Fault, LinearMemory, MachineState, NoSyscalls,
    Program, RunLimits, RunOutcome, SimConfig, Status, Step, Trap, TrapPolicy,
};

fn build(src: &str) -> (Program, LinearMemory) {
    let catalog = Catalog::standard().unwrap();
    let program = Assembler::new(catalog).assemble(src).unwrap();
    let mut mem = LinearMemory::new(1 << 16);
    program.load(&mut mem).unwrap();
    (program, mem)
}

fn limits(max_steps: u64) -> RunLimits {
    RunLimits { max_steps: Some(max_steps), ..Default::default() }
}

#[test]
fn writes_to_x0_are_discarded() {
    let (program, mut mem) = build("addi x0, x0, 5\nlui zero, 1\nadd a0, zero, zero\nebreak\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    engine.run(&mut mem, &mut NoSyscalls, &limits(10));
    assert_eq!(engine.state().gpr(0), 0);
    assert_eq!(engine.state().gpr(10), 0);

    let mut state = MachineState::new();
    state.set_gpr(0, 0xDEAD_BEEF);
    assert_eq!(state.gpr(0), 0);
}

#[test]
fn faulting_load_changes_nothing() {
    let (program, mut mem) = build("li t0, 9\nlw t0, 0(t1)\nli t0, 1\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    engine.state_mut().set_gpr(6, 0x0010_0000);
    assert_eq!(engine.step(&mut mem, &mut NoSyscalls), Ok(Step::Continue));
    let before = engine.state().clone();

    let fault = engine.step(&mut mem, &mut NoSyscalls).unwrap_err();
    assert!(matches!(fault.trap, Trap::LoadAccess { addr: 0x0010_0000, .. }), "{fault:?}");
    assert_eq!(fault.pc, 4);
    assert_eq!(engine.state(), &before);
    assert_eq!(engine.status(), &Status::Trapped(fault.clone()));
    // Stays trapped until the owner decides.
    assert_eq!(engine.step(&mut mem, &mut NoSyscalls), Err(fault));

    engine.resume(8);
    assert_eq!(engine.step(&mut mem, &mut NoSyscalls), Ok(Step::Continue));
    assert_eq!(engine.state().gpr(5), 1);
}

#[test]
fn misaligned_accesses_trap() {
    let (program, mut mem) = build("lh a0, 1(zero)\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let fault = engine.step(&mut mem, &mut NoSyscalls).unwrap_err();
    assert_eq!(fault.trap, Trap::LoadMisaligned { addr: 1 });

    let (program, mut mem) = build("sw a0, 2(zero)\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let fault = engine.step(&mut mem, &mut NoSyscalls).unwrap_err();
    assert_eq!(fault.trap, Trap::StoreMisaligned { addr: 2 });
    assert_eq!(mem.read_u32(0).unwrap(), program.statements[0].word);
}

#[test]
fn misaligned_jump_target_traps_without_linking() {
    let (program, mut mem) = build("li t0, 0x102\njalr ra, t0, 0\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &limits(10));
    let trap = Trap::InstructionMisaligned { addr: 0x102 };
    assert_eq!(outcome, RunOutcome::Trapped(Fault { trap, pc: 4 }));
    assert_eq!(engine.state().gpr(1), 0);
    assert_eq!(engine.state().pc, 4);
    assert_eq!(engine.state().csr.instret, 1);
}

#[test]
fn decodes_from_memory_without_a_program() {
    let (program, mut mem) = build("li a0, 5\naddi a0, a0, 2\nebreak\n");
    let mut engine = Engine::new(Catalog::standard().unwrap());
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &limits(10));
    assert_eq!(outcome, RunOutcome::Trapped(Fault { trap: Trap::Breakpoint, pc: 8 }));
    assert_eq!(engine.state().gpr(10), 7);
    assert_eq!(program.statements.len(), 3);
}

#[test]
fn step_budget_bounds_runaway_loops() {
    let (program, mut mem) = build("loop: j loop\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    assert_eq!(engine.run(&mut mem, &mut NoSyscalls, &limits(100)), RunOutcome::BudgetExhausted);
    assert_eq!(engine.state().csr.instret, 100);
    assert_eq!(engine.state().csr.cycle, 100);
    assert_eq!(engine.status(), &Status::Running);
}

#[test]
fn stop_flag_is_checked_between_instructions() {
    let (program, mut mem) = build("loop: j loop\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let stop = Arc::new(AtomicBool::new(true));
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &RunLimits::default().with_stop(stop));
    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(engine.state().csr.instret, 1);
}

#[test]
fn engines_run_concurrently_on_a_shared_catalog() {
    let catalog = Catalog::standard().unwrap();
    let src = "
        li t0, 0
        li a0, 0
    loop:
        addi t0, t0, 1
        mul t1, t0, t0
        add a0, a0, t1
        blt t0, a1, loop
        ebreak
    ";
    let program = Assembler::new(catalog).assemble(src).unwrap();
    let results: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=4u32)
            .map(|n| {
                let program = &program;
                scope.spawn(move || {
                    let mut mem = LinearMemory::new(4096);
                    program.load(&mut mem).unwrap();
                    let mut engine = Engine::with_program(catalog, program);
                    engine.state_mut().set_gpr(11, n * 10);
                    engine.run(&mut mem, &mut NoSyscalls, &limits(10_000));
                    engine.state().gpr(10)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    // sum of squares 1..=k
    let expected: Vec<u32> = (1..=4u32).map(|n| (1..=n * 10).map(|k| k * k).sum()).collect();
    assert_eq!(results, expected);
}

const TRAP_PROGRAM: &str = "
main:
    la t0, handler
    csrw utvec, t0
    csrsi ustatus, 1
    ebreak
    li a0, 42
    li a7, 93
    ecall
handler:
    csrr t1, uepc
    addi t1, t1, 4
    csrw uepc, t1
    uret
";

#[test]
fn traps_are_delivered_to_the_user_handler() {
    let (program, mut mem) = build(TRAP_PROGRAM);
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let mut console = Console::new(&b""[..], Vec::new());
    let policy = RunLimits { max_steps: Some(100), stop: None, trap_policy: TrapPolicy::Deliver };
    assert_eq!(engine.run(&mut mem, &mut console, &policy), RunOutcome::Halted(42));

    let csr = &engine.state().csr;
    assert_eq!(csr.ucause, 3);
    assert_eq!(csr.uepc, 20);
    assert_eq!(csr.utval, 0);
    // uret restored UIE from UPIE
    assert_eq!(csr.ustatus & (USTATUS_UIE | USTATUS_UPIE), USTATUS_UIE | USTATUS_UPIE);
    assert_eq!(engine.status(), &Status::Halted(42));
}

#[test]
fn stop_policy_returns_the_fault() {
    let (program, mut mem) = build(TRAP_PROGRAM);
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let cfg = SimConfig::default();
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &RunLimits::from_config(&cfg));
    assert_eq!(outcome, RunOutcome::Trapped(Fault { trap: Trap::Breakpoint, pc: 16 }));
    assert_eq!(engine.state().csr.ucause, 0);

    // The owner can still hand the fault to the handler afterwards.
    assert!(engine.deliver_user_trap());
    assert_eq!(engine.state().pc, 32);
    assert_eq!(engine.status(), &Status::Running);
}

#[test]
fn read_only_csrs_are_illegal_to_write() {
    let (program, mut mem) = build("csrr a0, cycle\ncsrw cycle, a0\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    let outcome = engine.run(&mut mem, &mut NoSyscalls, &limits(10));
    let word = program.statements[1].word;
    let trap = Trap::IllegalInstruction { word };
    assert_eq!(outcome, RunOutcome::Trapped(Fault { trap, pc: 4 }));
    assert_eq!(engine.state().gpr(10), 0);
}

#[test]
fn config_seeds_stack_and_global_pointers() {
    let (program, _) = build("nop\n");
    let mut engine = Engine::with_program(Catalog::standard().unwrap(), &program);
    engine.init_registers(&SimConfig { memory_size: 0x1_0000, ..SimConfig::default() });
    assert_eq!(engine.state().gpr(2), 0x1_0000);
    assert_eq!(engine.state().gpr(3), 0x2800);
}
