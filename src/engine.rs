//! Fetch, decode and execute for one hart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::catalog::{Catalog, EntryId};
use crate::config::{SimConfig, TrapPolicy};
use crate::cpu::{Fault, MachineState, Trap};
use crate::csr::{USTATUS_UIE, USTATUS_UPIE};
use crate::decoder::Decoder;
use crate::exec::{Delta, ExecCtx, Semantics};
use crate::instructions::{Operands, WORD_LEN};
use crate::memory::Bus;
use crate::program::Program;
use crate::syscall::SyscallHandler;
use crate::isa::abi::{REG_GP, REG_SP};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    /// Fetching is suspended until [`Engine::resume`] or [`Engine::halt`].
    Trapped(Fault),
    Halted(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halted(i32),
}

#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    pub max_steps: Option<u64>,
    /// Checked after every completed iteration.
    pub stop: Option<Arc<AtomicBool>>,
    pub trap_policy: TrapPolicy,
}

impl RunLimits {
    pub fn from_config(cfg: &SimConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            stop: None,
            trap_policy: cfg.trap_policy,
        }
    }

    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Halted(i32),
    Trapped(Fault),
    BudgetExhausted,
    Stopped,
}

pub struct Engine<'c> {
    catalog: &'c Catalog,
    program: Option<&'c Program>,
    state: MachineState,
    status: Status,
}

impl<'c> Engine<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            program: None,
            state: MachineState::new(),
            status: Status::Running,
        }
    }

    /// Attaches pre-resolved statements and starts at the program's entry.
    /// The program must already be loaded into the bus for data accesses.
    pub fn with_program(catalog: &'c Catalog, program: &'c Program) -> Self {
        let mut engine = Self::new(catalog);
        engine.program = Some(program);
        engine.state.pc = program.entry;
        engine
    }

    /// Sets `sp` and `gp` the way `cfg` describes.
    pub fn init_registers(&mut self, cfg: &SimConfig) {
        self.state.set_gpr(REG_SP, cfg.initial_sp());
        self.state.set_gpr(REG_GP, cfg.initial_gp());
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn resume(&mut self, pc: u32) {
        self.state.pc = pc;
        self.status = Status::Running;
    }

    pub fn halt(&mut self, code: i32) {
        self.status = Status::Halted(code);
    }

    /// Enters the user trap handler for the pending fault.
    ///
    /// Returns `false`, leaving the engine trapped, when no fault is pending,
    /// `utvec` is zero or `ustatus.UIE` is clear.
    pub fn deliver_user_trap(&mut self) -> bool {
        let Status::Trapped(fault) = &self.status else {
            return false;
        };
        let csr = &mut self.state.csr;
        if csr.utvec == 0 || csr.ustatus & USTATUS_UIE == 0 {
            return false;
        }
        csr.uepc = fault.pc;
        csr.ucause = fault.trap.cause();
        csr.utval = fault.trap.tval();
        csr.ustatus &= !(USTATUS_UIE | USTATUS_UPIE);
        csr.ustatus |= USTATUS_UPIE;
        self.state.pc = csr.utvec & !3;
        debug!(
            cause = csr.ucause,
            handler = format_args!("{:#010x}", self.state.pc),
            "user trap delivered"
        );
        self.status = Status::Running;
        true
    }

    fn fetch<B: Bus>(&self, bus: &mut B, pc: u32) -> Result<(EntryId, Operands, u32), Trap> {
        if pc % WORD_LEN != 0 {
            return Err(Trap::InstructionMisaligned { addr: pc });
        }
        if let Some(s) = self.program.and_then(|p| p.statement_at(pc)) {
            return Ok((s.entry, s.operands, s.word));
        }
        let word = bus
            .read_u32(pc)
            .map_err(|e| Trap::InstructionAccess { addr: pc, reason: format!("{e:#}") })?;
        let decoded = self
            .catalog
            .decode(word)
            .ok_or(Trap::IllegalInstruction { word })?;
        Ok((decoded.entry, decoded.operands, word))
    }

    fn execute<B: Bus, S: SyscallHandler>(
        &mut self,
        bus: &mut B,
        sys: &mut S,
    ) -> Result<Option<i32>, Trap> {
        let pc = self.state.pc;
        let (id, ops, word) = self.fetch(bus, pc)?;
        let entry = self.catalog.entry(id);
        trace!(
            pc = format_args!("{pc:#010x}"),
            word = format_args!("{word:#010x}"),
            op = entry.mnemonic,
            ?ops
        );

        let delta = match entry.semantics {
            Semantics::Branch(taken) => {
                let mut delta = Delta::default();
                if taken(&self.state, &ops) {
                    let offset = ops.get(ops.len().saturating_sub(1));
                    delta.next_pc = Some(pc.wrapping_add(offset as u32));
                }
                delta
            }
            Semantics::Exec(run) => {
                let mut ctx = ExecCtx::new(pc, word, &ops, &self.state, bus, sys);
                run(&mut ctx)?;
                ctx.into_delta()
            }
        };

        let next = delta.next_pc.unwrap_or_else(|| pc.wrapping_add(entry.word_len()));
        if next % WORD_LEN != 0 {
            return Err(Trap::InstructionMisaligned { addr: next });
        }
        delta.apply(&mut self.state);
        self.state.pc = next;
        self.state.csr.cycle = self.state.csr.cycle.wrapping_add(1);
        self.state.csr.instret = self.state.csr.instret.wrapping_add(1);
        Ok(delta.halt)
    }

    /// Runs one instruction. A trap leaves the state exactly as it was
    /// before the instruction and suspends the engine.
    pub fn step<B: Bus, S: SyscallHandler>(
        &mut self,
        bus: &mut B,
        sys: &mut S,
    ) -> Result<Step, Fault> {
        match &self.status {
            Status::Running => {}
            Status::Trapped(fault) => return Err(fault.clone()),
            Status::Halted(code) => return Ok(Step::Halted(*code)),
        }
        let pc = self.state.pc;
        match self.execute(bus, sys) {
            Ok(None) => Ok(Step::Continue),
            Ok(Some(code)) => {
                debug!(code, pc = format_args!("{pc:#010x}"), "halted");
                self.status = Status::Halted(code);
                Ok(Step::Halted(code))
            }
            Err(trap) => {
                debug!(%trap, pc = format_args!("{pc:#010x}"), "trap");
                let fault = Fault { trap, pc };
                self.status = Status::Trapped(fault.clone());
                Err(fault)
            }
        }
    }

    pub fn run<B: Bus, S: SyscallHandler>(
        &mut self,
        bus: &mut B,
        sys: &mut S,
        limits: &RunLimits,
    ) -> RunOutcome {
        let mut steps = 0u64;
        loop {
            if limits.max_steps.is_some_and(|max| steps >= max) {
                debug!(steps, "step budget exhausted");
                return RunOutcome::BudgetExhausted;
            }
            match self.step(bus, sys) {
                Ok(Step::Continue) => {}
                Ok(Step::Halted(code)) => return RunOutcome::Halted(code),
                Err(fault) => {
                    if limits.trap_policy != TrapPolicy::Deliver || !self.deliver_user_trap() {
                        return RunOutcome::Trapped(fault);
                    }
                }
            }
            steps += 1;
            if limits.stop.as_ref().is_some_and(|s| s.load(Ordering::Acquire)) {
                debug!(steps, "stop requested");
                return RunOutcome::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;
    use crate::syscall::NoSyscalls;
    use pretty_assertions::assert_eq;

    #[test]
    fn illegal_word_traps_and_stays_trapped() {
        let catalog = Catalog::standard().unwrap();
        let mut mem = LinearMemory::new(64);
        let mut engine = Engine::new(catalog);
        let fault = engine.step(&mut mem, &mut NoSyscalls).unwrap_err();
        assert_eq!(fault, Fault { trap: Trap::IllegalInstruction { word: 0 }, pc: 0 });
        assert_eq!(engine.step(&mut mem, &mut NoSyscalls), Err(fault));
        assert_eq!(engine.state().csr.instret, 0);

        mem.write_u32(8, 0x0010_0093).unwrap(); // addi x1, x0, 1
        engine.resume(8);
        assert_eq!(engine.step(&mut mem, &mut NoSyscalls), Ok(Step::Continue));
        assert_eq!(engine.state().gpr(1), 1);
        assert_eq!(engine.state().pc, 12);
    }
}
