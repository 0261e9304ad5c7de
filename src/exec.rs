//! Execution context handed to instruction semantics.
//!
//! Semantics never mutate the machine state directly. They read the
//! pre-instruction state and record a [`Delta`]; the engine applies it only
//! when the instruction completes without trapping.

use std::fmt;

use crate::cpu::{MachineState, Trap};
use crate::csr::CsrFile;
use crate::instructions::Operands;
use crate::memory::Bus;
use crate::softfloat::{Env, FpFlags, RoundingMode, RM_DYNAMIC};
use crate::syscall::SyscallHandler;

pub type ExecFn = fn(&mut ExecCtx<'_>) -> Result<(), Trap>;
pub type BranchFn = fn(&MachineState, &Operands) -> bool;

/// What an entry does when executed.
#[derive(Clone, Copy)]
pub enum Semantics {
    /// General operation recording its effects in the context.
    Exec(ExecFn),
    /// Pure branch predicate; the last operand is the pc-relative offset.
    Branch(BranchFn),
}

impl fmt::Debug for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantics::Exec(_) => f.write_str("Exec"),
            Semantics::Branch(_) => f.write_str("Branch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Gpr(u8, u32),
    Fpr(u8, u32),
    Csr(u16, u32),
}

/// Effects of one instruction, applied atomically by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub writes: Vec<Write>,
    /// ORed into `fflags`.
    pub flags: FpFlags,
    pub next_pc: Option<u32>,
    pub halt: Option<i32>,
}

impl Delta {
    pub fn apply(&self, state: &mut MachineState) {
        for w in &self.writes {
            match *w {
                Write::Gpr(r, v) => state.set_gpr(r, v),
                Write::Fpr(r, v) => state.set_fpr(r, v),
                Write::Csr(a, v) => state.csr.write(a, v),
            }
        }
        state.csr.fflags |= self.flags;
    }
}

pub struct ExecCtx<'a> {
    pub pc: u32,
    pub word: u32,
    pub ops: &'a Operands,
    pub state: &'a MachineState,
    bus: &'a mut dyn Bus,
    syscalls: &'a mut dyn SyscallHandler,
    delta: Delta,
}

impl<'a> ExecCtx<'a> {
    pub fn new(
        pc: u32,
        word: u32,
        ops: &'a Operands,
        state: &'a MachineState,
        bus: &'a mut dyn Bus,
        syscalls: &'a mut dyn SyscallHandler,
    ) -> Self {
        Self { pc, word, ops, state, bus, syscalls, delta: Delta::default() }
    }

    pub fn into_delta(self) -> Delta {
        self.delta
    }

    pub fn illegal(&self) -> Trap {
        Trap::IllegalInstruction { word: self.word }
    }

    /// Integer register named by operand `i`.
    pub fn x(&self, i: usize) -> u32 {
        self.state.gpr(self.ops.reg(i))
    }

    /// Float register named by operand `i`.
    pub fn f(&self, i: usize) -> u32 {
        self.state.fpr(self.ops.reg(i))
    }

    pub fn imm(&self, i: usize) -> i32 {
        self.ops.get(i)
    }

    pub fn set_x(&mut self, i: usize, value: u32) {
        let r = self.ops.reg(i);
        self.delta.writes.push(Write::Gpr(r, value));
    }

    pub fn set_f(&mut self, i: usize, value: u32) {
        let r = self.ops.reg(i);
        self.delta.writes.push(Write::Fpr(r, value));
    }

    pub fn read_csr(&self, addr: u16) -> Result<u32, Trap> {
        self.state.csr.read(addr).ok_or_else(|| self.illegal())
    }

    pub fn write_csr(&mut self, addr: u16, value: u32) -> Result<(), Trap> {
        if !CsrFile::is_writable(addr) {
            return Err(self.illegal());
        }
        self.delta.writes.push(Write::Csr(addr, value));
        Ok(())
    }

    pub fn jump(&mut self, target: u32) {
        self.delta.next_pc = Some(target);
    }

    pub fn halt(&mut self, code: i32) {
        self.delta.halt = Some(code);
    }

    /// Environment for the rounding-mode operand `i`, resolving `dyn` via `frm`.
    pub fn fp_env(&self, i: usize) -> Result<Env, Trap> {
        let bits = self.ops.get(i) as u8;
        let mode = if bits == RM_DYNAMIC {
            self.state.csr.rounding_mode()
        } else {
            RoundingMode::from_bits(bits)
        };
        mode.map(Env::new).ok_or_else(|| self.illegal())
    }

    pub fn merge_flags(&mut self, env: &Env) {
        self.delta.flags |= env.flags;
    }

    pub fn raise(&mut self, flags: FpFlags) {
        self.delta.flags |= flags;
    }

    fn check_load(addr: u32, align: u32) -> Result<(), Trap> {
        if addr % align != 0 {
            return Err(Trap::LoadMisaligned { addr });
        }
        Ok(())
    }

    fn check_store(addr: u32, align: u32) -> Result<(), Trap> {
        if addr % align != 0 {
            return Err(Trap::StoreMisaligned { addr });
        }
        Ok(())
    }

    fn load_fault(addr: u32) -> impl FnOnce(anyhow::Error) -> Trap {
        move |e| Trap::LoadAccess { addr, reason: format!("{e:#}") }
    }

    fn store_fault(addr: u32) -> impl FnOnce(anyhow::Error) -> Trap {
        move |e| Trap::StoreAccess { addr, reason: format!("{e:#}") }
    }

    pub fn load_u8(&mut self, addr: u32) -> Result<u8, Trap> {
        self.bus.read_u8(addr).map_err(Self::load_fault(addr))
    }

    pub fn load_u16(&mut self, addr: u32) -> Result<u16, Trap> {
        Self::check_load(addr, 2)?;
        self.bus.read_u16(addr).map_err(Self::load_fault(addr))
    }

    pub fn load_u32(&mut self, addr: u32) -> Result<u32, Trap> {
        Self::check_load(addr, 4)?;
        self.bus.read_u32(addr).map_err(Self::load_fault(addr))
    }

    pub fn store_u8(&mut self, addr: u32, value: u8) -> Result<(), Trap> {
        self.bus.write_u8(addr, value).map_err(Self::store_fault(addr))
    }

    pub fn store_u16(&mut self, addr: u32, value: u16) -> Result<(), Trap> {
        Self::check_store(addr, 2)?;
        self.bus.write_u16(addr, value).map_err(Self::store_fault(addr))
    }

    pub fn store_u32(&mut self, addr: u32, value: u32) -> Result<(), Trap> {
        Self::check_store(addr, 4)?;
        self.bus.write_u32(addr, value).map_err(Self::store_fault(addr))
    }

    /// Hands the call to the syscall collaborator and records its effects.
    pub fn syscall(&mut self) -> Result<(), Trap> {
        let effect = self.syscalls.handle(self.state, &mut *self.bus)?;
        for (r, v) in effect.gpr {
            self.delta.writes.push(Write::Gpr(r, v));
        }
        for (r, v) in effect.fpr {
            self.delta.writes.push(Write::Fpr(r, v));
        }
        if let Some(code) = effect.exit {
            self.delta.halt = Some(code);
        }
        Ok(())
    }
}
