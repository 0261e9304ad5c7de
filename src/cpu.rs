use serde::{Deserialize, Serialize};

use crate::csr::CsrFile;

/// Architectural state of one hart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub pc: u32,
    gpr: [u32; 32], // x0 stays zero
    fpr: [u32; 32], // raw binary32 bit patterns
    pub csr: CsrFile,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineState {
    pub fn new() -> Self {
        Self {
            pc: 0,
            gpr: [0; 32],
            fpr: [0; 32],
            csr: CsrFile::default(),
        }
    }

    pub fn gpr(&self, index: u8) -> u32 {
        self.gpr[(index & 31) as usize]
    }

    pub fn set_gpr(&mut self, index: u8, value: u32) {
        let i = (index & 31) as usize;
        if i != 0 {
            self.gpr[i] = value;
        }
    }

    pub fn fpr(&self, index: u8) -> u32 {
        self.fpr[(index & 31) as usize]
    }

    pub fn set_fpr(&mut self, index: u8, value: u32) {
        self.fpr[(index & 31) as usize] = value;
    }
}

/// Synchronous exception raised while executing one instruction.
///
/// Bus failures keep the collaborator's message so the trap stays cloneable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    #[error("instruction address misaligned: {addr:#010x}")]
    InstructionMisaligned { addr: u32 },
    #[error("instruction access fault at {addr:#010x}: {reason}")]
    InstructionAccess { addr: u32, reason: String },
    #[error("illegal instruction {word:#010x}")]
    IllegalInstruction { word: u32 },
    #[error("breakpoint")]
    Breakpoint,
    #[error("load address misaligned: {addr:#010x}")]
    LoadMisaligned { addr: u32 },
    #[error("load access fault at {addr:#010x}: {reason}")]
    LoadAccess { addr: u32, reason: String },
    #[error("store address misaligned: {addr:#010x}")]
    StoreMisaligned { addr: u32 },
    #[error("store access fault at {addr:#010x}: {reason}")]
    StoreAccess { addr: u32, reason: String },
    #[error("environment call {service} has no handler")]
    EnvironmentCall { service: u32 },
}

impl Trap {
    /// RISC-V exception code written to `ucause`.
    pub fn cause(&self) -> u32 {
        match self {
            Trap::InstructionMisaligned { .. } => 0,
            Trap::InstructionAccess { .. } => 1,
            Trap::IllegalInstruction { .. } => 2,
            Trap::Breakpoint => 3,
            Trap::LoadMisaligned { .. } => 4,
            Trap::LoadAccess { .. } => 5,
            Trap::StoreMisaligned { .. } => 6,
            Trap::StoreAccess { .. } => 7,
            Trap::EnvironmentCall { .. } => 8,
        }
    }

    /// Value written to `utval`: the faulting address or instruction word.
    pub fn tval(&self) -> u32 {
        match self {
            Trap::InstructionMisaligned { addr }
            | Trap::InstructionAccess { addr, .. }
            | Trap::LoadMisaligned { addr }
            | Trap::LoadAccess { addr, .. }
            | Trap::StoreMisaligned { addr }
            | Trap::StoreAccess { addr, .. } => *addr,
            Trap::IllegalInstruction { word } => *word,
            Trap::Breakpoint | Trap::EnvironmentCall { .. } => 0,
        }
    }
}

/// A trap together with the address of the instruction that raised it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{trap} (pc {pc:#010x})")]
pub struct Fault {
    pub trap: Trap,
    pub pc: u32,
}
