pub mod asm;
pub mod catalog;
pub mod config;
pub mod cpu;
pub mod csr;
pub mod decoder;
pub mod disasm;
pub mod engine;
pub mod error;
pub mod exec;
pub mod instructions;
pub mod isa;
pub mod memory;
pub mod program;
pub mod softfloat;
pub mod syscall;
pub mod token;

pub use asm::{assemble, Assembler};
pub use catalog::{Catalog, EntryId};
pub use config::{SimConfig, TrapPolicy};
pub use cpu::{Fault, MachineState, Trap};
pub use decoder::{Decoded, Decoder};
pub use engine::{Engine, RunLimits, RunOutcome, Status, Step};
pub use error::{Diagnostic, Diagnostics, ErrorKind, SourcePos};
pub use memory::{Bus, LinearMemory};
pub use program::{Program, ProgramStatement};
pub use syscall::{Console, NoSyscalls, SyscallHandler};
