//! `ecall` services.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::cpu::{MachineState, Trap};
use crate::isa::abi::{FREG_FA0, REG_A0, REG_A7};
use crate::memory::Bus;

/// Register writes and exit request produced by one service call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallEffect {
    pub gpr: Vec<(u8, u32)>,
    pub fpr: Vec<(u8, u32)>,
    pub exit: Option<i32>,
}

impl SyscallEffect {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exit(code: i32) -> Self {
        Self { exit: Some(code), ..Self::default() }
    }

    pub fn with_gpr(mut self, reg: u8, value: u32) -> Self {
        self.gpr.push((reg, value));
        self
    }
}

pub trait SyscallHandler {
    /// Serves the call selected by the machine state (`a7` by convention).
    fn handle(&mut self, state: &MachineState, bus: &mut dyn Bus) -> Result<SyscallEffect, Trap>;
}

/// Every `ecall` traps.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSyscalls;

impl SyscallHandler for NoSyscalls {
    fn handle(&mut self, state: &MachineState, _bus: &mut dyn Bus) -> Result<SyscallEffect, Trap> {
        Err(Trap::EnvironmentCall { service: state.gpr(REG_A7) })
    }
}

pub const PRINT_INT: u32 = 1;
pub const PRINT_FLOAT: u32 = 2;
pub const PRINT_STRING: u32 = 4;
pub const READ_INT: u32 = 5;
pub const EXIT: u32 = 10;
pub const PRINT_CHAR: u32 = 11;
pub const READ_CHAR: u32 = 12;
pub const PRINT_HEX: u32 = 34;
pub const PRINT_BIN: u32 = 35;
pub const PRINT_UNSIGNED: u32 = 36;
pub const EXIT2: u32 = 93;

const MAX_STRING: u32 = 1 << 16;

/// Console services over any reader/writer pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = self.output.write_all(text.as_bytes()).and_then(|_| self.output.flush()) {
            warn!(error = %e, "console write failed");
        }
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        if let Err(e) = self.input.read_line(&mut line) {
            warn!(error = %e, "console read failed");
        }
        line
    }

    fn read_string(bus: &mut dyn Bus, addr: u32) -> Result<String, Trap> {
        let mut bytes = Vec::new();
        for i in 0..MAX_STRING {
            let at = addr.wrapping_add(i);
            let b = bus
                .read_u8(at)
                .map_err(|e| Trap::LoadAccess { addr: at, reason: format!("{e:#}") })?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<R: BufRead, W: Write> SyscallHandler for Console<R, W> {
    fn handle(&mut self, state: &MachineState, bus: &mut dyn Bus) -> Result<SyscallEffect, Trap> {
        let service = state.gpr(REG_A7);
        let a0 = state.gpr(REG_A0);
        debug!(service, a0, "syscall");
        let effect = match service {
            PRINT_INT => {
                self.print(&(a0 as i32).to_string());
                SyscallEffect::none()
            }
            PRINT_FLOAT => {
                self.print(&f32::from_bits(state.fpr(FREG_FA0)).to_string());
                SyscallEffect::none()
            }
            PRINT_STRING => {
                let text = Self::read_string(bus, a0)?;
                self.print(&text);
                SyscallEffect::none()
            }
            READ_INT => {
                let line = self.read_line();
                let value = line.trim().parse::<i32>().unwrap_or_else(|_| {
                    warn!(input = line.trim(), "not an integer, reading 0");
                    0
                });
                SyscallEffect::none().with_gpr(REG_A0, value as u32)
            }
            EXIT => SyscallEffect::exit(0),
            PRINT_CHAR => {
                let c = char::from_u32(a0 & 0xFF).unwrap_or('?');
                self.print(c.encode_utf8(&mut [0; 4]));
                SyscallEffect::none()
            }
            READ_CHAR => {
                let mut byte = [0u8; 1];
                let value = match self.input.read(&mut byte) {
                    Ok(1) => byte[0] as u32,
                    Ok(_) => u32::MAX,
                    Err(e) => {
                        warn!(error = %e, "console read failed");
                        u32::MAX
                    }
                };
                SyscallEffect::none().with_gpr(REG_A0, value)
            }
            PRINT_HEX => {
                self.print(&format!("{a0:#010x}"));
                SyscallEffect::none()
            }
            PRINT_BIN => {
                self.print(&format!("{a0:032b}"));
                SyscallEffect::none()
            }
            PRINT_UNSIGNED => {
                self.print(&a0.to_string());
                SyscallEffect::none()
            }
            EXIT2 => SyscallEffect::exit(a0 as i32),
            _ => return Err(Trap::EnvironmentCall { service }),
        };
        Ok(effect)
    }
}
