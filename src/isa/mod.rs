//! Instruction tables for RV32I, Zicsr, RV32M and RV32F.

pub mod abi;
pub mod pseudo;
mod rv32f;
mod rv32i;
mod rv32m;
mod zicsr;

use crate::instructions::InstrDesc;

/// Every basic instruction of the standard catalog.
pub fn base_instructions() -> Vec<InstrDesc> {
    [rv32i::TABLE, zicsr::TABLE, rv32m::TABLE, rv32f::TABLE].concat()
}
