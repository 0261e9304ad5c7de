use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::EntryId;
use crate::error::SourcePos;
use crate::instructions::{Operands, WORD_LEN};
use crate::memory::Bus;

/// One assembled basic instruction. Pseudo-instructions appear as the
/// basic statements they expand to, all carrying the pseudo's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStatement {
    pub entry: EntryId,
    pub operands: Operands,
    pub pos: SourcePos,
    pub source: String,
    pub address: u32,
    pub word: u32,
}

/// Output of the assembler: a contiguous text segment and a data image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub text_base: u32,
    pub statements: Vec<ProgramStatement>,
    pub data_base: u32,
    pub data: Vec<u8>,
    pub symbols: BTreeMap<String, u32>,
    pub entry: u32,
}

impl Program {
    pub fn statement_at(&self, pc: u32) -> Option<&ProgramStatement> {
        let off = pc.checked_sub(self.text_base)?;
        if off % WORD_LEN != 0 {
            return None;
        }
        self.statements
            .get((off / WORD_LEN) as usize)
            .filter(|s| s.address == pc)
    }

    pub fn text_bytes(&self) -> Vec<u8> {
        self.statements
            .iter()
            .flat_map(|s| s.word.to_le_bytes())
            .collect()
    }

    /// Writes the text words and the data image through `bus`.
    pub fn load<B: Bus + ?Sized>(&self, bus: &mut B) -> Result<()> {
        for s in &self.statements {
            bus.write_u32(s.address, s.word)
                .with_context(|| format!("loading text word at {:#010x}", s.address))?;
        }
        for (i, &b) in self.data.iter().enumerate() {
            let addr = self.data_base.wrapping_add(i as u32);
            bus.write_u8(addr, b)
                .with_context(|| format!("loading data byte at {addr:#010x}"))?;
        }
        Ok(())
    }
}
