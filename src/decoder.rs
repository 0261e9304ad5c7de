use serde::{Deserialize, Serialize};

use crate::catalog::EntryId;
use crate::instructions::Operands;

/// A machine word resolved to its catalog entry and operand values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub entry: EntryId,
    pub operands: Operands,
}

pub trait Decoder {
    /// `None` when no entry matches, i.e. an illegal instruction.
    fn decode(&self, word: u32) -> Option<Decoded>;
}
