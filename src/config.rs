use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What the run loop does when an instruction traps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapPolicy {
    /// Return the fault to the caller.
    #[default]
    Stop,
    /// Enter the user trap handler when `utvec` is set and `ustatus.UIE` is on,
    /// otherwise stop.
    Deliver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub text_base: u32,
    pub data_base: u32,
    pub memory_size: usize,
    /// Initial stack pointer. Defaults to the top of memory, 16-byte aligned.
    pub sp: Option<u32>,
    /// Initial global pointer. Defaults to `data_base + 0x800`.
    pub gp: Option<u32>,
    pub max_steps: Option<u64>,
    pub trap_policy: TrapPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            text_base: 0,
            data_base: 0x2000,
            memory_size: 1 << 20,
            sp: None,
            gp: None,
            max_steps: Some(10_000_000),
            trap_policy: TrapPolicy::Stop,
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn initial_sp(&self) -> u32 {
        self.sp.unwrap_or_else(|| (self.memory_size.min(u32::MAX as usize) as u32) & !0xF)
    }

    pub fn initial_gp(&self) -> u32 {
        self.gp.unwrap_or_else(|| self.data_base.wrapping_add(0x800))
    }
}
