use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Serialize;

use rv32_rs::Program;

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub name: String,
    pub base: u32,
    pub bytes: Vec<u8>,
    pub perms: &'static str,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.base.wrapping_add(self.bytes.len() as u32)
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.end()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Image {
    pub segments: Vec<Segment>,
}

impl Image {
    /// Text and data segments of an assembled program.
    pub fn from_program(program: &Program) -> Self {
        let mut segments = vec![Segment {
            name: ".text".into(),
            base: program.text_base,
            bytes: program.text_bytes(),
            perms: "r-x",
        }];
        if !program.data.is_empty() {
            segments.push(Segment {
                name: ".data".into(),
                base: program.data_base,
                bytes: program.data.clone(),
                perms: "rw-",
            });
        }
        Self { segments }
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        let s = self.segments.iter().find(|s| s.contains(addr))?;
        s.bytes.get((addr - s.base) as usize).copied()
    }

    pub fn read_u32(&self, addr: u32) -> Option<u32> {
        let mut b = [0u8; 4];
        for (i, byte) in b.iter_mut().enumerate() {
            *byte = self.read_u8(addr.wrapping_add(i as u32))?;
        }
        Some(u32::from_le_bytes(b))
    }

    pub fn is_mapped(&self, addr: u32) -> bool {
        self.segments.iter().any(|s| s.contains(addr))
    }
}

/// Maps `len` bytes of `path`, after skipping `skip`, at `base`.
pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    let file = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    let seg = Segment { name: "raw".into(), base, bytes: payload.to_vec(), perms: "r-x" };
    Ok(Image { segments: vec![seg] })
}
