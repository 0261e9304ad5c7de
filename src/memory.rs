use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Byte-addressed little-endian memory seen by the engine.
///
/// Implementations report out-of-range or unmapped accesses as errors; the
/// engine turns them into access-fault traps. Alignment is checked by the
/// engine before calling in.
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn read_u16(&mut self, addr: u32) -> Result<u16>;
    fn read_u32(&mut self, addr: u32) -> Result<u32>;
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()>;
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()>;
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()>;
}

/// One contiguous RAM window starting at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u32,
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("base", &format_args!("{:#010x}", self.base))
            .field("size", &self.mem.len())
            .finish()
    }
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self::with_base(0, size)
    }

    pub fn with_base(base: u32, size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base,
        }
    }

    /// Copies `bytes` into memory at `addr`.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let off = self.offset(addr, bytes.len())?;
        self.mem[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn slice(&self, addr: u32, len: usize) -> Result<&[u8]> {
        let off = self.offset(addr, len)?;
        Ok(&self.mem[off..off + len])
    }

    fn offset(&self, addr: u32, len: usize) -> Result<usize> {
        let off = addr.wrapping_sub(self.base) as usize;
        if addr < self.base || off.checked_add(len).map_or(true, |end| end > self.mem.len()) {
            bail!(
                "{len}-byte access at {addr:#010x} outside memory [{:#010x}, {:#010x})",
                self.base,
                self.base as u64 + self.mem.len() as u64
            );
        }
        Ok(off)
    }

    fn load_le<const N: usize>(&self, addr: u32) -> Result<[u8; N]> {
        let off = self.offset(addr, N)?;
        let mut buf = [0; N];
        buf.copy_from_slice(&self.mem[off..off + N]);
        Ok(buf)
    }

    fn store_le<const N: usize>(&mut self, addr: u32, bytes: [u8; N]) -> Result<()> {
        let off = self.offset(addr, N)?;
        self.mem[off..off + N].copy_from_slice(&bytes);
        Ok(())
    }
}

impl Bus for LinearMemory {
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        Ok(self.load_le::<1>(addr)?[0])
    }
    fn read_u16(&mut self, addr: u32) -> Result<u16> {
        Ok(u16::from_le_bytes(self.load_le(addr)?))
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        Ok(u32::from_le_bytes(self.load_le(addr)?))
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        self.store_le(addr, [val])
    }
    fn write_u16(&mut self, addr: u32, val: u16) -> Result<()> {
        self.store_le(addr, val.to_le_bytes())
    }
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()> {
        self.store_le(addr, val.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn windowed_access_is_little_endian_and_bounded() {
        let mut mem = LinearMemory::with_base(0x1000, 8);
        mem.write_u32(0x1004, 0xA1B2_C3D4).unwrap();
        assert_eq!(mem.read_u8(0x1004).unwrap(), 0xD4);
        assert_eq!(mem.read_u16(0x1006).unwrap(), 0xA1B2);
        assert_eq!(mem.slice(0x1004, 2).unwrap(), &[0xD4, 0xC3]);
        assert!(mem.read_u32(0x1005).is_err());
        assert!(mem.read_u8(0x0FFF).is_err());
        assert!(mem.load(0x1006, &[1, 2, 3]).is_err());
    }
}
