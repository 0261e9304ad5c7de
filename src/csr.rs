//! User-level control and status registers.

use serde::{Deserialize, Serialize};

use crate::softfloat::{FpFlags, RoundingMode};

pub const USTATUS: u16 = 0x000;
pub const FFLAGS: u16 = 0x001;
pub const FRM: u16 = 0x002;
pub const FCSR: u16 = 0x003;
pub const UIE: u16 = 0x004;
pub const UTVEC: u16 = 0x005;
pub const USCRATCH: u16 = 0x040;
pub const UEPC: u16 = 0x041;
pub const UCAUSE: u16 = 0x042;
pub const UTVAL: u16 = 0x043;
pub const UIP: u16 = 0x044;
pub const CYCLE: u16 = 0xC00;
pub const TIME: u16 = 0xC01;
pub const INSTRET: u16 = 0xC02;
pub const CYCLEH: u16 = 0xC80;
pub const TIMEH: u16 = 0xC81;
pub const INSTRETH: u16 = 0xC82;

pub const USTATUS_UIE: u32 = 1 << 0;
pub const USTATUS_UPIE: u32 = 1 << 4;

const NAMES: &[(&str, u16)] = &[
    ("ustatus", USTATUS),
    ("fflags", FFLAGS),
    ("frm", FRM),
    ("fcsr", FCSR),
    ("uie", UIE),
    ("utvec", UTVEC),
    ("uscratch", USCRATCH),
    ("uepc", UEPC),
    ("ucause", UCAUSE),
    ("utval", UTVAL),
    ("uip", UIP),
    ("cycle", CYCLE),
    ("time", TIME),
    ("instret", INSTRET),
    ("cycleh", CYCLEH),
    ("timeh", TIMEH),
    ("instreth", INSTRETH),
];

pub fn csr_address(name: &str) -> Option<u16> {
    NAMES.iter().find(|(n, _)| *n == name).map(|(_, a)| *a)
}

pub fn csr_name(addr: u16) -> Option<&'static str> {
    NAMES.iter().find(|(_, a)| *a == addr).map(|(n, _)| *n)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrFile {
    pub ustatus: u32,
    pub uie: u32,
    pub utvec: u32,
    pub uscratch: u32,
    pub uepc: u32,
    pub ucause: u32,
    pub utval: u32,
    pub uip: u32,
    /// Accrued exception flags; sticky until software clears them.
    pub fflags: FpFlags,
    /// Dynamic rounding mode, raw 3-bit field.
    pub frm: u8,
    pub cycle: u64,
    pub instret: u64,
}

impl CsrFile {
    /// `None` for addresses that name no implemented register.
    pub fn read(&self, addr: u16) -> Option<u32> {
        let v = match addr {
            USTATUS => self.ustatus,
            FFLAGS => self.fflags.bits() as u32,
            FRM => self.frm as u32,
            FCSR => ((self.frm as u32) << 5) | self.fflags.bits() as u32,
            UIE => self.uie,
            UTVEC => self.utvec,
            USCRATCH => self.uscratch,
            UEPC => self.uepc,
            UCAUSE => self.ucause,
            UTVAL => self.utval,
            UIP => self.uip,
            // no wall clock: time follows the cycle counter
            CYCLE | TIME => self.cycle as u32,
            INSTRET => self.instret as u32,
            CYCLEH | TIMEH => (self.cycle >> 32) as u32,
            INSTRETH => (self.instret >> 32) as u32,
            _ => return None,
        };
        Some(v)
    }

    /// Address bits [11:10] == 0b11 mark the read-only range.
    pub fn is_writable(addr: u16) -> bool {
        csr_name(addr).is_some() && (addr >> 10) & 0b11 != 0b11
    }

    /// Writes to unknown or read-only registers are dropped; callers check
    /// [`CsrFile::is_writable`] first.
    pub fn write(&mut self, addr: u16, value: u32) {
        match addr {
            USTATUS => self.ustatus = value & (USTATUS_UIE | USTATUS_UPIE),
            FFLAGS => self.fflags = FpFlags::from_bits_truncate((value & 0x1F) as u8),
            FRM => self.frm = (value & 0b111) as u8,
            FCSR => {
                self.fflags = FpFlags::from_bits_truncate((value & 0x1F) as u8);
                self.frm = ((value >> 5) & 0b111) as u8;
            }
            UIE => self.uie = value,
            UTVEC => self.utvec = value,
            USCRATCH => self.uscratch = value,
            UEPC => self.uepc = value,
            UCAUSE => self.ucause = value,
            UTVAL => self.utval = value,
            UIP => self.uip = value,
            _ => {}
        }
    }

    /// `frm` decoded; `None` when it holds a reserved encoding.
    pub fn rounding_mode(&self) -> Option<RoundingMode> {
        RoundingMode::from_bits(self.frm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcsr_aliases_frm_and_fflags() {
        let mut csr = CsrFile::default();
        csr.write(FCSR, (0b011 << 5) | 0b10001);
        assert_eq!(csr.frm, 0b011);
        assert_eq!(csr.fflags, FpFlags::INVALID | FpFlags::INEXACT);
        assert_eq!(csr.read(FRM), Some(0b011));
        assert_eq!(csr.read(FFLAGS), Some(0b10001));
        assert_eq!(csr.rounding_mode(), Some(RoundingMode::Rup));
    }

    #[test]
    fn counters_are_read_only() {
        assert!(!CsrFile::is_writable(CYCLE));
        assert!(!CsrFile::is_writable(INSTRETH));
        assert!(CsrFile::is_writable(UTVEC));
        assert!(!CsrFile::is_writable(0x7C0));
        let csr = CsrFile { cycle: 0x1_0000_0002, ..Default::default() };
        assert_eq!(csr.read(CYCLE), Some(2));
        assert_eq!(csr.read(CYCLEH), Some(1));
    }
}
