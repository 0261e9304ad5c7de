//! Register naming and calling-convention indices.

pub const REG_ZERO: u8 = 0;
pub const REG_RA: u8 = 1;
pub const REG_SP: u8 = 2;
pub const REG_GP: u8 = 3;
pub const REG_A0: u8 = 10;
pub const REG_A1: u8 = 11;
pub const REG_A2: u8 = 12;
pub const REG_A7: u8 = 17;

pub const FREG_FA0: u8 = 10;

pub const GPR_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

pub const FPR_NAMES: [&str; 32] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

fn numbered(name: &str, prefix: char) -> Option<u8> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    match digits.parse::<u8>() {
        Ok(n) if n < 32 => Some(n),
        _ => None,
    }
}

/// `x0`..`x31`, ABI names and `fp`.
pub fn gpr_index(name: &str) -> Option<u8> {
    if name == "fp" {
        return Some(8);
    }
    numbered(name, 'x').or_else(|| GPR_NAMES.iter().position(|n| *n == name).map(|i| i as u8))
}

/// `f0`..`f31` and ABI names.
pub fn fpr_index(name: &str) -> Option<u8> {
    numbered(name, 'f').or_else(|| FPR_NAMES.iter().position(|n| *n == name).map(|i| i as u8))
}

pub fn gpr_name(index: u8) -> &'static str {
    GPR_NAMES[(index & 31) as usize]
}

pub fn fpr_name(index: u8) -> &'static str {
    FPR_NAMES[(index & 31) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names_resolve() {
        assert_eq!(gpr_index("x0"), Some(0));
        assert_eq!(gpr_index("x31"), Some(31));
        assert_eq!(gpr_index("x32"), None);
        assert_eq!(gpr_index("x01"), None);
        assert_eq!(gpr_index("fp"), Some(8));
        assert_eq!(gpr_index("t6"), Some(31));
        assert_eq!(fpr_index("f7"), Some(7));
        assert_eq!(fpr_index("fa0"), Some(10));
        assert_eq!(fpr_index("fp"), None);
        assert_eq!(gpr_name(2), "sp");
        assert_eq!(fpr_name(31), "ft11");
    }
}
