//! IEEE-754 binary32 arithmetic in software.
//!
//! Every operation takes an explicit [`Env`] carrying the rounding mode and
//! accumulating exception flags. Nothing here touches host floating-point
//! state, so results and flags are identical on every platform.
//!
//! Values are passed around as raw `u32` bit patterns, the same
//! representation the floating-point register file stores. NaN results are
//! always the canonical quiet NaN, as RISC-V requires.

use std::cmp::Ordering;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FpFlags: u8 {
const INEXACT = 1 << 0; // NX
const UNDERFLOW = 1 << 1; // UF
const OVERFLOW = 1 << 2; // OF
const DIVIDE_BY_ZERO = 1 << 3; // DZ
const INVALID = 1 << 4; // NV
}
}

/// RISC-V rounding mode encoding (`frm` and the instruction `rm` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    #[default]
    Rne = 0b000,
    /// Round towards zero.
    Rtz = 0b001,
    /// Round down (towards -inf).
    Rdn = 0b010,
    /// Round up (towards +inf).
    Rup = 0b011,
    /// Round to nearest, ties to max magnitude.
    Rmm = 0b100,
}

/// `rm` field value selecting the `frm` CSR.
pub const RM_DYNAMIC: u8 = 0b111;

impl RoundingMode {
    /// Returns `None` for the reserved encodings and for [`RM_DYNAMIC`],
    /// which the caller resolves against `frm`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(Self::Rne),
            0b001 => Some(Self::Rtz),
            0b010 => Some(Self::Rdn),
            0b011 => Some(Self::Rup),
            0b100 => Some(Self::Rmm),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rne => "rne",
            Self::Rtz => "rtz",
            Self::Rdn => "rdn",
            Self::Rup => "rup",
            Self::Rmm => "rmm",
        }
    }
}

/// Per-operation floating-point environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Env {
    pub mode: RoundingMode,
    pub flags: FpFlags,
}

impl Env {
    pub fn new(mode: RoundingMode) -> Self {
        Self { mode, flags: FpFlags::empty() }
    }

    fn raise(&mut self, flags: FpFlags) {
        self.flags |= flags;
    }
}

pub const SIGN: u32 = 0x8000_0000;
pub const CANONICAL_NAN: u32 = 0x7FC0_0000;
const INFINITY: u32 = 0x7F80_0000;
const MAX_FINITE: u32 = 0x7F7F_FFFF;
const FRAC_MASK: u32 = 0x007F_FFFF;
const QUIET_BIT: u32 = 0x0040_0000;
const HIDDEN_BIT: u128 = 1 << 23;

pub fn is_nan(a: u32) -> bool {
    a & !SIGN > INFINITY
}

pub fn is_signaling_nan(a: u32) -> bool {
    is_nan(a) && a & QUIET_BIT == 0
}

fn is_inf(a: u32) -> bool {
    a & !SIGN == INFINITY
}

fn is_zero(a: u32) -> bool {
    a & !SIGN == 0
}

fn sign_of(a: u32) -> bool {
    a & SIGN != 0
}

fn with_sign(sign: bool, magnitude: u32) -> u32 {
    if sign { magnitude | SIGN } else { magnitude }
}

/// Finite non-zero value `sig * 2^exp`.
#[derive(Debug, Clone, Copy)]
struct Unpacked {
    sign: bool,
    exp: i32,
    sig: u128,
}

fn unpack(a: u32) -> Unpacked {
    let biased = ((a >> 23) & 0xFF) as i32;
    let frac = (a & FRAC_MASK) as u128;
    if biased == 0 {
        Unpacked { sign: sign_of(a), exp: -149, sig: frac }
    } else {
        Unpacked { sign: sign_of(a), exp: biased - 150, sig: frac | HIDDEN_BIT }
    }
}

fn shift_right_jam(v: u128, n: i32) -> u128 {
    if n <= 0 {
        v
    } else if n >= 128 {
        (v != 0) as u128
    } else {
        (v >> n) | ((v & ((1u128 << n) - 1)) != 0) as u128
    }
}

/// Drops `shift` low bits of `sig`, rounding per `mode`. Returns the kept
/// magnitude and whether any non-zero bits were discarded.
fn shift_round(sig: u128, shift: i32, sign: bool, mode: RoundingMode) -> (u128, bool) {
    if shift <= 0 {
        return (sig << -shift, false);
    }
    let (kept, rem, half) = match shift {
        s if s > 128 => (0, sig, None),
        128 => (0, sig, Some(1u128 << 127)),
        s => (sig >> s, sig & ((1u128 << s) - 1), Some(1u128 << (s - 1))),
    };
    if rem == 0 {
        return (kept, false);
    }
    let cmp = half.map_or(Ordering::Less, |h| rem.cmp(&h));
    let up = match mode {
        RoundingMode::Rne => cmp == Ordering::Greater || (cmp == Ordering::Equal && kept & 1 == 1),
        RoundingMode::Rmm => cmp != Ordering::Less,
        RoundingMode::Rtz => false,
        RoundingMode::Rdn => sign,
        RoundingMode::Rup => !sign,
    };
    (kept + up as u128, true)
}

fn overflow(sign: bool, env: &mut Env) -> u32 {
    env.raise(FpFlags::OVERFLOW | FpFlags::INEXACT);
    let to_inf = match env.mode {
        RoundingMode::Rne | RoundingMode::Rmm => true,
        RoundingMode::Rtz => false,
        RoundingMode::Rdn => sign,
        RoundingMode::Rup => !sign,
    };
    with_sign(sign, if to_inf { INFINITY } else { MAX_FINITE })
}

/// Rounds the value `sig * 2^exp` to binary32.
///
/// `sig` must be non-zero. If it carries a jammed sticky bit, at least two
/// bits must lie below the binary32 rounding position.
fn round_pack(sign: bool, exp: i32, sig: u128, env: &mut Env) -> u32 {
    let msb = 127 - sig.leading_zeros() as i32;
    let e = msb + exp;
    let mut q = (e - 23).max(-149);
    let (mut kept, inexact) = shift_round(sig, q - exp, sign, env.mode);
    if kept == 1 << 24 {
        kept >>= 1;
        q += 1;
    }
    if inexact {
        env.raise(FpFlags::INEXACT);
        if e < -126 {
            // Tininess is detected after rounding with an unbounded exponent.
            let (unbounded, _) = shift_round(sig, (e - 23) - exp, sign, env.mode);
            if !(e == -127 && unbounded >= 1 << 24) {
                env.raise(FpFlags::UNDERFLOW);
            }
        }
    }
    if kept < HIDDEN_BIT {
        return with_sign(sign, kept as u32);
    }
    let biased = q + 150;
    if biased >= 0xFF {
        return overflow(sign, env);
    }
    with_sign(sign, ((biased as u32) << 23) | (kept as u32 & FRAC_MASK))
}

fn nan_result(a: u32, b: u32, env: &mut Env) -> u32 {
    if is_signaling_nan(a) || is_signaling_nan(b) {
        env.raise(FpFlags::INVALID);
    }
    CANONICAL_NAN
}

fn invalid(env: &mut Env) -> u32 {
    env.raise(FpFlags::INVALID);
    CANONICAL_NAN
}

fn zero_sum(a_sign: bool, b_sign: bool, mode: RoundingMode) -> u32 {
    if a_sign == b_sign {
        with_sign(a_sign, 0)
    } else {
        with_sign(mode == RoundingMode::Rdn, 0)
    }
}

/// Exact sum of two finite non-zero values, rounded once.
fn sum_exact(x: Unpacked, y: Unpacked, env: &mut Env) -> u32 {
    let base = x.exp.max(y.exp) - 64;
    let align = |u: Unpacked| {
        let d = u.exp - base;
        if d >= 0 { u.sig << d } else { shift_right_jam(u.sig, -d) }
    };
    let (xs, ys) = (align(x), align(y));
    let (sign, mag) = if x.sign == y.sign {
        (x.sign, xs + ys)
    } else if xs >= ys {
        (x.sign, xs - ys)
    } else {
        (y.sign, ys - xs)
    };
    if mag == 0 {
        return with_sign(env.mode == RoundingMode::Rdn, 0);
    }
    round_pack(sign, base, mag, env)
}

pub fn add(a: u32, b: u32, env: &mut Env) -> u32 {
    if is_nan(a) || is_nan(b) {
        return nan_result(a, b, env);
    }
    match (is_inf(a), is_inf(b)) {
        (true, true) if sign_of(a) != sign_of(b) => return invalid(env),
        (true, _) => return a,
        (false, true) => return b,
        (false, false) => {}
    }
    match (is_zero(a), is_zero(b)) {
        (true, true) => zero_sum(sign_of(a), sign_of(b), env.mode),
        (true, false) => b,
        (false, true) => a,
        (false, false) => sum_exact(unpack(a), unpack(b), env),
    }
}

pub fn sub(a: u32, b: u32, env: &mut Env) -> u32 {
    if is_nan(b) {
        return nan_result(a, b, env);
    }
    add(a, b ^ SIGN, env)
}

pub fn mul(a: u32, b: u32, env: &mut Env) -> u32 {
    if is_nan(a) || is_nan(b) {
        return nan_result(a, b, env);
    }
    let sign = sign_of(a) ^ sign_of(b);
    if is_inf(a) || is_inf(b) {
        if is_zero(a) || is_zero(b) {
            return invalid(env);
        }
        return with_sign(sign, INFINITY);
    }
    if is_zero(a) || is_zero(b) {
        return with_sign(sign, 0);
    }
    let (x, y) = (unpack(a), unpack(b));
    round_pack(sign, x.exp + y.exp, x.sig * y.sig, env)
}

pub fn div(a: u32, b: u32, env: &mut Env) -> u32 {
    if is_nan(a) || is_nan(b) {
        return nan_result(a, b, env);
    }
    let sign = sign_of(a) ^ sign_of(b);
    match (is_inf(a), is_inf(b)) {
        (true, true) => return invalid(env),
        (true, false) => return with_sign(sign, INFINITY),
        (false, true) => return with_sign(sign, 0),
        (false, false) => {}
    }
    if is_zero(b) {
        if is_zero(a) {
            return invalid(env);
        }
        env.raise(FpFlags::DIVIDE_BY_ZERO);
        return with_sign(sign, INFINITY);
    }
    if is_zero(a) {
        return with_sign(sign, 0);
    }
    let (x, y) = (unpack(a), unpack(b));
    let num = x.sig << 64;
    let quot = num / y.sig;
    let sig = quot | (num % y.sig != 0) as u128;
    round_pack(sign, x.exp - 64 - y.exp, sig, env)
}

fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

pub fn sqrt(a: u32, env: &mut Env) -> u32 {
    if is_nan(a) {
        return nan_result(a, a, env);
    }
    if is_zero(a) {
        return a;
    }
    if sign_of(a) {
        return invalid(env);
    }
    if is_inf(a) {
        return a;
    }
    let x = unpack(a);
    let (mut sig, mut exp) = (x.sig, x.exp);
    if exp & 1 != 0 {
        sig <<= 1;
        exp -= 1;
    }
    let sig = sig << 80;
    let exp = exp - 80;
    let root = isqrt(sig);
    let jam = (root * root != sig) as u128;
    round_pack(false, exp / 2, root | jam, env)
}

/// Fused `(+/-)(a * b) (+/-) c` with a single rounding.
pub fn mul_add(
    a: u32,
    b: u32,
    c: u32,
    negate_product: bool,
    negate_addend: bool,
    env: &mut Env,
) -> u32 {
    let inf_times_zero = (is_inf(a) && is_zero(b)) || (is_zero(a) && is_inf(b));
    if is_nan(a) || is_nan(b) || is_nan(c) {
        if inf_times_zero || is_signaling_nan(a) || is_signaling_nan(b) || is_signaling_nan(c) {
            env.raise(FpFlags::INVALID);
        }
        return CANONICAL_NAN;
    }
    if inf_times_zero {
        return invalid(env);
    }
    let prod_sign = sign_of(a) ^ sign_of(b) ^ negate_product;
    let add_sign = sign_of(c) ^ negate_addend;
    if is_inf(a) || is_inf(b) {
        if is_inf(c) && add_sign != prod_sign {
            return invalid(env);
        }
        return with_sign(prod_sign, INFINITY);
    }
    if is_inf(c) {
        return with_sign(add_sign, INFINITY);
    }
    if is_zero(a) || is_zero(b) {
        if is_zero(c) {
            return zero_sum(prod_sign, add_sign, env.mode);
        }
        return with_sign(add_sign, c & !SIGN);
    }
    let (x, y) = (unpack(a), unpack(b));
    let product = Unpacked { sign: prod_sign, exp: x.exp + y.exp, sig: x.sig * y.sig };
    if is_zero(c) {
        return round_pack(product.sign, product.exp, product.sig, env);
    }
    let addend = Unpacked { sign: add_sign, ..unpack(c) };
    sum_exact(product, addend, env)
}

/// Monotonic key for non-NaN values; both zeros map to 0.
fn order_key(a: u32) -> i64 {
    if sign_of(a) { -((a & !SIGN) as i64) } else { a as i64 }
}

/// Quiet equality: only signaling NaNs raise invalid.
pub fn eq(a: u32, b: u32, env: &mut Env) -> bool {
    if is_nan(a) || is_nan(b) {
        if is_signaling_nan(a) || is_signaling_nan(b) {
            env.raise(FpFlags::INVALID);
        }
        return false;
    }
    order_key(a) == order_key(b)
}

/// Signaling less-than: any NaN raises invalid.
pub fn lt(a: u32, b: u32, env: &mut Env) -> bool {
    if is_nan(a) || is_nan(b) {
        env.raise(FpFlags::INVALID);
        return false;
    }
    order_key(a) < order_key(b)
}

/// Signaling less-or-equal: any NaN raises invalid.
pub fn le(a: u32, b: u32, env: &mut Env) -> bool {
    if is_nan(a) || is_nan(b) {
        env.raise(FpFlags::INVALID);
        return false;
    }
    order_key(a) <= order_key(b)
}

fn min_max(a: u32, b: u32, want_max: bool, env: &mut Env) -> u32 {
    if is_signaling_nan(a) || is_signaling_nan(b) {
        env.raise(FpFlags::INVALID);
    }
    match (is_nan(a), is_nan(b)) {
        (true, true) => CANONICAL_NAN,
        (true, false) => b,
        (false, true) => a,
        (false, false) => match order_key(a).cmp(&order_key(b)) {
            Ordering::Less => if want_max { b } else { a },
            Ordering::Greater => if want_max { a } else { b },
            // -0 orders below +0
            Ordering::Equal => if sign_of(a) != want_max { a } else { b },
        },
    }
}

pub fn min(a: u32, b: u32, env: &mut Env) -> u32 {
    min_max(a, b, false, env)
}

pub fn max(a: u32, b: u32, env: &mut Env) -> u32 {
    min_max(a, b, true, env)
}

/// RISC-V `fclass` bit mask.
pub fn classify(a: u32) -> u32 {
    let neg = sign_of(a);
    let biased = (a >> 23) & 0xFF;
    let frac = a & FRAC_MASK;
    let bit = if is_nan(a) {
        if is_signaling_nan(a) { 8 } else { 9 }
    } else if is_inf(a) {
        if neg { 0 } else { 7 }
    } else if biased == 0 && frac == 0 {
        if neg { 3 } else { 4 }
    } else if biased == 0 {
        if neg { 2 } else { 5 }
    } else if neg {
        1
    } else {
        6
    };
    1 << bit
}

pub fn from_i32(v: i32, env: &mut Env) -> u32 {
    if v == 0 {
        return 0;
    }
    round_pack(v < 0, 0, v.unsigned_abs() as u128, env)
}

pub fn from_u32(v: u32, env: &mut Env) -> u32 {
    if v == 0 {
        return 0;
    }
    round_pack(false, 0, v as u128, env)
}

/// Rounds a finite non-zero value to an integer magnitude.
fn round_to_int(x: Unpacked, mode: RoundingMode) -> (u128, bool) {
    if x.exp >= 0 {
        (x.sig << x.exp.min(64), false)
    } else {
        shift_round(x.sig, -x.exp, x.sign, mode)
    }
}

pub fn to_i32(a: u32, env: &mut Env) -> i32 {
    if is_nan(a) {
        env.raise(FpFlags::INVALID);
        return i32::MAX;
    }
    if is_inf(a) {
        env.raise(FpFlags::INVALID);
        return if sign_of(a) { i32::MIN } else { i32::MAX };
    }
    if is_zero(a) {
        return 0;
    }
    let x = unpack(a);
    let (mag, inexact) = round_to_int(x, env.mode);
    let limit = if x.sign { 1u128 << 31 } else { i32::MAX as u128 };
    if mag > limit {
        env.raise(FpFlags::INVALID);
        return if x.sign { i32::MIN } else { i32::MAX };
    }
    if inexact {
        env.raise(FpFlags::INEXACT);
    }
    if x.sign { (mag as i64).wrapping_neg() as i32 } else { mag as i32 }
}

pub fn to_u32(a: u32, env: &mut Env) -> u32 {
    if is_nan(a) {
        env.raise(FpFlags::INVALID);
        return u32::MAX;
    }
    if is_inf(a) {
        env.raise(FpFlags::INVALID);
        return if sign_of(a) { 0 } else { u32::MAX };
    }
    if is_zero(a) {
        return 0;
    }
    let x = unpack(a);
    let (mag, inexact) = round_to_int(x, env.mode);
    if x.sign && mag != 0 {
        env.raise(FpFlags::INVALID);
        return 0;
    }
    if mag > u32::MAX as u128 {
        env.raise(FpFlags::INVALID);
        return u32::MAX;
    }
    if inexact {
        env.raise(FpFlags::INEXACT);
    }
    mag as u32
}
