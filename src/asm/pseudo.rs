//! Pseudo-instruction template rendering.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Operand text as written.
    Text(usize),
    Hi(usize),
    Lo(usize),
    /// Split of a pc-relative offset.
    PcHi(usize),
    PcLo(usize),
}

impl Placeholder {
    fn parse(s: &str) -> Option<Self> {
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => (kind, index),
            None => ("", s),
        };
        let n = index.parse().ok()?;
        Some(match kind {
            "" => Placeholder::Text(n),
            "hi" => Placeholder::Hi(n),
            "lo" => Placeholder::Lo(n),
            "phi" => Placeholder::PcHi(n),
            "plo" => Placeholder::PcLo(n),
            _ => return None,
        })
    }

    pub fn operand(self) -> usize {
        match self {
            Placeholder::Text(n)
            | Placeholder::Hi(n)
            | Placeholder::Lo(n)
            | Placeholder::PcHi(n)
            | Placeholder::PcLo(n) => n,
        }
    }
}

/// Replaces every `{...}` placeholder in `template` with `fill`'s output.
/// Unrecognized braces are copied through.
pub fn render<E>(
    template: &str,
    mut fill: impl FnMut(Placeholder) -> Result<String, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let parsed = after
            .find('}')
            .and_then(|close| Placeholder::parse(&after[..close]).map(|p| (close, p)));
        match parsed {
            Some((close, placeholder)) => {
                out.push_str(&fill(placeholder)?);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Splits a 32-bit value into a `lui`/`auipc` upper part and a signed
/// 12-bit remainder so that `(hi << 12) + lo == value` modulo 2^32.
pub fn split_hi_lo(value: i64) -> (i64, i64) {
    let v = value as i32 as i64;
    let hi = (v + 0x800) >> 12;
    let lo = v - (hi << 12);
    (hi & 0xFFFFF, lo)
}

/// Whether `value`, taken as a 32-bit pattern, fits a signed 12-bit immediate.
pub fn fits_imm12(value: i64) -> bool {
    (-2048..=2047).contains(&(value as i32 as i64))
}
