pub mod model;

pub use model::{load_raw_bin, Image, Segment};

use serde::Serialize;

use rv32_rs::disasm::{fmt_decoded, Labels};
use rv32_rs::{Catalog, Decoder};

/// One row of a linear listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub addr: u32,
    pub word: Option<u32>,
    pub text: String,
}

/// Sweeps `[start, end)` word by word. Undecodable words are shown as
/// `.word`, unmapped addresses end the sweep.
pub fn disassemble(
    catalog: &Catalog,
    img: &Image,
    start: u32,
    end: u32,
    labels: &Labels,
) -> Vec<Line> {
    let mut out = Vec::new();
    let mut pc = start;
    while pc < end {
        let Some(word) = img.read_u32(pc) else {
            out.push(Line { addr: pc, word: None, text: "<unmapped>".into() });
            break;
        };
        let text = match catalog.decode(word) {
            Some(d) => {
                let text = fmt_decoded(catalog, &d, pc);
                match labels.get(&pc) {
                    Some(name) => format!("{name}: {text}"),
                    None => text,
                }
            }
            None => format!(".word {word:#010x}"),
        };
        out.push(Line { addr: pc, word: Some(word), text });
        pc = match pc.checked_add(4) {
            Some(next) => next,
            None => break,
        };
    }
    out
}
