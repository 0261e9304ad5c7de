//! The instruction registry: validated entries, decode buckets, mnemonic
//! index and pseudo-instructions.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::asm::matcher::match_operands;
use crate::asm::pseudo::{render, Placeholder};
use crate::decoder::{Decoded, Decoder};
use crate::error::{Diagnostic, Diagnostics, ErrorKind};
use crate::instructions::{CatalogEntry, InstrDesc};
use crate::isa;
use crate::isa::pseudo::PseudoDesc;
use crate::token::{tokenize, Token, TokenClass, TokenKind};

/// Index of an entry inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u16);

/// opcode[6:0] and funct3[14:12]
const BUCKET_BITS: u32 = 0x0000_707F;
const BUCKETS: usize = 1 << 10;

fn bucket_index(word: u32) -> usize {
    ((((word >> 12) & 0b111) << 7) | (word & 0x7F)) as usize
}

fn bucket_word(index: usize) -> u32 {
    let index = index as u32;
    ((index >> 7) << 12) | (index & 0x7F)
}

fn collide(a: &CatalogEntry, b: &CatalogEntry) -> bool {
    (a.mask.fixed & b.mask.fixed & (a.mask.value ^ b.mask.value)) == 0
}

#[derive(Debug, Clone)]
pub struct PseudoEntry {
    pub mnemonic: &'static str,
    pub example: &'static str,
    pub description: &'static str,
    pub pattern: Vec<TokenClass>,
    pub expansion: &'static [&'static str],
    pub compact: Option<(usize, &'static [&'static str])>,
}

impl PseudoEntry {
    /// Every template must render to a line that some basic entry accepts.
    fn validate(desc: &PseudoDesc, catalog: &Catalog) -> Result<Self, ErrorKind> {
        let invalid = |expansion: &str, reason: String| ErrorKind::InvalidPseudo {
            example: desc.example.into(),
            expansion: expansion.into(),
            reason,
        };
        let tokens = tokenize(desc.example).map_err(|e| ErrorKind::InvalidExample {
            example: desc.example.into(),
            reason: e.to_string(),
        })?;
        let mnemonic = desc.example.split_whitespace().next().unwrap_or_default();
        if tokens.first().map(|t| &t.kind) != Some(&TokenKind::Mnemonic) {
            return Err(ErrorKind::InvalidExample {
                example: desc.example.into(),
                reason: "does not start with a mnemonic".into(),
            });
        }
        let operands: Vec<&Token> = tokens[1..]
            .iter()
            .filter(|t| t.class().is_some_and(TokenClass::is_operand))
            .collect();
        let pattern = tokens[1..].iter().filter_map(Token::class).collect();

        let compact = desc.compact.map(|(_, t)| t).unwrap_or(&[]);
        for template in desc.expansion.iter().chain(compact) {
            let line = render(template, |p| match p {
                Placeholder::Text(n) => operands
                    .get(n)
                    .map(|t| t.text.clone())
                    .ok_or_else(|| invalid(template, format!("no operand {n}"))),
                other if other.operand() < operands.len() => Ok("0".into()),
                other => Err(invalid(template, format!("no operand {}", other.operand()))),
            })?;
            let expanded = tokenize(&line).map_err(|e| invalid(template, e.to_string()))?;
            let Some((head, rest)) = expanded.split_first() else {
                return Err(invalid(template, "empty expansion".into()));
            };
            let entry = catalog
                .lookup(&head.text)
                .map(|id| catalog.entry(id))
                .ok_or_else(|| {
                    invalid(template, format!("`{}` is not a basic instruction", head.text))
                })?;
            let end = expanded.last().map_or(1, Token::end_column);
            match_operands(&entry.pattern, rest, end).map_err(|e| {
                invalid(template, format!("operands do not match `{}` ({e:?})", entry.example))
            })?;
        }

        Ok(Self {
            mnemonic,
            example: desc.example,
            description: desc.description,
            pattern,
            expansion: desc.expansion,
            compact: desc.compact,
        })
    }
}

#[derive(Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_mnemonic: HashMap<&'static str, EntryId>,
    buckets: Vec<Vec<EntryId>>,
    pseudos: Vec<PseudoEntry>,
    pseudo_index: HashMap<&'static str, Vec<usize>>,
    defects: Vec<Diagnostic>,
}

impl Catalog {
    /// Validates and indexes `basic` and `pseudo` descriptions.
    ///
    /// Malformed entries are left out and reported by [`Catalog::defects`].
    /// Overlapping encodings or a repeated mnemonic fail the build.
    pub fn build(basic: &[InstrDesc], pseudo: &[PseudoDesc]) -> Result<Self, Diagnostics> {
        let mut defects = Vec::new();
        let mut entries = Vec::with_capacity(basic.len());
        for desc in basic {
            match CatalogEntry::from_desc(desc) {
                Ok(entry) => entries.push(entry),
                Err(kind) => {
                    warn!(example = desc.example, error = %kind, "catalog entry excluded");
                    defects.push(Diagnostic::catalog(kind));
                }
            }
        }

        let mut fatal = Diagnostics::default();
        let mut by_mnemonic = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if by_mnemonic.insert(entry.mnemonic, EntryId(i as u16)).is_some() {
                let kind = ErrorKind::DuplicateMnemonic(entry.mnemonic.into());
                fatal.push(Diagnostic::catalog(kind));
            }
        }
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if collide(a, b) {
                    fatal.push(Diagnostic::catalog(ErrorKind::Collision {
                        first: a.mnemonic.into(),
                        second: b.mnemonic.into(),
                    }));
                }
            }
        }
        if !fatal.is_empty() {
            return Err(fatal);
        }

        let mut buckets = vec![Vec::new(); BUCKETS];
        for (i, entry) in entries.iter().enumerate() {
            let care = entry.mask.fixed & BUCKET_BITS;
            for (b, bucket) in buckets.iter_mut().enumerate() {
                if (bucket_word(b) ^ entry.mask.value) & care == 0 {
                    bucket.push(EntryId(i as u16));
                }
            }
        }

        let mut catalog = Self {
            entries,
            by_mnemonic,
            buckets,
            pseudos: Vec::new(),
            pseudo_index: HashMap::new(),
            defects,
        };
        for desc in pseudo {
            match PseudoEntry::validate(desc, &catalog) {
                Ok(entry) => {
                    let index = catalog.pseudos.len();
                    catalog.pseudo_index.entry(entry.mnemonic).or_default().push(index);
                    catalog.pseudos.push(entry);
                }
                Err(kind) => {
                    warn!(example = desc.example, error = %kind, "pseudo-instruction excluded");
                    catalog.defects.push(Diagnostic::catalog(kind));
                }
            }
        }
        debug!(
            entries = catalog.entries.len(),
            pseudos = catalog.pseudos.len(),
            defects = catalog.defects.len(),
            "catalog built"
        );
        Ok(catalog)
    }

    /// The RV32IMF + Zicsr catalog, built once per process.
    pub fn standard() -> Result<&'static Catalog, &'static Diagnostics> {
        static STANDARD: OnceLock<Result<Catalog, Diagnostics>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Catalog::build(&isa::base_instructions(), isa::pseudo::TABLE))
            .as_ref()
    }

    pub fn entry(&self, id: EntryId) -> &CatalogEntry {
        &self.entries[id.0 as usize]
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &CatalogEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (EntryId(i as u16), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, mnemonic: &str) -> Option<EntryId> {
        self.by_mnemonic.get(mnemonic).copied()
    }

    pub fn pseudos(&self, mnemonic: &str) -> impl Iterator<Item = &PseudoEntry> {
        self.pseudo_index
            .get(mnemonic)
            .into_iter()
            .flatten()
            .map(|&i| &self.pseudos[i])
    }

    pub fn all_pseudos(&self) -> &[PseudoEntry] {
        &self.pseudos
    }

    /// Entries and pseudo-instructions excluded at build time.
    pub fn defects(&self) -> &[Diagnostic] {
        &self.defects
    }
}

impl Decoder for Catalog {
    fn decode(&self, word: u32) -> Option<Decoded> {
        self.buckets[bucket_index(word)]
            .iter()
            .copied()
            .find(|&id| self.entry(id).matches(word))
            .map(|id| Decoded { entry: id, operands: self.entry(id).decode(word) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_word_inverts_index() {
        for word in [0x0000_0013u32, 0xFE73_5EE3, 0x0000_7073, 0xFFFF_FFFF] {
            assert_eq!(bucket_index(bucket_word(bucket_index(word))), bucket_index(word));
        }
    }
}
