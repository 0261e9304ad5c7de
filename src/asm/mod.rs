//! Two-pass assembler.
//!
//! Pass one tokenizes every line, binds labels, lays out data and matches
//! each instruction against the catalog so its size is known. Pass two
//! resolves label references, expands pseudo-instructions and encodes.
//! Every error is collected; assembly fails only after all lines are seen.

pub mod directive;
pub mod matcher;
pub mod pseudo;

use std::collections::BTreeMap;

use tracing::info;

use crate::catalog::{Catalog, EntryId};
use crate::config::SimConfig;
use crate::error::{Diagnostic, Diagnostics, ErrorKind, SourcePos};
use crate::instructions::{CatalogEntry, Operands, WORD_LEN};
use crate::program::{Program, ProgramStatement};
use crate::token::{tokenize, Token, TokenKind};

use directive::{pad_to, DataEmitter, Directive, Fixup};
use matcher::{match_operands, MatchError, MatchedOperand, Operand};
use pseudo::{fits_imm12, render, split_hi_lo, Placeholder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Text,
    Data,
}

enum Form {
    Basic(EntryId),
    Pseudo(&'static [&'static str]),
}

/// An instruction line matched in pass one, waiting for labels.
struct Pending {
    pos: SourcePos,
    source: String,
    address: u32,
    form: Form,
    operands: Vec<MatchedOperand>,
}

/// Pass-one cursor state.
struct Layout {
    segment: Segment,
    text_base: u32,
    text_len: u64,
    data_base: u32,
    data: Vec<u8>,
    fixups: Vec<Fixup>,
    symbols: BTreeMap<String, u32>,
    pending: Vec<Pending>,
    diags: Diagnostics,
}

impl Layout {
    fn here(&self) -> u32 {
        match self.segment {
            Segment::Text => self.text_base.wrapping_add(self.text_len as u32),
            Segment::Data => self.data_base.wrapping_add(self.data.len() as u32),
        }
    }

    fn bind(&mut self, line: usize, labels: &[Token]) {
        let addr = self.here();
        for label in labels {
            if self.symbols.contains_key(&label.text) {
                self.diags.push(Diagnostic::at(
                    SourcePos::new(line, label.column),
                    ErrorKind::DuplicateLabel(label.text.clone()),
                ));
            } else {
                self.symbols.insert(label.text.clone(), addr);
            }
        }
    }
}

fn directive_error(line: usize, tok: &Token, reason: &str) -> Diagnostic {
    Diagnostic::at(
        SourcePos::new(line, tok.column),
        ErrorKind::Directive { directive: tok.text.clone(), reason: reason.into() },
    )
}

fn match_error(line: usize, mnemonic: &str, expected: &str, err: MatchError) -> Diagnostic {
    let pos = SourcePos::new(line, err.column());
    let (mnemonic, expected) = (mnemonic.to_string(), expected.to_string());
    let kind = match err {
        MatchError::TooFew { .. } => ErrorKind::MissingOperand { mnemonic, expected },
        MatchError::TooMany { .. } => ErrorKind::ExtraOperand { mnemonic, expected },
        MatchError::Mismatch { found, .. } => ErrorKind::OperandMismatch { found, expected },
    };
    Diagnostic::at(pos, kind)
}

fn symbol_value(symbols: &BTreeMap<String, u32>, op: &MatchedOperand) -> Result<i64, ErrorKind> {
    match &op.operand {
        Operand::Value(v) => Ok(*v),
        Operand::Symbol(name) => symbols
            .get(name)
            .map(|&addr| addr as i64)
            .ok_or_else(|| ErrorKind::UndefinedLabel(name.clone())),
    }
}

/// Resolves matched operands to field values and encodes them. On error,
/// returns the index of the offending operand.
fn encode(
    entry: &CatalogEntry,
    operands: &[MatchedOperand],
    address: u32,
    symbols: &BTreeMap<String, u32>,
) -> Result<(Operands, u32), (usize, ErrorKind)> {
    let mut ops = Operands::new();
    for (i, (field, op)) in entry.fields.iter().zip(operands).enumerate() {
        let mut value = symbol_value(symbols, op).map_err(|k| (i, k))?;
        if field.is_pc_relative() {
            value = (value as u32).wrapping_sub(address) as i32 as i64;
        }
        ops.push(field.normalize(value).map_err(|e| (i, e.into()))?);
    }
    let word = entry.encode(&ops).map_err(|e| (0, e.into()))?;
    Ok((ops, word))
}

#[derive(Debug, Clone, Copy)]
pub struct Assembler<'c> {
    catalog: &'c Catalog,
    text_base: u32,
    data_base: u32,
}

impl<'c> Assembler<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self::with_config(catalog, &SimConfig::default())
    }

    pub fn with_config(catalog: &'c Catalog, cfg: &SimConfig) -> Self {
        Self { catalog, text_base: cfg.text_base, data_base: cfg.data_base }
    }

    pub fn assemble(&self, source: &str) -> Result<Program, Diagnostics> {
        let mut layout = Layout {
            segment: Segment::Text,
            text_base: self.text_base,
            text_len: 0,
            data_base: self.data_base,
            data: Vec::new(),
            fixups: Vec::new(),
            symbols: BTreeMap::new(),
            pending: Vec::new(),
            diags: Diagnostics::default(),
        };
        for (i, text) in source.lines().enumerate() {
            self.first_pass_line(&mut layout, i + 1, text);
        }
        if layout.text_base as u64 + layout.text_len > 1 << 32 {
            layout.diags.push(Diagnostic::at(SourcePos::new(1, 1), ErrorKind::AddressOverflow));
        }
        if layout.data_base as u64 + layout.data.len() as u64 > 1 << 32 {
            layout.diags.push(Diagnostic::at(SourcePos::new(1, 1), ErrorKind::AddressOverflow));
        }

        let mut statements = Vec::with_capacity(layout.text_len as usize / WORD_LEN as usize);
        for pending in &layout.pending {
            if let Err(d) = self.second_pass(pending, &layout.symbols, &mut statements) {
                layout.diags.push(d);
            }
        }
        for fixup in &layout.fixups {
            match layout.symbols.get(&fixup.symbol) {
                Some(addr) => {
                    layout.data[fixup.offset..fixup.offset + 4].copy_from_slice(&addr.to_le_bytes())
                }
                None => {
                    let kind = ErrorKind::UndefinedLabel(fixup.symbol.clone());
                    layout.diags.push(Diagnostic::at(fixup.pos, kind));
                }
            }
        }

        if !layout.diags.is_empty() {
            layout.diags.0.sort_by_key(|d| d.pos);
            info!(errors = layout.diags.len(), "assembly failed");
            return Err(layout.diags);
        }

        let text_end = layout.text_base.wrapping_add(layout.text_len as u32);
        let entry = layout
            .symbols
            .get("main")
            .copied()
            .filter(|&a| a >= layout.text_base && a < text_end)
            .unwrap_or(layout.text_base);
        info!(
            instructions = statements.len(),
            data_bytes = layout.data.len(),
            symbols = layout.symbols.len(),
            "assembled"
        );
        Ok(Program {
            text_base: layout.text_base,
            statements,
            data_base: layout.data_base,
            data: layout.data,
            symbols: layout.symbols,
            entry,
        })
    }

    fn first_pass_line(&self, layout: &mut Layout, line: usize, text: &str) {
        let tokens = match tokenize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                // Labels ahead of the bad token still name this address.
                let prefix: String = text.chars().take(e.column.saturating_sub(1)).collect();
                if let Ok(tokens) = tokenize(&prefix) {
                    let split = tokens.iter().take_while(|t| t.kind == TokenKind::Label).count();
                    layout.bind(line, &tokens[..split]);
                }
                layout.diags.push(Diagnostic::at(SourcePos::new(line, e.column), e.into()));
                return;
            }
        };
        let split = tokens.iter().take_while(|t| t.kind == TokenKind::Label).count();
        let (labels, rest) = tokens.split_at(split);
        let Some((head, args)) = rest.split_first() else {
            layout.bind(line, labels);
            return;
        };

        match head.kind {
            TokenKind::Directive => self.directive(layout, line, labels, head, args),
            TokenKind::Mnemonic => {
                if layout.segment == Segment::Data {
                    layout.bind(line, labels);
                    let pos = SourcePos::new(line, head.column);
                    layout.diags.push(Diagnostic::at(pos, ErrorKind::InstructionInData));
                    return;
                }
                layout.bind(line, labels);
                let end = tokens.last().map_or(head.end_column(), Token::end_column);
                match self.match_instruction(line, head, args, end) {
                    Ok((form, operands)) => {
                        let count = match form {
                            Form::Basic(_) => 1,
                            Form::Pseudo(templates) => templates.len() as u64,
                        };
                        layout.pending.push(Pending {
                            pos: SourcePos::new(line, head.column),
                            source: text.trim().to_string(),
                            address: layout.here(),
                            form,
                            operands,
                        });
                        layout.text_len += count * WORD_LEN as u64;
                    }
                    Err(d) => layout.diags.push(d),
                }
            }
            _ => {
                layout.bind(line, labels);
                layout.diags.push(Diagnostic::at(
                    SourcePos::new(line, head.column),
                    ErrorKind::UnknownMnemonic(head.text.clone()),
                ));
            }
        }
    }

    fn directive(
        &self,
        layout: &mut Layout,
        line: usize,
        labels: &[Token],
        head: &Token,
        args: &[Token],
    ) {
        let Some(directive) = Directive::parse(&head.text) else {
            layout.bind(line, labels);
            layout.diags.push(Diagnostic::at(
                SourcePos::new(line, head.column),
                ErrorKind::UnknownDirective(head.text.clone()),
            ));
            return;
        };
        match directive {
            Directive::Text | Directive::Data => {
                if let Some(extra) = args.first() {
                    layout.diags.push(directive_error(line, extra, "takes no operands"));
                }
                layout.segment = match directive {
                    Directive::Text => Segment::Text,
                    _ => Segment::Data,
                };
                layout.bind(line, labels);
            }
            Directive::Globl => {
                layout.bind(line, labels);
                if let Some(bad) = args.iter().find(|t| t.kind != TokenKind::Identifier) {
                    layout.diags.push(directive_error(line, bad, "expects label names"));
                }
            }
            _ if layout.segment == Segment::Text => {
                layout.bind(line, labels);
                // Instructions keep the text segment word aligned already.
                let word_aligned = directive == Directive::Align
                    && matches!(args, [t] if matches!(t.kind, TokenKind::Integer(0..=2)));
                if !word_aligned {
                    let d = directive_error(line, head, "only allowed in the data segment");
                    layout.diags.push(d);
                }
            }
            _ => {
                pad_to(&mut layout.data, layout.data_base, directive.alignment());
                layout.bind(line, labels);
                let mut emitter = DataEmitter {
                    data: &mut layout.data,
                    base: layout.data_base,
                    fixups: &mut layout.fixups,
                    line,
                };
                if let Err(d) = emitter.emit(directive, head, args) {
                    layout.diags.push(d);
                }
            }
        }
    }

    /// Tries the basic entry first, then every pseudo form of `head`. When
    /// none fits, reports the candidate that got furthest into the line.
    fn match_instruction(
        &self,
        line: usize,
        head: &Token,
        args: &[Token],
        end: usize,
    ) -> Result<(Form, Vec<MatchedOperand>), Diagnostic> {
        let mut best: Option<(MatchError, &str)> = None;
        let mut consider = |err: MatchError, example: &'static str| {
            if best.as_ref().map_or(true, |(b, _)| err.column() > b.column()) {
                best = Some((err, example));
            }
        };

        if let Some(id) = self.catalog.lookup(&head.text) {
            let entry = self.catalog.entry(id);
            match match_operands(&entry.pattern, args, end) {
                Ok(ops) => return Ok((Form::Basic(id), ops)),
                Err(e) => consider(e, entry.example),
            }
        }
        for pseudo in self.catalog.pseudos(&head.text) {
            match match_operands(&pseudo.pattern, args, end) {
                Ok(ops) => {
                    let small = |n: usize| match ops.get(n) {
                        Some(MatchedOperand { operand: Operand::Value(v), .. }) => fits_imm12(*v),
                        _ => false,
                    };
                    let templates = match pseudo.compact {
                        Some((n, compact)) if small(n) => compact,
                        _ => pseudo.expansion,
                    };
                    return Ok((Form::Pseudo(templates), ops));
                }
                Err(e) => consider(e, pseudo.example),
            }
        }

        match best {
            Some((err, example)) => Err(match_error(line, &head.text, example, err)),
            None => Err(Diagnostic::at(
                SourcePos::new(line, head.column),
                ErrorKind::UnknownMnemonic(head.text.clone()),
            )),
        }
    }

    fn second_pass(
        &self,
        pending: &Pending,
        symbols: &BTreeMap<String, u32>,
        out: &mut Vec<ProgramStatement>,
    ) -> Result<(), Diagnostic> {
        let at = |column: usize, kind: ErrorKind| {
            Diagnostic::at(SourcePos::new(pending.pos.line, column), kind)
        };
        let templates = match pending.form {
            Form::Basic(id) => {
                let entry = self.catalog.entry(id);
                let (operands, word) = encode(entry, &pending.operands, pending.address, symbols)
                    .map_err(|(i, kind)| {
                        let fallback = pending.pos.column;
                        at(pending.operands.get(i).map_or(fallback, |o| o.column), kind)
                    })?;
                out.push(ProgramStatement {
                    entry: id,
                    operands,
                    pos: pending.pos,
                    source: pending.source.clone(),
                    address: pending.address,
                    word,
                });
                return Ok(());
            }
            Form::Pseudo(templates) => templates,
        };

        // Columns of expanded operands point back at the written operand they came from.
        let column_of = |text: &str| {
            pending
                .operands
                .iter()
                .find(|o| o.text == text)
                .map_or(pending.pos.column, |o| o.column)
        };
        let base = pending.address;
        let pc_offset = |target: i64| (target as u32).wrapping_sub(base) as i64;
        for (k, template) in templates.iter().enumerate() {
            let address = base.wrapping_add(k as u32 * WORD_LEN);
            let line = render(template, |p| {
                let op = &pending.operands[p.operand()];
                let value = || symbol_value(symbols, op).map_err(|kind| at(op.column, kind));
                Ok(match p {
                    Placeholder::Text(_) => op.text.clone(),
                    Placeholder::Hi(_) => split_hi_lo(value()?).0.to_string(),
                    Placeholder::Lo(_) => split_hi_lo(value()?).1.to_string(),
                    Placeholder::PcHi(_) => split_hi_lo(pc_offset(value()?)).0.to_string(),
                    Placeholder::PcLo(_) => split_hi_lo(pc_offset(value()?)).1.to_string(),
                })
            })?;
            let tokens = tokenize(&line).map_err(|e| at(pending.pos.column, e.into()))?;
            let Some((head, args)) = tokens.split_first() else {
                return Err(at(pending.pos.column, ErrorKind::UnknownMnemonic(line)));
            };
            let id = self.catalog.lookup(&head.text).ok_or_else(|| {
                at(pending.pos.column, ErrorKind::UnknownMnemonic(head.text.clone()))
            })?;
            let entry = self.catalog.entry(id);
            let end = tokens.last().map_or(1, Token::end_column);
            let matched = match_operands(&entry.pattern, args, end)
                .map_err(|e| match_error(pending.pos.line, &head.text, entry.example, e))?;
            let (operands, word) = encode(entry, &matched, address, symbols).map_err(|(i, kind)| {
                let column = matched.get(i).map_or(pending.pos.column, |o| column_of(&o.text));
                at(column, kind)
            })?;
            out.push(ProgramStatement {
                entry: id,
                operands,
                pos: pending.pos,
                source: pending.source.clone(),
                address,
                word,
            });
        }
        Ok(())
    }
}

/// Assembles `source` with the standard catalog and default layout.
pub fn assemble(source: &str) -> Result<Program, Diagnostics> {
    let catalog = Catalog::standard().map_err(Clone::clone)?;
    Assembler::new(catalog).assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_resolve_forward_and_backward() {
        let program = assemble("start: beq a0, a1, end\n  j start\nend: nop\n").unwrap();
        let words: Vec<u32> = program.statements.iter().map(|s| s.word).collect();
        assert_eq!(program.symbols["end"], 8);
        // beq a0, a1, +8 ; jal x0, -4 ; addi x0, x0, 0
        assert_eq!(words, vec![0x00B5_0463, 0xFFDF_F06F, 0x0000_0013]);
    }

    #[test]
    fn li_picks_compact_form_for_small_literals() {
        let program = assemble("li t0, -5\nli t1, 0x12345678\n").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert_eq!(program.statements[0].word, 0xFFB0_0293); // addi t0, x0, -5
        assert_eq!(program.statements[1].word, 0x1234_5337); // lui t1, 0x12345
        assert_eq!(program.statements[2].word, 0x6783_0313); // addi t1, t1, 0x678
        assert!(program.statements[1..].iter().all(|s| s.source == "li t1, 0x12345678"));
    }
}
