use pretty_assertions::assert_eq;

use rv32_rs::cpu::Trap;
use rv32_rs::error::Origin;
use rv32_rs::exec::{ExecCtx, Semantics};
use rv32_rs::instructions::{InstrDesc, InstructionFormat, Operands};
use rv32_rs::isa::pseudo::PseudoDesc;
use rv32_rs::{Catalog, Decoded, Decoder, ErrorKind};

const PSEUDO_MNEMONICS: [&str; 42] = [
    "nop", "mv", "not", "neg", "li", "la", "j", "jr", "ret", "call", "jal", "jalr", "beqz", "bnez",
    "blez", "bgez", "bltz", "bgtz", "bgt", "ble", "bgtu", "bleu", "seqz", "snez", "sltz", "sgtz",
    "fmv.s", "fabs.s", "fneg.s", "csrr", "csrw", "csrs", "csrc", "csrwi", "csrsi", "csrci", "frcsr",
    "fscsr", "frrm", "fsrm", "frflags", "fsflags",
];

fn nop(_: &mut ExecCtx<'_>) -> Result<(), Trap> {
    Ok(())
}

fn desc(example: &'static str, format: InstructionFormat, mask: &'static str) -> InstrDesc {
    InstrDesc { example, description: "", format, mask, semantics: Semantics::Exec(nop) }
}

#[test]
fn every_entry_round_trips_at_field_boundaries() {
    let catalog = Catalog::standard().unwrap();
    for (id, entry) in catalog.entries() {
        for high in [false, true] {
            let ops: Operands = entry
                .fields
                .iter()
                .map(|f| {
                    let (min, max) = f.range();
                    let v = match (high, f.is_pc_relative()) {
                        (false, _) => min,
                        (true, true) => max & !1,
                        (true, false) => max,
                    };
                    f.normalize(v).unwrap()
                })
                .collect();
            let word = entry
                .encode(&ops)
                .unwrap_or_else(|e| panic!("{}: {e}", entry.mnemonic));
            assert!(entry.matches(word), "{} does not match its own encoding", entry.mnemonic);
            assert_eq!(
                catalog.decode(word),
                Some(Decoded { entry: id, operands: ops }),
                "{} {:?} -> {word:#010x}",
                entry.mnemonic,
                ops
            );
        }
    }
}

#[test]
fn standard_catalog_is_complete_and_clean() {
    let catalog = Catalog::standard().unwrap();
    assert!(catalog.defects().is_empty(), "{:?}", catalog.defects());
    assert_eq!(catalog.len(), 83);
    assert_eq!(catalog.all_pseudos().len(), 45);
    for m in ["lui", "csrrci", "remu", "fnmadd.s", "fmv.w.x", "uret"] {
        assert!(catalog.lookup(m).is_some(), "{m} missing");
    }
    for m in PSEUDO_MNEMONICS {
        assert!(catalog.pseudos(m).next().is_some(), "pseudo {m} missing");
    }
    for m in ["fscsr", "fsrm", "fsflags"] {
        assert_eq!(catalog.pseudos(m).count(), 2, "{m}");
    }
    assert_eq!(catalog.pseudos("li").count(), 1);
}

#[test]
fn known_words_decode_to_expected_entries() {
    let catalog = Catalog::standard().unwrap();
    let name = |w: u32| catalog.decode(w).map(|d| catalog.entry(d.entry).mnemonic);
    assert_eq!(name(0x0000_0073), Some("ecall"));
    assert_eq!(name(0x0010_0073), Some("ebreak"));
    assert_eq!(name(0x4000_D093), Some("srai")); // srai x1, x1, 0
    assert_eq!(name(0x0000_D093), Some("srli"));
    assert_eq!(name(0x0220_81B3), Some("mul")); // mul x3, x1, x2
    assert_eq!(name(0xD000_F0D3), Some("fcvt.s.w"));
    assert_eq!(name(0xFFFF_FFFF), None);
    assert_eq!(name(0), None);
}

#[test]
fn overlapping_masks_fail_the_build() {
    let basic = [
        desc("add t1, t2, t3", InstructionFormat::R, "0000000 ttttt sssss 000 fffff 0110011"),
        desc("addx t1, t2, t3", InstructionFormat::R, "000000 0 ttttt sssss 000 fffff 0110011"),
    ];
    let diags = Catalog::build(&basic, &[]).unwrap_err();
    assert_eq!(diags.len(), 1);
    let d = diags.iter().next().unwrap();
    assert_eq!(d.origin, Origin::Catalog);
    assert_eq!(d.kind, ErrorKind::Collision { first: "add".into(), second: "addx".into() });
}

#[test]
fn duplicate_mnemonic_fails_the_build() {
    let basic = [
        desc("add t1, t2, t3", InstructionFormat::R, "0000000 ttttt sssss 000 fffff 0110011"),
        desc("add t1, t2, t3", InstructionFormat::R, "0100000 ttttt sssss 000 fffff 0110011"),
    ];
    let diags = Catalog::build(&basic, &[]).unwrap_err();
    assert!(diags.iter().any(|d| d.kind == ErrorKind::DuplicateMnemonic("add".into())));
}

#[test]
fn malformed_entries_are_excluded_and_recorded() {
    let basic = [
        desc("add t1, t2, t3", InstructionFormat::R, "0000000 ttttt sssss 000 fffff 0110011"),
        // 31 significant characters
        desc("sub t1, t2, t3", InstructionFormat::R, "010000 ttttt sssss 000 fffff 0110011"),
        desc("and t1, t2,, t3", InstructionFormat::R, "0000000 ttttt sssss 111 fffff 0110011"),
    ];
    let pseudo = [
        PseudoDesc {
            example: "mv t1, t2",
            description: "",
            expansion: &["add {0}, {1}, x0"],
            compact: None,
        },
        PseudoDesc {
            example: "neg t1, t2",
            description: "",
            expansion: &["sub {0}, x0, {1}"],
            compact: None,
        },
    ];
    let catalog = Catalog::build(&basic, &pseudo).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.all_pseudos().len(), 1);
    assert_eq!(catalog.defects().len(), 3);
    assert!(matches!(catalog.defects()[0].kind, ErrorKind::InvalidMask { .. }));
    assert!(matches!(catalog.defects()[1].kind, ErrorKind::InvalidExample { .. }));
    assert!(matches!(catalog.defects()[2].kind, ErrorKind::InvalidPseudo { .. }));
    assert!(catalog.defects().iter().all(|d| d.origin == Origin::Catalog && d.pos.is_none()));
}

#[test]
fn catalog_is_shareable_across_threads() {
    fn assert_sync<T: Sync + Send>(_: &T) {}
    assert_sync(Catalog::standard().unwrap());
}
