use pretty_assertions::assert_eq;

use rv32_rs::error::Origin;
use rv32_rs::instructions::EncodeError;
use rv32_rs::token::TokenErrorKind;
use rv32_rs::{assemble, Catalog, Decoded, Decoder, Diagnostics, ErrorKind, Program, SourcePos};

fn words(program: &Program) -> Vec<u32> {
    program.statements.iter().map(|s| s.word).collect()
}

fn errors(diags: &Diagnostics) -> Vec<(SourcePos, ErrorKind)> {
    diags
        .iter()
        .map(|d| {
            assert_eq!(d.origin, Origin::Source);
            (d.pos.unwrap(), d.kind.clone())
        })
        .collect()
}

#[test]
fn assembled_words_decode_to_resolved_operands() {
    let program = assemble(
        "
    main:
        lui t1, 0x12345
        auipc a0, -1
        addi sp, sp, -16
        sw ra, 12(sp)
        lw a0, (sp)
        slli t2, t2, 31
        mulhsu s11, t6, a3
        csrrwi zero, frm, 31
        fmadd.s ft0, fa1, fs2, ft11, rmm
        feq.s a0, f1, f31
        fence 15, 3
        bltu a0, a1, main
        jal ra, main
        ebreak
    ",
    )
    .unwrap();
    let catalog = Catalog::standard().unwrap();
    for s in &program.statements {
        assert_eq!(
            catalog.decode(s.word),
            Some(Decoded { entry: s.entry, operands: s.operands }),
            "{}",
            s.source
        );
    }
    assert_eq!(program.statements[0].word, 0x1234_5337);
    assert_eq!(program.statements[1].operands.as_slice(), &[10, 0xFFFFF]);
    assert_eq!(program.statements[4].word, 0x0001_2503);
    assert_eq!(program.statements[11].operands.as_slice(), &[10, 11, -44]);
}

#[test]
fn errors_carry_position_and_do_not_stop_assembly() {
    let src = "add t0, t1\nfoo t0\naddi t0, t0, 5000\nj nowhere\nadd t0, t1, t2, t3\n";
    let diags = assemble(src).unwrap_err();
    assert_eq!(
        errors(&diags),
        vec![
            (
                SourcePos::new(1, 11),
                ErrorKind::MissingOperand {
                    mnemonic: "add".into(),
                    expected: "add t1,
                    t2,
                    t3".into(),
                }
            ),
            (SourcePos::new(2, 1), ErrorKind::UnknownMnemonic("foo".into())),
            (
                SourcePos::new(3, 14),
                ErrorKind::Encode(EncodeError::OutOfRange { value: 5000, min: -2048, max: 2047 })
            ),
            (SourcePos::new(4, 3), ErrorKind::UndefinedLabel("nowhere".into())),
            (
                SourcePos::new(5, 17),
                ErrorKind::ExtraOperand {
                    mnemonic: "add".into(),
                    expected: "add t1,
                    t2,
                    t3".into(),
                }
            ),
        ]
    );
}

#[test]
fn syntax_and_shape_errors() {
    let src = "addi t0, t0, 0x\nadd t0, f1, t2\nx: nop\nx: nop\nbeq t0, t1, 3\n";
    let diags = assemble(src).unwrap_err();
    assert_eq!(
        errors(&diags),
        vec![
            (SourcePos::new(1, 14), ErrorKind::Syntax(rv32_rs::token::TokenError {
                column: 14,
                kind: TokenErrorKind::MalformedNumber("0x".into()),
            })),
            (
                SourcePos::new(2, 9),
                ErrorKind::OperandMismatch { found: "f1".into(), expected: "add t1, t2, t3".into() }
            ),
            (SourcePos::new(4, 1), ErrorKind::DuplicateLabel("x".into())),
            (
                SourcePos::new(5, 13),
                ErrorKind::Encode(EncodeError::Misaligned { value: -5, align: 2 })
            ),
        ]
    );
}

#[test]
fn pseudo_instructions_expand() {
    let program = assemble(
        "
        li t0, -1
        li t0, 0xFFFFFFFF
        li t0, 0x800
        mv a0, a1
        not a0, a0
        beqz a0, end
        nop
        j 0
    end:
        ret
    ",
    )
    .unwrap();
    assert_eq!(
        words(&program),
        vec![
            0xFFF0_0293, // addi t0, zero, -1
            0xFFF0_0293,
            0x0000_12B7, // lui t0, 1
            0x8002_8293, // addi t0, t0, -2048
            0x0005_8513, // addi a0, a1, 0
            0xFFF5_4513, // xori a0, a0, -1
            0x0005_0663, // beq a0, zero, +12
            0x0000_0013,
            0xFE1F_F06F, // jal zero, -32
            0x0000_8067, // jalr zero, ra, 0
        ]
    );
    assert_eq!(program.statements[3].source, "li t0, 0x800");
    assert_eq!(program.statements[3].address, 12);
}

#[test]
fn data_directives_lay_out_aligned_bytes() {
    let program = assemble(
        "
        .data
    b:  .byte 1
    w:  .word 0x11223344, b
    h:  .half -1
    s:  .asciz \"hi\"
        .align 3
    f:  .float 1.5
        .text
        .globl main
    main:
        la a0, w
    ",
    )
    .unwrap();
    let sym = |n: &str| program.symbols[n];
    assert_eq!(
        (sym("b"), sym("w"), sym("h"), sym("s"), sym("f"), sym("main")),
        (0x2000, 0x2004, 0x200C, 0x200E, 0x2018, 0)
    );
    assert_eq!(
        program.data,
        vec![
            0x01, 0, 0, 0, 0x44, 0x33, 0x22, 0x11, 0x00, 0x20, 0, 0, 0xFF, 0xFF, b'h', b'i', 0, 0,
            0, 0, 0, 0, 0, 0, 0x00, 0x00, 0xC0, 0x3F,
        ]
    );
    // auipc a0, 2 ; addi a0, a0, 4
    assert_eq!(words(&program), vec![0x0000_2517, 0x0045_0513]);
    assert_eq!(program.entry, 0);
}

#[test]
fn segments_reject_foreign_content() {
    let diags = assemble(".word 5\n.data\nadd t0, t0, t0\n.byte 300\n.bogus\n").unwrap_err();
    let kinds: Vec<_> = errors(&diags).into_iter().map(|(pos, kind)| (pos.line, kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (
                1,
                ErrorKind::Directive {
                    directive: ".word".into(),
                    reason: "only allowed in the data segment".into()
                }
            ),
            (3, ErrorKind::InstructionInData),
            (
                4,
                ErrorKind::Directive {
                    directive: ".byte".into(),
                    reason: "300 is outside [-128,
                    255]".into(),
                }
            ),
            (5, ErrorKind::UnknownDirective(".bogus".into())),
        ]
    );
}

#[test]
fn entry_point_is_main_when_present() {
    let program = assemble("nop\nnop\nmain: nop\n").unwrap();
    assert_eq!(program.entry, 8);
    assert_eq!(program.statement_at(8).map(|s| s.word), Some(0x13));
    assert!(program.statement_at(6).is_none());
    assert!(program.statement_at(12).is_none());
}

#[test]
fn labels_on_lines_with_syntax_errors_still_bind() {
    let diags = assemble("loop: addi t0, t0, 0x\nj loop\n").unwrap_err();
    assert_eq!(
        errors(&diags),
        vec![(
            SourcePos::new(1, 20),
            ErrorKind::Syntax(rv32_rs::token::TokenError {
                column: 20,
                kind: TokenErrorKind::MalformedNumber("0x".into()),
            })
        )]
    );
}

#[test]
fn literals_wider_than_64_bits_are_rejected() {
    for word in ["0xFFFFFFFFFFFFFFFF", "-9223372036854775808"] {
        let diags = assemble(&format!("li t0, {word}\n")).unwrap_err();
        assert_eq!(
            errors(&diags),
            vec![(
                SourcePos::new(1, 8),
                ErrorKind::Syntax(rv32_rs::token::TokenError {
                    column: 8,
                    kind: TokenErrorKind::MalformedNumber(word.into()),
                })
            )]
        );
    }
}

#[test]
fn single_operand_directives_reject_extras() {
    let diags = assemble(".data\n.space 2, 3\n.align 2, 1\nok: .space 3\n").unwrap_err();
    assert_eq!(
        errors(&diags),
        vec![
            (
                SourcePos::new(2, 11),
                ErrorKind::Directive {
                    directive: ".space".into(),
                    reason: "takes one operand".into(),
                }
            ),
            (
                SourcePos::new(3, 11),
                ErrorKind::Directive {
                    directive: ".align".into(),
                    reason: "takes one operand".into(),
                }
            ),
        ]
    );
}
