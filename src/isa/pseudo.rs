//! Pseudo-instructions, expanded by the assembler into basic instructions.
//!
//! Expansion templates use `{n}` for the text of operand `n` and
//! `{hi:n}`/`{lo:n}` for the upper/lower split of its value. `{phi:n}` and
//! `{plo:n}` split the offset from the first expanded instruction to the
//! address named by operand `n`.

#[derive(Debug, Clone, Copy)]
pub struct PseudoDesc {
    pub example: &'static str,
    pub description: &'static str,
    pub expansion: &'static [&'static str],
    /// Alternative used when operand `.0` is a literal that fits a signed
    /// 12-bit immediate.
    pub compact: Option<(usize, &'static [&'static str])>,
}

const fn p(
    example: &'static str,
    description: &'static str,
    expansion: &'static [&'static str],
) -> PseudoDesc {
    PseudoDesc { example, description, expansion, compact: None }
}

#[rustfmt::skip]
pub const TABLE: &[PseudoDesc] = &[
    p("nop", "No operation", &["addi x0, x0, 0"]),
    p("mv t1, t2", "Copy register", &["addi {0}, {1}, 0"]),
    p("not t1, t2", "Bitwise complement", &["xori {0}, {1}, -1"]),
    p("neg t1, t2", "Two's complement negation", &["sub {0}, x0, {1}"]),
    PseudoDesc {
        example: "li t1, 100",
        description: "Load 32-bit immediate",
        expansion: &["lui {0}, {hi:1}", "addi {0}, {0}, {lo:1}"],
        compact: Some((1, &["addi {0}, x0, {lo:1}"])),
    },
    p("la t1, label", "Load address (pc-relative)", &["auipc {0}, {phi:1}", "addi {0}, {0}, {plo:1}"]),
    p("j label", "Jump", &["jal x0, {0}"]),
    p("jal label", "Jump and link through ra", &["jal ra, {0}"]),
    p("jr t1", "Jump to register", &["jalr x0, {0}, 0"]),
    p("jalr t1", "Jump to register and link through ra", &["jalr ra, {0}, 0"]),
    p("ret", "Return from subroutine", &["jalr x0, ra, 0"]),
    p("call label", "Call a far subroutine", &["auipc ra, {phi:0}", "jalr ra, ra, {plo:0}"]),
    p("beqz t1, label", "Branch if zero", &["beq {0}, x0, {1}"]),
    p("bnez t1, label", "Branch if not zero", &["bne {0}, x0, {1}"]),
    p("blez t1, label", "Branch if less than or equal to zero", &["bge x0, {0}, {1}"]),
    p("bgez t1, label", "Branch if greater than or equal to zero", &["bge {0}, x0, {1}"]),
    p("bltz t1, label", "Branch if less than zero", &["blt {0}, x0, {1}"]),
    p("bgtz t1, label", "Branch if greater than zero", &["blt x0, {0}, {1}"]),
    p("bgt t1, t2, label", "Branch if greater than (signed)", &["blt {1}, {0}, {2}"]),
    p("ble t1, t2, label", "Branch if less than or equal (signed)", &["bge {1}, {0}, {2}"]),
    p("bgtu t1, t2, label", "Branch if greater than (unsigned)", &["bltu {1}, {0}, {2}"]),
    p("bleu t1, t2, label", "Branch if less than or equal (unsigned)", &["bgeu {1}, {0}, {2}"]),
    p("seqz t1, t2", "Set if zero", &["sltiu {0}, {1}, 1"]),
    p("snez t1, t2", "Set if not zero", &["sltu {0}, x0, {1}"]),
    p("sltz t1, t2", "Set if less than zero", &["slt {0}, {1}, x0"]),
    p("sgtz t1, t2", "Set if greater than zero", &["slt {0}, x0, {1}"]),
    p("fmv.s f1, f2", "Copy float register", &["fsgnj.s {0}, {1}, {1}"]),
    p("fabs.s f1, f2", "Float absolute value", &["fsgnjx.s {0}, {1}, {1}"]),
    p("fneg.s f1, f2", "Float negation", &["fsgnjn.s {0}, {1}, {1}"]),
    p("csrr t1, fcsr", "Read CSR", &["csrrs {0}, {1}, x0"]),
    p("csrw fcsr, t1", "Write CSR", &["csrrw x0, {0}, {1}"]),
    p("csrs fcsr, t1", "Set bits in CSR", &["csrrs x0, {0}, {1}"]),
    p("csrc fcsr, t1", "Clear bits in CSR", &["csrrc x0, {0}, {1}"]),
    p("csrwi fcsr, 10", "Write CSR immediate", &["csrrwi x0, {0}, {1}"]),
    p("csrsi fcsr, 10", "Set bits in CSR immediate", &["csrrsi x0, {0}, {1}"]),
    p("csrci fcsr, 10", "Clear bits in CSR immediate", &["csrrci x0, {0}, {1}"]),
    p("frcsr t1", "Read fcsr", &["csrrs {0}, fcsr, x0"]),
    p("fscsr t1, t2", "Swap fcsr", &["csrrw {0}, fcsr, {1}"]),
    p("fscsr t1", "Write fcsr", &["csrrw x0, fcsr, {0}"]),
    p("frrm t1", "Read rounding mode", &["csrrs {0}, frm, x0"]),
    p("fsrm t1, t2", "Swap rounding mode", &["csrrw {0}, frm, {1}"]),
    p("fsrm t1", "Write rounding mode", &["csrrw x0, frm, {0}"]),
    p("frflags t1", "Read accrued exception flags", &["csrrs {0}, fflags, x0"]),
    p("fsflags t1, t2", "Swap accrued exception flags", &["csrrw {0}, fflags, {1}"]),
    p("fsflags t1", "Write accrued exception flags", &["csrrw x0, fflags, {0}"]),
];
