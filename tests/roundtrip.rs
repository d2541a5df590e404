//! Assemble, disassemble, reassemble: the bytes must not change.

use m68k_asm::addressing::ModeSet;
use m68k_asm::decoder::Decoder;
use m68k_asm::disasm::fmt_decoded;
use m68k_asm::instructions::{Form, Slot};
use m68k_asm::isa::m68000::{table, M68000Decoder};
use m68k_asm::{AssemblerConfig, CompilationUnit, Compiler, Cpu};
use pretty_assertions::assert_eq;

fn asm(cpu: Cpu, source: &str) -> Vec<u8> {
    let mut compiler = Compiler::new(AssemblerConfig {
        cpu,
        ..AssemblerConfig::default()
    });
    let messages = compiler.compile(&CompilationUnit::new("t.s", source));
    let errors: Vec<String> = messages.iter().map(|m| m.render("t.s", source)).collect();
    assert!(!messages.has_errors(), "{errors:?}");
    compiler.bytes()
}

fn roundtrip(cpu: Cpu, line: &str) -> String {
    let dec = M68000Decoder::new().unwrap();
    let bytes = asm(cpu, line);
    let decoded = dec
        .decode(&bytes, 0)
        .unwrap_or_else(|| panic!("`{line}` assembled to {bytes:02X?}, which did not decode"));
    assert_eq!(decoded.length as usize, bytes.len(), "length of `{line}`");
    let text = fmt_decoded(&decoded);
    assert_eq!(asm(cpu, &text), bytes, "`{line}` printed as `{text}`");
    text
}

#[test]
fn canonical_text() {
    assert_eq!(roundtrip(Cpu::M68000, "nop"), "nop");
    assert_eq!(roundtrip(Cpu::M68000, "move.w d0,d1"), "move.w d0,d1");
    assert_eq!(roundtrip(Cpu::M68000, "lea 4(a0),a1"), "lea $4(a0),a1");
    assert_eq!(roundtrip(Cpu::M68000, "moveq #-1,d0"), "moveq #-$1,d0");
    assert_eq!(roundtrip(Cpu::M68000, "movem.l d0-d3/a0,-(sp)"), "movem.l d0-d3/a0,-(a7)");
    assert_eq!(roundtrip(Cpu::M68000, "beq.s *+$20"), "beq.s $20");
}

#[test]
fn m68000_instructions() {
    let lines = [
        "move.l d0,d1",
        "move.b (a0)+,-(a1)",
        "move.w $10(a0),d2",
        "movea.l a0,a1",
        "moveq #$7f,d3",
        "pea ($1234).w",
        "jsr ($12345678).l",
        "jmp ($100).l",
        "add.w d1,d2",
        "add.l d1,(a0)",
        "adda.w d0,a0",
        "add.b #$12,d0",
        "addi.w #$1234,(a0)",
        "subq.l #8,d0",
        "clr.w -(a7)",
        "tst.b (a0)",
        "neg.l d0",
        "not.w d0",
        "and.w #$ff,d0",
        "eor.w d0,d1",
        "cmpa.l a0,a1",
        "cmpi.w #5,d0",
        "lsl.w #3,d0",
        "asr.l d1,d2",
        "rol (a0)",
        "btst #3,d0",
        "bset d1,(a0)",
        "swap d3",
        "ext.l d0",
        "exg d0,a1",
        "link a6,#-8",
        "unlk a6",
        "dbne d0,$0",
        "bra.w $100",
        "bsr.s $40",
        "seq d0",
        "trap #15",
        "stop #$2700",
        "rte",
        "rts",
        "move sr,d0",
        "move.w d0,ccr",
        "move.l a0,usp",
        "move.l usp,a3",
        "ori #$1f,ccr",
        "movem.w (a7)+,d0-d1",
        "lea $10(pc),a0",
        "tst.w $4(a0,d1.l)",
        "jmp $8(pc,d0.w)",
        "chk (a0),d1",
        "mulu #$10,d0",
        "divs d1,d0",
        "tas (a0)",
        "illegal",
        "addx.b d0,d1",
        "subx.l -(a0),-(a1)",
        "abcd -(a2),-(a3)",
        "sbcd d4,d5",
        "nbcd (a0)+",
        "cmpm.w (a0)+,(a1)+",
        "movep.l $10(a2),d3",
        "movep.w d0,-$2(a6)",
    ];
    for line in lines {
        roundtrip(Cpu::M68000, line);
    }
}

#[test]
fn m68020_modes() {
    let lines = [
        "tst.w ($1000,a0,d1.l*4)",
        "tst.l ([$8,a0],d0.w,$c)",
        "tst.l ([$8,a0,d0.w],$c)",
        "bra.l $1000",
    ];
    for line in lines {
        roundtrip(Cpu::M68020, line);
    }
}

/// One spelling per addressing class; absolute gets both widths.
const SAMPLES: &[(ModeSet, &str)] = &[
    (ModeSet::DN, "d1"),
    (ModeSet::AN, "a1"),
    (ModeSet::IND, "(a2)"),
    (ModeSet::POSTINC, "(a3)+"),
    (ModeSet::PREDEC, "-(a4)"),
    (ModeSet::DISP, "$8(a5)"),
    (ModeSet::INDEX, "$4(a6,d2.w)"),
    (ModeSet::ABS, "($1234).w"),
    (ModeSet::ABS, "($12345678).l"),
    (ModeSet::PC_DISP, "$20(pc)"),
    (ModeSet::PC_INDEX, "$20(pc,d0.w)"),
    (ModeSet::IMM, "#1"),
];

fn spellings(set: ModeSet, slot: Slot) -> Vec<&'static str> {
    match slot {
        Slot::Implied if set.contains(ModeSet::SR) => vec!["sr"],
        Slot::Implied if set.contains(ModeSet::CCR) => vec!["ccr"],
        Slot::Implied => vec!["usp"],
        Slot::Quick(_) => vec!["#3"],
        Slot::Data { .. } | Slot::Immediate => vec!["#1"],
        Slot::Displacement(_) => vec!["$40"],
        Slot::RegisterMask(_) => vec!["d0-d2/a0"],
        Slot::Ea { .. } | Slot::Register(_) | Slot::Based(_) => SAMPLES
            .iter()
            .filter(|(class, _)| set.contains(*class))
            .map(|&(_, text)| text)
            .collect(),
    }
}

/// Lines for `form`: each operand walks its classes while the others keep their first spelling.
fn lines_for(form: &Form) -> Vec<String> {
    let choices: Vec<Vec<&str>> = form
        .operands
        .iter()
        .map(|&(set, slot)| spellings(set, slot))
        .collect();
    let suffix = match form.operands.first() {
        Some(&(set, Slot::Displacement(_))) if set.contains(ModeSet::REL8) => ".s".to_string(),
        Some(&(set, Slot::Displacement(_))) if set.contains(ModeSet::REL32) => ".l".to_string(),
        Some(&(_, Slot::Displacement(_))) => ".w".to_string(),
        _ => form
            .default_size
            .map(|s| format!(".{}", s.suffix()))
            .unwrap_or_default(),
    };
    if choices.is_empty() {
        return vec![form.name.clone()];
    }
    let mut lines = Vec::new();
    for (k, options) in choices.iter().enumerate() {
        for option in options {
            let operands: Vec<&str> = choices
                .iter()
                .enumerate()
                .map(|(j, c)| if j == k { *option } else { c[0] })
                .collect();
            lines.push(format!("{}{suffix} {}", form.name, operands.join(",")));
        }
    }
    lines.sort();
    lines.dedup();
    lines
}

#[test]
fn every_form_in_the_table() {
    let dec = M68000Decoder::new().unwrap();
    let mut checked = 0;
    for form in table().unwrap().forms() {
        for line in lines_for(form) {
            let bytes = asm(Cpu::M68020, &line);
            let decoded = dec
                .decode(&bytes, 0)
                .unwrap_or_else(|| panic!("`{line}` assembled to {bytes:02X?}, which did not decode"));
            assert_eq!(decoded.mnemonic, form.name, "`{line}`");
            assert_eq!(decoded.length as usize, bytes.len(), "length of `{line}`");
            let text = fmt_decoded(&decoded);
            assert_eq!(asm(Cpu::M68020, &text), bytes, "`{line}` printed as `{text}`");
            checked += 1;
        }
    }
    assert!(checked > table().unwrap().forms().len());
}
