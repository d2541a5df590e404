use m68k_asm::{assemble, AssembleError};
use pretty_assertions::assert_eq;

fn asm(source: &str) -> Vec<u8> {
    match assemble(source) {
        Ok(bytes) => bytes,
        Err(AssembleError::Failed(messages)) => {
            let text: Vec<String> = messages.iter().map(|m| m.render("t.s", source)).collect();
            panic!("`{source}` failed:\n{}", text.join("\n"))
        }
    }
}

#[test]
fn move_sizes() {
    assert_eq!(asm("move.b d0,d1"), vec![0x12, 0x00]);
    assert_eq!(asm("move.w d0,d1"), vec![0x32, 0x00]);
    assert_eq!(asm("move.l d0,d1"), vec![0x22, 0x00]);
    // no suffix means word
    assert_eq!(asm("move d0,d1"), vec![0x32, 0x00]);
}

#[test]
fn single_word_instructions() {
    assert_eq!(asm("nop\nrts\n"), vec![0x4E, 0x71, 0x4E, 0x75]);
    assert_eq!(asm("moveq #-1,d0"), vec![0x70, 0xFF]);
    assert_eq!(asm("addq.w #8,d0"), vec![0x50, 0x40]);
    assert_eq!(asm("clr.l -(a7)"), vec![0x42, 0xA7]);
    assert_eq!(asm("clr.l -(sp)"), vec![0x42, 0xA7]);
    assert_eq!(asm("lsl.w #3,d0"), vec![0xE7, 0x48]);
}

#[test]
fn extension_words() {
    assert_eq!(
        asm("move.l #$12345678,d0"),
        vec![0x20, 0x3C, 0x12, 0x34, 0x56, 0x78]
    );
    assert_eq!(asm("lea 4(a0),a1"), vec![0x43, 0xE8, 0x00, 0x04]);
    assert_eq!(asm("move.b #$ff,d0"), vec![0x10, 0x3C, 0x00, 0xFF]);
    assert_eq!(asm("link a6,#-8"), vec![0x4E, 0x56, 0xFF, 0xF8]);
}

#[test]
fn add_with_immediate_to_memory_selects_addi() {
    assert_eq!(asm("add.w #1,(a0)"), vec![0x06, 0x50, 0x00, 0x01]);
}

#[test]
fn movem_masks() {
    // predecrement lists registers from a7 down
    assert_eq!(asm("movem.l d0-d1/a6,-(sp)"), vec![0x48, 0xE7, 0xC0, 0x02]);
    assert_eq!(asm("movem.w (a7)+,d0-d1"), vec![0x4C, 0x9F, 0x00, 0x03]);
}

#[test]
fn comments_and_blank_lines() {
    let source = "; header\n\n  nop ; trailing\n\n  rts\n";
    assert_eq!(asm(source), vec![0x4E, 0x71, 0x4E, 0x75]);
}

#[test]
fn empty_source_assembles_to_nothing() {
    assert_eq!(asm(""), Vec::<u8>::new());
}

#[test]
fn extended_arithmetic_and_bcd() {
    assert_eq!(asm("addx.l d1,d2"), vec![0xD5, 0x81]);
    assert_eq!(asm("addx.w -(a1),-(a2)"), vec![0xD5, 0x49]);
    assert_eq!(asm("subx.b d0,d1"), vec![0x93, 0x00]);
    assert_eq!(asm("abcd d0,d1"), vec![0xC3, 0x00]);
    assert_eq!(asm("sbcd -(a0),-(a1)"), vec![0x83, 0x08]);
    assert_eq!(asm("nbcd d0"), vec![0x48, 0x00]);
}

#[test]
fn cmpm_and_its_cmp_spelling() {
    assert_eq!(asm("cmpm.b (a0)+,(a1)+"), vec![0xB3, 0x08]);
    assert_eq!(asm("cmp.w (a0)+,(a1)+"), vec![0xB3, 0x48]);
}

#[test]
fn movep_both_directions() {
    assert_eq!(asm("movep.w 8(a0),d1"), vec![0x03, 0x08, 0x00, 0x08]);
    assert_eq!(asm("movep.l d2,-4(a1)"), vec![0x05, 0xC9, 0xFF, 0xFC]);
}
