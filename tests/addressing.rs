use m68k_asm::{assemble, AssemblerConfig, CompilationUnit, Compiler, Cpu};
use pretty_assertions::assert_eq;

fn asm_for(cpu: Cpu, source: &str) -> Vec<u8> {
    let mut compiler = Compiler::new(AssemblerConfig {
        cpu,
        ..AssemblerConfig::default()
    });
    let messages = compiler.compile(&CompilationUnit::new("t.s", source));
    let errors: Vec<String> = messages.iter().map(|m| m.render("t.s", source)).collect();
    assert!(!messages.has_errors(), "{errors:?}");
    compiler.bytes()
}

fn asm(source: &str) -> Vec<u8> {
    asm_for(Cpu::M68000, source)
}

#[test]
fn absolute_addresses_pick_the_short_form_when_they_fit() {
    assert_eq!(asm("jmp $1234"), vec![0x4E, 0xF8, 0x12, 0x34]);
    assert_eq!(asm("jmp $12345"), vec![0x4E, 0xF9, 0x00, 0x01, 0x23, 0x45]);
    // sign-extended short addresses reach the top of memory
    assert_eq!(asm("jmp $ffff8000"), vec![0x4E, 0xF8, 0x80, 0x00]);
    assert_eq!(asm("jmp $8000"), vec![0x4E, 0xF9, 0x00, 0x00, 0x80, 0x00]);
}

#[test]
fn explicit_absolute_size_is_kept() {
    assert_eq!(asm("jmp ($1234).l"), vec![0x4E, 0xF9, 0x00, 0x00, 0x12, 0x34]);
    assert_eq!(asm("pea ($1234).w"), vec![0x48, 0x78, 0x12, 0x34]);
}

#[test]
fn label_address_shrinks_with_its_reference() {
    assert_eq!(
        asm(" move.w data,d0\ndata: dc.w 1\n"),
        vec![0x30, 0x38, 0x00, 0x04, 0x00, 0x01]
    );
}

#[test]
fn indexed_with_small_displacement_uses_brief_word() {
    assert_eq!(asm("tst.w 4(a0,d1.l)"), vec![0x4A, 0x70, 0x18, 0x04]);
    assert_eq!(asm("tst.w (a0,d1.l)"), vec![0x4A, 0x70, 0x18, 0x00]);
    assert_eq!(asm("tst.w -2(a3,a2.w)"), vec![0x4A, 0x73, 0xA0, 0xFE]);
}

#[test]
fn large_index_displacement_needs_68020() {
    assert!(assemble("tst.w $1000(a0,d1.l)").is_err());
    assert_eq!(
        asm_for(Cpu::M68020, "tst.w $1000(a0,d1.l)"),
        vec![0x4A, 0x70, 0x19, 0x30, 0x00, 0x00, 0x10, 0x00]
    );
}

#[test]
fn scaled_index_on_68020() {
    assert!(assemble("tst.w 4(a0,d1.l*4)").is_err());
    assert_eq!(
        asm_for(Cpu::M68020, "tst.w 4(a0,d1.l*4)"),
        vec![0x4A, 0x70, 0x1C, 0x04]
    );
}

#[test]
fn pc_relative_displacement_is_from_the_extension_word() {
    assert_eq!(
        asm(" lea data(pc),a0\n nop\ndata: dc.w 0\n"),
        vec![0x41, 0xFA, 0x00, 0x04, 0x4E, 0x71, 0x00, 0x00]
    );
}

#[test]
fn pc_indexed_shrinks_to_brief_word() {
    // target 8, extension word at 2
    assert_eq!(asm("jmp 8(pc,d0.w)"), vec![0x4E, 0xFB, 0x00, 0x06]);
}

#[test]
fn memory_indirect_post_indexed() {
    assert!(assemble("tst.l ([8,a0],d0.w,12)").is_err());
    assert_eq!(
        asm_for(Cpu::M68020, "tst.l ([8,a0],d0.w,12)"),
        vec![
            0x4A, 0xB0, 0x01, 0x37, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x0C
        ]
    );
}

#[test]
fn status_register_operands() {
    assert_eq!(asm("move sr,d0"), vec![0x40, 0xC0]);
    assert_eq!(asm("move.w #$2700,sr"), vec![0x46, 0xFC, 0x27, 0x00]);
    assert_eq!(asm("ori #$1f,ccr"), vec![0x00, 0x3C, 0x00, 0x1F]);
    assert_eq!(asm("move.l a0,usp"), vec![0x4E, 0x60]);
}
