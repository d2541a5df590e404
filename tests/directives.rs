use m68k_asm::{assemble, AssemblerConfig, CompilationUnit, Compiler, Level};
use pretty_assertions::assert_eq;

fn compile(source: &str, config: AssemblerConfig) -> (Compiler, Vec<(Level, String)>) {
    let mut compiler = Compiler::new(config);
    let messages = compiler.compile(&CompilationUnit::new("t.s", source));
    let texts = messages.iter().map(|m| (m.level, m.text.clone())).collect();
    (compiler, texts)
}

fn asm(source: &str) -> Vec<u8> {
    match assemble(source) {
        Ok(bytes) => bytes,
        Err(e) => panic!("`{source}`: {e}"),
    }
}

#[test]
fn dc_sizes_and_strings() {
    assert_eq!(asm("dc.b 1,2,\"hi\""), vec![1, 2, b'h', b'i']);
    assert_eq!(asm("dc.w $1234,-1"), vec![0x12, 0x34, 0xFF, 0xFF]);
    assert_eq!(asm("dc.l 1"), vec![0, 0, 0, 1]);
    // unsized dc is word-sized
    assert_eq!(asm("dc 7"), vec![0, 7]);
}

#[test]
fn dc_value_out_of_range() {
    let (_, messages) = compile("dc.b 300", AssemblerConfig::default());
    assert_eq!(
        messages,
        vec![(Level::Error, "value 300 does not fit in .b".to_string())]
    );
}

#[test]
fn ds_reserves_zeroed_space() {
    assert_eq!(asm("ds.w 2\nnop"), vec![0, 0, 0, 0, 0x4E, 0x71]);
    assert_eq!(asm("ds.l 1"), vec![0, 0, 0, 0]);
}

#[test]
fn ds_zero_warns() {
    let (compiler, messages) = compile("ds.b 0\nnop", AssemblerConfig::default());
    assert_eq!(
        messages,
        vec![(Level::Warn, "`ds` with a zero count has no effect".to_string())]
    );
    assert_eq!(compiler.bytes(), vec![0x4E, 0x71]);
}

#[test]
fn even_aligns_after_odd_data() {
    assert_eq!(asm("dc.b 1\neven\nnop"), vec![1, 0, 0x4E, 0x71]);
}

#[test]
fn even_at_even_address_warns() {
    let (compiler, messages) = compile("nop\neven\nrts", AssemblerConfig::default());
    assert_eq!(
        messages,
        vec![(Level::Warn, "`even` at an even address has no effect".to_string())]
    );
    assert_eq!(compiler.bytes(), vec![0x4E, 0x71, 0x4E, 0x75]);
}

#[test]
fn org_starts_a_new_buffer() {
    let (compiler, messages) = compile("org $100\nnop", AssemblerConfig::default());
    assert!(messages.is_empty());
    assert_eq!(compiler.bytes(), vec![0x4E, 0x71]);
    let starts: Vec<u32> = compiler.buffers().map(|b| b.start_offset).collect();
    assert_eq!(starts, vec![0x100]);

    let padded = AssemblerConfig {
        pad_leading_gap: true,
        ..AssemblerConfig::default()
    };
    let (compiler, _) = compile("org $100\nnop", padded);
    let bytes = compiler.bytes();
    assert_eq!(bytes.len(), 0x102);
    assert!(bytes[..0x100].iter().all(|&b| b == 0));
}

#[test]
fn gaps_between_buffers_are_zero_filled() {
    let bytes = asm("nop\norg $10\nrts");
    assert_eq!(bytes.len(), 0x12);
    assert_eq!(&bytes[..2], &[0x4E, 0x71]);
    assert!(bytes[2..0x10].iter().all(|&b| b == 0));
    assert_eq!(&bytes[0x10..], &[0x4E, 0x75]);
}

#[test]
fn org_backwards_is_an_error() {
    let (compiler, messages) = compile("org $10\nnop\norg 0\nnop", AssemblerConfig::default());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Level::Error);
    assert!(compiler.bytes().is_empty());
}

#[test]
fn label_on_org_takes_the_new_address() {
    assert_eq!(
        asm("here: org $40\n nop\n jmp here\n"),
        vec![0x4E, 0x71, 0x4E, 0xF8, 0x00, 0x40]
    );
}

#[test]
fn origin_from_config() {
    let config = AssemblerConfig {
        origin: 0x1000,
        ..AssemblerConfig::default()
    };
    let (compiler, messages) = compile("start: nop\n jmp start", config);
    assert!(messages.is_empty());
    assert_eq!(compiler.bytes(), vec![0x4E, 0x71, 0x4E, 0xF8, 0x10, 0x00]);
    let start = compiler.symbols().and_then(|s| s.lookup(s.global(), "start"));
    assert_eq!(start.and_then(|s| s.value), Some(0x1000));
}

#[test]
fn output_stops_at_the_top_of_the_address_space() {
    let (_, messages) = compile("org $fffffffe\ndc.b 1,2,3,4\nlab: dc.b 5\n", AssemblerConfig::default());
    assert_eq!(
        messages,
        vec![(
            Level::Error,
            "writing 4 byte(s) at 0xfffffffe runs past the end of the address space".to_string()
        )]
    );

    let (_, messages) = compile("org $fffffff0\nds.b $20\n", AssemblerConfig::default());
    assert_eq!(
        messages,
        vec![(
            Level::Error,
            "writing 32 byte(s) at 0xfffffff0 runs past the end of the address space".to_string()
        )]
    );

    let mut expected = vec![0; 14];
    expected.push(9);
    assert_eq!(asm("org $fffffff0\nds.b 14\ndc.b 9"), expected);
}
