use m68k_asm::encoding::{Field, FieldValues, InstructionEncoding};
use m68k_asm::EncodingError;
use pretty_assertions::assert_eq;

#[test]
fn register_field_in_the_middle() {
    let enc = InstructionEncoding::of(&["11110sss10010001"]).unwrap();
    assert_eq!(enc.apply(|_| Some(5)).unwrap(), vec![0xF5, 0x91]);
    assert_eq!(enc.width(Field::SourceRegister), 3);
    assert_eq!(enc.fixed_bits(), (0xF8FF, 0xF091));
}

#[test]
fn interleaved_field_keeps_bit_order() {
    // value bit k lands on the k-th `s` counted from the right
    let enc = InstructionEncoding::of(&["0s0s0s0s0s0s0s0s"]).unwrap();
    assert_eq!(enc.apply(|_| Some(0xFF)).unwrap(), vec![0x55, 0x55]);
    assert_eq!(enc.apply(|_| Some(0x0F)).unwrap(), vec![0x00, 0x55]);
    assert_eq!(enc.apply(|_| Some(0x81)).unwrap(), vec![0x40, 0x01]);
}

#[test]
fn values_wider_than_the_field_are_truncated() {
    let enc = InstructionEncoding::of(&["0111DDD0qqqqqqqq"]).unwrap();
    let mut values = FieldValues::new();
    values.set(Field::DestRegister, 9).set(Field::Quick, -1);
    assert_eq!(enc.apply_values(&values).unwrap(), vec![0x72, 0xFF]);
}

#[test]
fn slices_are_emitted_most_significant_first() {
    let enc = InstructionEncoding::of(&["0100111001010sss", "dddddddddddddddd"]).unwrap();
    assert_eq!(enc.byte_len(), 4);
    let bytes = enc
        .apply(|f| match f {
            Field::SourceRegister => Some(6),
            Field::Displacement => Some(-8),
            _ => None,
        })
        .unwrap();
    assert_eq!(bytes, vec![0x4E, 0x56, 0xFF, 0xF8]);

    let back = enc.extract(&bytes).unwrap();
    assert_eq!(back.get(Field::SourceRegister), Some(6));
    assert_eq!(back.get(Field::Displacement), Some(0xFFF8));
}

#[test]
fn thirty_two_bit_slice() {
    let enc = InstructionEncoding::of(&["0110000011111111", &"d".repeat(32)]).unwrap();
    let bytes = enc.apply(|_| Some(0x0001_0002)).unwrap();
    assert_eq!(bytes, vec![0x60, 0xFF, 0x00, 0x01, 0x00, 0x02]);
}

#[test]
fn missing_field_names_the_field() {
    let enc = InstructionEncoding::of(&["0101qqq0SSMMMDDD"]).unwrap();
    let err = enc.apply(|f| (f != Field::Size).then_some(0)).unwrap_err();
    assert_eq!(err, EncodingError::MissingField(Field::Size));
    assert_eq!(
        err.to_string(),
        "field Size is required by the encoding but was not supplied"
    );
}

#[test]
fn every_value_lands_on_its_own_bits() {
    for (width, at) in [(1, 0), (3, 0), (3, 9), (4, 4), (8, 0), (8, 8), (12, 2), (16, 0)] {
        let field_mask = (((1u32 << width) - 1) << at) as u16;
        for fill in ['0', '1'] {
            let pattern: String = (0..16)
                .rev()
                .map(|bit| if field_mask & (1 << bit) != 0 { 'q' } else { fill })
                .collect();
            let rest = if fill == '1' { !field_mask } else { 0 };
            let enc = InstructionEncoding::of(&[pattern.as_str()]).unwrap();
            assert_eq!(enc.width(Field::Quick), width);
            for v in 0..(1i64 << width) {
                let bytes = enc.apply(|_| Some(v)).unwrap();
                let word = u16::from_be_bytes([bytes[0], bytes[1]]);
                assert_eq!(word, ((v as u32) << at) as u16 | rest, "{pattern} with {v:#x}");
                assert_eq!(enc.extract(&bytes).unwrap().get(Field::Quick), Some(v));
            }
        }
    }
}
