use once_cell::sync::Lazy;

use crate::addressing::{AddressingMode, IndexRegister, ModeSet, Register, Size};
use crate::decoder::{read_be, sign_extend, Decoded, DecodedOperand, Decoder};
use crate::encoding::{Field, InstructionEncoding};
use crate::error::EncodingError;
use crate::instructions::{Form, InstructionTable, SizeCoding, Slot, CONDITIONS};

const SRC_EA: Slot = Slot::Ea {
    mode: Field::SourceMode,
    register: Field::SourceRegister,
};
const DST_EA: Slot = Slot::Ea {
    mode: Field::DestMode,
    register: Field::DestRegister,
};
const SRC_REG: Slot = Slot::Register(Field::SourceRegister);
const DST_REG: Slot = Slot::Register(Field::DestRegister);
const QUICK: Slot = Slot::Quick(Field::Quick);
const BRANCH: Slot = Slot::Displacement(Field::Displacement);
const MASK: Slot = Slot::RegisterMask(Field::RegisterMask);

const BWL: &[Size] = &[Size::Byte, Size::Word, Size::Long];
const WL: &[Size] = &[Size::Word, Size::Long];
const B: &[Size] = &[Size::Byte];
const W: &[Size] = &[Size::Word];
const L: &[Size] = &[Size::Long];
const NONE: &[Size] = &[];

const ALIASES: &[(&str, &[&str])] = &[
    ("move", &["movea"]),
    ("add", &["adda", "addi"]),
    ("sub", &["suba", "subi"]),
    ("cmp", &["cmpa", "cmpi", "cmpm"]),
    ("and", &["andi"]),
    ("or", &["ori"]),
    ("eor", &["eori"]),
    ("bhs", &["bcc"]),
    ("blo", &["bcs"]),
    ("dbra", &["dbf"]),
    ("dbhs", &["dbcc"]),
    ("dblo", &["dbcs"]),
    ("shs", &["scc"]),
    ("slo", &["scs"]),
];

/// Brief and full index extension words.
#[derive(Debug, Clone)]
pub struct ExtensionFormats {
    pub brief: InstructionEncoding,
    pub full: InstructionEncoding,
}

static TABLE: Lazy<Result<InstructionTable, EncodingError>> = Lazy::new(build);

static EXTENSIONS: Lazy<Result<ExtensionFormats, EncodingError>> = Lazy::new(|| {
    Ok(ExtensionFormats {
        brief: InstructionEncoding::of(&["iiiiwxx0dddddddd"])?,
        full: InstructionEncoding::of(&["iiiiwxx1BIzz0ooo"])?,
    })
});

/// The shared 68000/68020 instruction table.
pub fn table() -> Result<&'static InstructionTable, EncodingError> {
    TABLE.as_ref().map_err(Clone::clone)
}

pub fn extensions() -> Result<&'static ExtensionFormats, EncodingError> {
    EXTENSIONS.as_ref().map_err(Clone::clone)
}

struct Builder {
    forms: Vec<Form>,
}

impl Builder {
    fn add(
        &mut self,
        name: impl Into<String>,
        sizes: &[Size],
        size_coding: SizeCoding,
        operands: &[(ModeSet, Slot)],
        patterns: &[&str],
    ) -> Result<&mut Form, EncodingError> {
        let default_size = if sizes.contains(&Size::Word) {
            Some(Size::Word)
        } else {
            sizes.first().copied()
        };
        self.forms.push(Form {
            name: name.into(),
            sizes: sizes.to_vec(),
            default_size,
            size_coding,
            operands: operands.to_vec(),
            implied: Vec::new(),
            encoding: InstructionEncoding::of(patterns)?,
        });
        let last = self.forms.len() - 1;
        Ok(&mut self.forms[last])
    }

    fn fixed(&mut self, name: &str, pattern: &str) -> Result<(), EncodingError> {
        self.add(name, NONE, SizeCoding::Fixed, &[], &[pattern])?;
        Ok(())
    }
}

/// Canonical condition names; the aliases `hs`/`lo` are left out.
fn conditions() -> impl Iterator<Item = (&'static str, u8)> {
    CONDITIONS
        .iter()
        .copied()
        .filter(|(name, _)| *name != "hs" && *name != "lo")
}

fn build() -> Result<InstructionTable, EncodingError> {
    let mut b = Builder { forms: Vec::new() };
    data_movement(&mut b)?;
    arithmetic(&mut b)?;
    shifts_and_bits(&mut b)?;
    control(&mut b)?;
    Ok(InstructionTable::new(b.forms, ALIASES))
}

fn data_movement(b: &mut Builder) -> Result<(), EncodingError> {
    use SizeCoding::*;
    b.add("move", BWL, Move, &[(ModeSet::ALL, SRC_EA), (ModeSet::DATA_ALTERABLE, DST_EA)], &["00SSDDDMMMmmmsss"])?;
    b.add("move", W, Fixed, &[(ModeSet::SR, Slot::Implied), (ModeSet::DATA_ALTERABLE, SRC_EA)], &["0100000011mmmsss"])?;
    b.add("move", W, Fixed, &[(ModeSet::DATA, SRC_EA), (ModeSet::CCR, Slot::Implied)], &["0100010011mmmsss"])?;
    b.add("move", W, Fixed, &[(ModeSet::DATA, SRC_EA), (ModeSet::SR, Slot::Implied)], &["0100011011mmmsss"])?;
    b.add("move", L, Fixed, &[(ModeSet::AN, SRC_REG), (ModeSet::USP, Slot::Implied)], &["0100111001100sss"])?;
    b.add("move", L, Fixed, &[(ModeSet::USP, Slot::Implied), (ModeSet::AN, SRC_REG)], &["0100111001101sss"])?;
    b.add("movea", WL, Move, &[(ModeSet::ALL, SRC_EA), (ModeSet::AN, DST_REG)], &["00SSDDD001mmmsss"])?;
    b.add(
        "moveq",
        L,
        Fixed,
        &[(ModeSet::IMM, Slot::Data { field: Field::Quick, signed: true }), (ModeSet::DN, DST_REG)],
        &["0111DDD0qqqqqqqq"],
    )?;
    b.add(
        "movem",
        WL,
        Single,
        &[(ModeSet::REGISTERS, MASK), (ModeSet::CONTROL_ALTERABLE | ModeSet::PREDEC, SRC_EA)],
        &["010010001Smmmsss", "kkkkkkkkkkkkkkkk"],
    )?;
    b.add(
        "movem",
        WL,
        Single,
        &[(ModeSet::CONTROL | ModeSet::POSTINC, SRC_EA), (ModeSet::REGISTERS, MASK)],
        &["010011001Smmmsss", "kkkkkkkkkkkkkkkk"],
    )?;
    b.add("lea", L, Fixed, &[(ModeSet::CONTROL, SRC_EA), (ModeSet::AN, DST_REG)], &["0100DDD111mmmsss"])?;
    b.add("pea", L, Fixed, &[(ModeSet::CONTROL, SRC_EA)], &["0100100001mmmsss"])?;
    b.add("exg", L, Fixed, &[(ModeSet::DN, SRC_REG), (ModeSet::DN, DST_REG)], &["1100sss101000DDD"])?;
    b.add("exg", L, Fixed, &[(ModeSet::AN, SRC_REG), (ModeSet::AN, DST_REG)], &["1100sss101001DDD"])?;
    b.add("exg", L, Fixed, &[(ModeSet::DN, SRC_REG), (ModeSet::AN, DST_REG)], &["1100sss110001DDD"])?;
    b.add("exg", L, Fixed, &[(ModeSet::AN, DST_REG), (ModeSet::DN, SRC_REG)], &["1100sss110001DDD"])?;
    b.add("swap", W, Fixed, &[(ModeSet::DN, SRC_REG)], &["0100100001000sss"])?;
    b.add("ext", WL, Single, &[(ModeSet::DN, SRC_REG)], &["010010001S000sss"])?;
    b.add(
        "link",
        W,
        Fixed,
        &[(ModeSet::AN, SRC_REG), (ModeSet::IMM, Slot::Data { field: Field::Displacement, signed: true })],
        &["0100111001010sss", "dddddddddddddddd"],
    )?;
    b.add("unlk", NONE, Fixed, &[(ModeSet::AN, SRC_REG)], &["0100111001011sss"])?;
    // bit 7 picks the direction, bit 6 the size
    let based = Slot::Based(Field::SourceRegister);
    b.add("movep", WL, Single, &[(ModeSet::DISP, based), (ModeSet::DN, DST_REG)], &["0000DDD10S001sss"])?;
    b.add("movep", WL, Single, &[(ModeSet::DN, DST_REG), (ModeSet::DISP, based)], &["0000DDD11S001sss"])?;
    Ok(())
}

fn arithmetic(b: &mut Builder) -> Result<(), EncodingError> {
    use SizeCoding::*;
    let reg_to_ea = |dst: ModeSet| [(ModeSet::DN, SRC_REG), (dst, DST_EA)];
    let immediate = [(ModeSet::IMM, Slot::Immediate), (ModeSet::DATA_ALTERABLE, DST_EA)];

    // opcode nibble, <ea>,Dn source class, Dn,<ea> destination class
    for (name, top, source, dest) in [
        ("add", "1101", ModeSet::ALL, Some(ModeSet::MEMORY_ALTERABLE)),
        ("sub", "1001", ModeSet::ALL, Some(ModeSet::MEMORY_ALTERABLE)),
        ("cmp", "1011", ModeSet::ALL, None),
        ("and", "1100", ModeSet::DATA, Some(ModeSet::MEMORY_ALTERABLE)),
        ("or", "1000", ModeSet::DATA, Some(ModeSet::MEMORY_ALTERABLE)),
    ] {
        b.add(name, BWL, Standard, &[(source, SRC_EA), (ModeSet::DN, DST_REG)], &[format!("{top}DDD0SSmmmsss").as_str()])?;
        if let Some(dest) = dest {
            b.add(name, BWL, Standard, &reg_to_ea(dest), &[format!("{top}sss1SSMMMDDD").as_str()])?;
        }
    }
    b.add("eor", BWL, Standard, &reg_to_ea(ModeSet::DATA_ALTERABLE), &["1011sss1SSMMMDDD"])?;
    b.add("cmpm", BWL, Standard, &[(ModeSet::POSTINC, SRC_REG), (ModeSet::POSTINC, DST_REG)], &["1011DDD1SS001sss"])?;

    // register pair or predecrement pair, chosen by bit 3
    let pairs = [(ModeSet::DN, "0"), (ModeSet::PREDEC, "1")];
    for (name, top) in [("addx", "1101"), ("subx", "1001")] {
        for (set, rm) in pairs {
            b.add(name, BWL, Standard, &[(set, SRC_REG), (set, DST_REG)], &[format!("{top}DDD1SS00{rm}sss").as_str()])?;
        }
    }
    for (name, top) in [("abcd", "1100"), ("sbcd", "1000")] {
        for (set, rm) in pairs {
            b.add(name, B, Fixed, &[(set, SRC_REG), (set, DST_REG)], &[format!("{top}DDD100000{rm}sss").as_str()])?;
        }
    }

    for (name, top) in [("adda", "1101"), ("suba", "1001"), ("cmpa", "1011")] {
        b.add(name, WL, Single, &[(ModeSet::ALL, SRC_EA), (ModeSet::AN, DST_REG)], &[format!("{top}DDDS11mmmsss").as_str()])?;
    }

    for (name, code) in [
        ("ori", "0000"),
        ("andi", "0010"),
        ("subi", "0100"),
        ("addi", "0110"),
        ("eori", "1010"),
        ("cmpi", "1100"),
    ] {
        b.add(name, BWL, Standard, &immediate, &[format!("0000{code}SSMMMDDD").as_str()])?;
    }
    for (name, code) in [("ori", "0000"), ("andi", "0010"), ("eori", "1010")] {
        let byte = Slot::Data { field: Field::Quick, signed: false };
        b.add(
            name,
            B,
            Fixed,
            &[(ModeSet::IMM, byte), (ModeSet::CCR, Slot::Implied)],
            &[format!("0000{code}00111100").as_str(), "00000000qqqqqqqq"],
        )?;
        b.add(
            name,
            W,
            Fixed,
            &[(ModeSet::IMM, byte), (ModeSet::SR, Slot::Implied)],
            &[format!("0000{code}01111100").as_str(), "qqqqqqqqqqqqqqqq"],
        )?;
    }

    b.add("addq", BWL, Standard, &[(ModeSet::IMM, QUICK), (ModeSet::ALTERABLE, DST_EA)], &["0101qqq0SSMMMDDD"])?;
    b.add("subq", BWL, Standard, &[(ModeSet::IMM, QUICK), (ModeSet::ALTERABLE, DST_EA)], &["0101qqq1SSMMMDDD"])?;

    for (name, pattern) in [
        ("mulu", "1100DDD011mmmsss"),
        ("muls", "1100DDD111mmmsss"),
        ("divu", "1000DDD011mmmsss"),
        ("divs", "1000DDD111mmmsss"),
        ("chk", "0100DDD110mmmsss"),
    ] {
        b.add(name, W, Fixed, &[(ModeSet::DATA, SRC_EA), (ModeSet::DN, DST_REG)], &[pattern])?;
    }

    for (name, pattern) in [
        ("negx", "01000000SSmmmsss"),
        ("clr", "01000010SSmmmsss"),
        ("neg", "01000100SSmmmsss"),
        ("not", "01000110SSmmmsss"),
        ("tst", "01001010SSmmmsss"),
    ] {
        b.add(name, BWL, Standard, &[(ModeSet::DATA_ALTERABLE, SRC_EA)], &[pattern])?;
    }
    b.add("tas", B, Fixed, &[(ModeSet::DATA_ALTERABLE, SRC_EA)], &["0100101011mmmsss"])?;
    b.add("nbcd", B, Fixed, &[(ModeSet::DATA_ALTERABLE, SRC_EA)], &["0100100000mmmsss"])?;
    Ok(())
}

fn shifts_and_bits(b: &mut Builder) -> Result<(), EncodingError> {
    use SizeCoding::*;
    for (name, kind, left) in [
        ("asr", "00", 0),
        ("asl", "00", 1),
        ("lsr", "01", 0),
        ("lsl", "01", 1),
        ("roxr", "10", 0),
        ("roxl", "10", 1),
        ("ror", "11", 0),
        ("rol", "11", 1),
    ] {
        b.add(name, BWL, Standard, &[(ModeSet::IMM, QUICK), (ModeSet::DN, DST_REG)], &[format!("1110qqqrSS0{kind}DDD").as_str()])?
            .implied
            .push((Field::Direction, left));
        b.add(name, BWL, Standard, &[(ModeSet::DN, SRC_REG), (ModeSet::DN, DST_REG)], &[format!("1110sssrSS1{kind}DDD").as_str()])?
            .implied
            .push((Field::Direction, left));
        b.add(name, W, Fixed, &[(ModeSet::MEMORY_ALTERABLE, SRC_EA)], &[format!("11100{kind}r11mmmsss").as_str()])?
            .implied
            .push((Field::Direction, left));
    }

    let bit_number = Slot::Data { field: Field::Quick, signed: false };
    for (name, kind) in [("btst", "00"), ("bchg", "01"), ("bclr", "10"), ("bset", "11")] {
        let (dynamic_mem, static_mem) = if name == "btst" {
            (ModeSet::MEMORY, ModeSet::MEMORY & !ModeSet::IMM)
        } else {
            (ModeSet::MEMORY_ALTERABLE, ModeSet::MEMORY_ALTERABLE)
        };
        let dynamic = format!("0000sss1{kind}MMMDDD");
        let fixed = format!("00001000{kind}MMMDDD");
        b.add(name, L, Fixed, &[(ModeSet::DN, SRC_REG), (ModeSet::DN, DST_EA)], &[dynamic.as_str()])?;
        b.add(name, B, Fixed, &[(ModeSet::DN, SRC_REG), (dynamic_mem, DST_EA)], &[dynamic.as_str()])?;
        b.add(name, L, Fixed, &[(ModeSet::IMM, bit_number), (ModeSet::DN, DST_EA)], &[fixed.as_str(), "00000000qqqqqqqq"])?;
        b.add(name, B, Fixed, &[(ModeSet::IMM, bit_number), (static_mem, DST_EA)], &[fixed.as_str(), "00000000qqqqqqqq"])?;
    }
    Ok(())
}

fn control(b: &mut Builder) -> Result<(), EncodingError> {
    use SizeCoding::*;
    for (cond, code) in conditions() {
        let name = match code {
            0 => "bra".to_string(),
            1 => "bsr".to_string(),
            _ => format!("b{cond}"),
        };
        let code = code as i64;
        b.add(&name, NONE, Fixed, &[(ModeSet::REL8, BRANCH)], &["0110ccccdddddddd"])?
            .implied
            .push((Field::Condition, code));
        b.add(&name, NONE, Fixed, &[(ModeSet::REL16, BRANCH)], &["0110cccc00000000", "dddddddddddddddd"])?
            .implied
            .push((Field::Condition, code));
        b.add(
            &name,
            NONE,
            Fixed,
            &[(ModeSet::REL32, BRANCH)],
            &["0110cccc11111111", "dddddddddddddddddddddddddddddddd"],
        )?
        .implied
        .push((Field::Condition, code));
    }

    for (cond, code) in conditions() {
        b.add(
            format!("db{cond}"),
            NONE,
            Fixed,
            &[(ModeSet::DN, SRC_REG), (ModeSet::REL16, BRANCH)],
            &["0101cccc11001sss", "dddddddddddddddd"],
        )?
        .implied
        .push((Field::Condition, code as i64));
        b.add(format!("s{cond}"), B, Fixed, &[(ModeSet::DATA_ALTERABLE, SRC_EA)], &["0101cccc11mmmsss"])?
            .implied
            .push((Field::Condition, code as i64));
    }

    b.add("jmp", NONE, Fixed, &[(ModeSet::CONTROL, SRC_EA)], &["0100111011mmmsss"])?;
    b.add("jsr", NONE, Fixed, &[(ModeSet::CONTROL, SRC_EA)], &["0100111010mmmsss"])?;
    b.add(
        "trap",
        NONE,
        Fixed,
        &[(ModeSet::IMM, Slot::Data { field: Field::Vector, signed: false })],
        &["010011100100vvvv"],
    )?;
    b.add(
        "stop",
        NONE,
        Fixed,
        &[(ModeSet::IMM, Slot::Data { field: Field::Quick, signed: false })],
        &["0100111001110010", "qqqqqqqqqqqqqqqq"],
    )?;
    b.fixed("reset", "0100111001110000")?;
    b.fixed("nop", "0100111001110001")?;
    b.fixed("rte", "0100111001110011")?;
    b.fixed("rts", "0100111001110101")?;
    b.fixed("trapv", "0100111001110110")?;
    b.fixed("rtr", "0100111001110111")?;
    b.fixed("illegal", "0100101011111100")?;
    Ok(())
}

/// Table-driven decoder over the shared instruction table.
pub struct M68000Decoder {
    table: &'static InstructionTable,
    ext: &'static ExtensionFormats,
}

impl M68000Decoder {
    pub fn new() -> Result<Self, EncodingError> {
        Ok(Self {
            table: table()?,
            ext: extensions()?,
        })
    }

    fn try_form(&self, form: &Form, bytes: &[u8], address: u32) -> Option<Decoded> {
        let values = form.encoding.extract(bytes)?;
        if form.implied.iter().any(|&(f, v)| values.get(f) != Some(v)) {
            return None;
        }
        let size = if form.encoding.uses(Field::Size) {
            Some(form.size_coding.decode(values.get(Field::Size)?)?)
        } else {
            form.default_size
        };

        let mut pos = form.encoding.byte_len();
        let mut operands = Vec::with_capacity(form.operands.len());
        for &(set, slot) in &form.operands {
            let op = match slot {
                Slot::Ea { mode, register } => {
                    let ext_addr = address.wrapping_add(pos as u32);
                    let (op, used) = self.decode_ea(
                        values.get(mode)?,
                        values.get(register)? as u8,
                        bytes.get(pos..)?,
                        ext_addr,
                        size,
                    )?;
                    pos += used;
                    op
                }
                Slot::Register(field) => {
                    let n = values.get(field)? as u8;
                    let mode = if set.contains(ModeSet::DN) {
                        AddressingMode::DataRegisterDirect
                    } else if set.contains(ModeSet::PREDEC) {
                        AddressingMode::PreDecrement
                    } else if set.contains(ModeSet::POSTINC) {
                        AddressingMode::PostIncrement
                    } else {
                        AddressingMode::AddressRegisterDirect
                    };
                    let register = if mode == AddressingMode::DataRegisterDirect {
                        Register::Data(n)
                    } else {
                        Register::Address(n)
                    };
                    DecodedOperand::register(mode, register)
                }
                Slot::Based(field) => {
                    let mut op = DecodedOperand::register(
                        AddressingMode::Displacement,
                        Register::Address(values.get(field)? as u8),
                    );
                    op.value = Some(sign_extend(read_be(bytes, pos, 2)? as i64, 16));
                    pos += 2;
                    op
                }
                Slot::Quick(field) => {
                    let q = values.get(field)?;
                    DecodedOperand::value(AddressingMode::Immediate, if q == 0 { 8 } else { q })
                }
                Slot::Data { field, signed } => {
                    let v = values.get(field)?;
                    let v = if signed { sign_extend(v, form.encoding.width(field)) } else { v };
                    DecodedOperand::value(AddressingMode::Immediate, v)
                }
                Slot::Immediate => {
                    let (v, used) = read_immediate(bytes, pos, size?)?;
                    pos += used;
                    DecodedOperand::value(AddressingMode::Immediate, v)
                }
                Slot::Displacement(field) => {
                    let width = form.encoding.width(field);
                    let disp = sign_extend(values.get(field)?, width);
                    let mode = match width {
                        8 if disp == 0 || disp == -1 => return None,
                        8 => AddressingMode::Relative8,
                        16 => AddressingMode::Relative16,
                        _ => AddressingMode::Relative32,
                    };
                    DecodedOperand::value(mode, address as i64 + disp)
                }
                Slot::RegisterMask(field) => {
                    let mut op = DecodedOperand::new(AddressingMode::RegisterList);
                    op.mask = Some(values.get(field)? as u16);
                    op
                }
                Slot::Implied => {
                    let mode = if set.contains(ModeSet::SR) {
                        AddressingMode::StatusRegister
                    } else if set.contains(ModeSet::CCR) {
                        AddressingMode::ConditionCodeRegister
                    } else {
                        AddressingMode::UserStackPointer
                    };
                    DecodedOperand::new(mode)
                }
            };
            if !set.contains(op.mode.class()) {
                return None;
            }
            operands.push(op);
        }

        // predecrement lists are stored a7..d0
        if operands.iter().any(|o| o.mode == AddressingMode::PreDecrement) {
            for op in &mut operands {
                if let Some(mask) = op.mask.as_mut() {
                    *mask = mask.reverse_bits();
                }
            }
        }

        Some(Decoded {
            mnemonic: form.name.clone(),
            size,
            show_size: form.shows_size(),
            operands,
            length: pos as u32,
        })
    }

    /// One effective address; returns the operand and extension bytes used.
    fn decode_ea(
        &self,
        mode: i64,
        reg: u8,
        ext: &[u8],
        ext_addr: u32,
        size: Option<Size>,
    ) -> Option<(DecodedOperand, usize)> {
        use AddressingMode::*;
        let an = Register::Address(reg);
        Some(match (mode, reg) {
            (0, _) => (DecodedOperand::register(DataRegisterDirect, Register::Data(reg)), 0),
            (1, _) => (DecodedOperand::register(AddressRegisterDirect, an), 0),
            (2, _) => (DecodedOperand::register(AddressRegisterIndirect, an), 0),
            (3, _) => (DecodedOperand::register(PostIncrement, an), 0),
            (4, _) => (DecodedOperand::register(PreDecrement, an), 0),
            (5, _) => {
                let mut op = DecodedOperand::register(Displacement, an);
                op.value = Some(sign_extend(read_be(ext, 0, 2)? as i64, 16));
                (op, 2)
            }
            (6, _) => self.decode_indexed(ext, ext_addr, Some(an))?,
            (7, 0) => (DecodedOperand::value(AbsoluteShort, sign_extend(read_be(ext, 0, 2)? as i64, 16)), 2),
            (7, 1) => (DecodedOperand::value(AbsoluteLong, read_be(ext, 0, 4)? as i64), 4),
            (7, 2) => {
                let disp = sign_extend(read_be(ext, 0, 2)? as i64, 16);
                let mut op = DecodedOperand::register(PcDisplacement, Register::Pc);
                op.value = Some(ext_addr as i64 + disp);
                (op, 2)
            }
            (7, 3) => self.decode_indexed(ext, ext_addr, None)?,
            (7, 4) => {
                let (v, used) = read_immediate(ext, 0, size?)?;
                (DecodedOperand::value(Immediate, v), used)
            }
            _ => return None,
        })
    }

    /// Brief or full extension word; `base` is `None` for the PC forms.
    fn decode_indexed(&self, ext: &[u8], ext_addr: u32, base: Option<Register>) -> Option<(DecodedOperand, usize)> {
        use AddressingMode::*;
        let pc = base.is_none();
        let relative = |disp: i64| if pc { ext_addr as i64 + disp } else { disp };

        if let Some(v) = self.ext.brief.extract(ext) {
            let mut op = DecodedOperand::register(if pc { PcIndex8 } else { Index8 }, base.unwrap_or(Register::Pc));
            op.index = Some(index_register(v.get(Field::IndexRegister)?, v.get(Field::IndexSize)?, v.get(Field::Scale)?));
            op.value = Some(relative(sign_extend(v.get(Field::Displacement)?, 8)));
            return Some((op, 2));
        }

        let v = self.ext.full.extract(ext)?;
        if v.get(Field::BaseSuppress)? != 0 {
            return None;
        }
        let (bd, bd_len) = match v.get(Field::BaseDisplacementSize)? {
            1 => (0, 0),
            2 => (sign_extend(read_be(ext, 2, 2)? as i64, 16), 2),
            3 => (sign_extend(read_be(ext, 2, 4)? as i64, 32), 4),
            _ => return None,
        };
        let mut used = 2 + bd_len;

        let suppressed = v.get(Field::IndexSuppress)? != 0;
        let select = v.get(Field::IndirectSelect)?;
        let mode = match (suppressed, select) {
            (false, 0) => {
                if pc {
                    PcIndex
                } else {
                    Index
                }
            }
            (false, 1..=3) => {
                if pc {
                    PcMemoryIndirectPreIndexed
                } else {
                    MemoryIndirectPreIndexed
                }
            }
            (false, 5..=7) | (true, 1..=3) => {
                if pc {
                    PcMemoryIndirectPostIndexed
                } else {
                    MemoryIndirectPostIndexed
                }
            }
            _ => return None,
        };
        let outer = match select & 3 {
            2 => {
                let od = sign_extend(read_be(ext, used, 2)? as i64, 16);
                used += 2;
                Some(od)
            }
            3 => {
                let od = sign_extend(read_be(ext, used, 4)? as i64, 32);
                used += 4;
                Some(od)
            }
            _ => None,
        };

        let mut op = DecodedOperand::register(mode, base.unwrap_or(Register::Pc));
        op.value = Some(relative(bd));
        op.outer = if mode == Index || mode == PcIndex { None } else { Some(outer.unwrap_or(0)) };
        if !suppressed {
            op.index = Some(index_register(v.get(Field::IndexRegister)?, v.get(Field::IndexSize)?, v.get(Field::Scale)?));
        }
        Some((op, used))
    }
}

fn index_register(number: i64, long: i64, scale: i64) -> IndexRegister {
    IndexRegister {
        register: Register::from_mask_bit(number as u8),
        size: if long != 0 { Size::Long } else { Size::Word },
        scale: 1 << scale,
    }
}

fn read_immediate(bytes: &[u8], pos: usize, size: Size) -> Option<(i64, usize)> {
    Some(match size {
        Size::Byte => ((read_be(bytes, pos, 2)? & 0xFF) as i64, 2),
        Size::Word => (read_be(bytes, pos, 2)? as i64, 2),
        Size::Long => (read_be(bytes, pos, 4)? as i64, 4),
    })
}

impl Decoder for M68000Decoder {
    fn decode(&self, bytes: &[u8], address: u32) -> Option<Decoded> {
        self.table
            .decode_order()
            .find_map(|(_, form)| self.try_form(form, bytes, address))
    }
}
