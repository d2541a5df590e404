use crate::addressing::{fits_absolute_short, AddressingMode, Register};
use crate::decoder::{Decoded, DecodedOperand};
use crate::instructions::{branch_kind, BranchKind};

/// Canonical assembly text for a decoded instruction; it reassembles to the same bytes.
pub fn fmt_decoded(d: &Decoded) -> String {
    let mut text = d.mnemonic.clone();
    if branch_kind(&d.mnemonic) == Some(BranchKind::Bcc) {
        match d.operands.first().map(|o| o.mode) {
            Some(AddressingMode::Relative8) => text.push_str(".s"),
            Some(AddressingMode::Relative16) => text.push_str(".w"),
            Some(AddressingMode::Relative32) => text.push_str(".l"),
            _ => {}
        }
    } else if let (true, Some(size)) = (d.show_size, d.size) {
        text.push('.');
        text.push_str(size.suffix());
    }

    let operands: Vec<String> = d.operands.iter().map(fmt_operand).collect();
    if !operands.is_empty() {
        text.push(' ');
        text.push_str(&operands.join(","));
    }
    text
}

pub fn fmt_operand(op: &DecodedOperand) -> String {
    use AddressingMode::*;
    let reg = op.register.unwrap_or(Register::Pc);
    let value = op.value.unwrap_or(0);
    let index = op.index.map(|x| x.to_string());
    match op.mode {
        DataRegisterDirect | AddressRegisterDirect => reg.to_string(),
        AddressRegisterIndirect => format!("({reg})"),
        PostIncrement => format!("({reg})+"),
        PreDecrement => format!("-({reg})"),
        Displacement | PcDisplacement => format!("{}({reg})", hex(value)),
        Index8 | PcIndex8 => format!("{}({reg},{})", hex(value), index.unwrap_or_default()),
        Index | PcIndex => format!("({},{reg},{})", hex(value), index.unwrap_or_default()),
        MemoryIndirectPostIndexed | PcMemoryIndirectPostIndexed => {
            let outer = hex(op.outer.unwrap_or(0));
            match index {
                Some(x) => format!("([{},{reg}],{x},{outer})", hex(value)),
                None => format!("([{},{reg}],{outer})", hex(value)),
            }
        }
        MemoryIndirectPreIndexed | PcMemoryIndirectPreIndexed => format!(
            "([{},{reg},{}],{})",
            hex(value),
            index.unwrap_or_default(),
            hex(op.outer.unwrap_or(0))
        ),
        AbsoluteShort => format!("(${:x}).w", value as u32),
        // keep a short-capable address long on reassembly
        AbsoluteLong if fits_absolute_short(value) => format!("(${:x}).l", value as u32),
        AbsoluteLong => format!("${:x}", value as u32),
        Immediate => format!("#{}", hex(value)),
        Relative8 | Relative16 | Relative32 => format!("${:x}", value as u32),
        RegisterList => fmt_mask(op.mask.unwrap_or(0)),
        StatusRegister => "sr".into(),
        ConditionCodeRegister => "ccr".into(),
        UserStackPointer => "usp".into(),
    }
}

fn hex(v: i64) -> String {
    if v < 0 {
        format!("-${:x}", v.unsigned_abs())
    } else {
        format!("${v:x}")
    }
}

/// `d0-d3/a0` style list; ranges never cross from data to address registers.
pub fn fmt_mask(mask: u16) -> String {
    let mut parts = Vec::new();
    let mut bit = 0u8;
    while bit < 16 {
        if mask & (1 << bit) == 0 {
            bit += 1;
            continue;
        }
        let start = bit;
        while bit + 1 < 16 && (bit + 1) % 8 != 0 && mask & (1 << (bit + 1)) != 0 {
            bit += 1;
        }
        let first = Register::from_mask_bit(start);
        if bit == start {
            parts.push(first.to_string());
        } else {
            parts.push(format!("{first}-{}", Register::from_mask_bit(bit)));
        }
        bit += 1;
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{IndexRegister, Size};

    #[test]
    fn masks() {
        assert_eq!(fmt_mask(0x000F), "d0-d3");
        assert_eq!(fmt_mask(0x0101), "d0/a0");
        assert_eq!(fmt_mask(0x0180), "d7/a0");
        assert_eq!(fmt_mask(0xC005), "d0/d2/a6-a7");
    }

    #[test]
    fn operand_text() {
        let mut op = DecodedOperand::register(AddressingMode::Index8, Register::Address(2));
        op.value = Some(-4);
        op.index = Some(IndexRegister {
            register: Register::Data(1),
            size: Size::Long,
            scale: 4,
        });
        assert_eq!(fmt_operand(&op), "-$4(a2,d1.l*4)");
        assert_eq!(
            fmt_operand(&DecodedOperand::value(AddressingMode::AbsoluteShort, -2)),
            "($fffffffe).w"
        );
        assert_eq!(
            fmt_operand(&DecodedOperand::value(AddressingMode::AbsoluteLong, 0x400)),
            "($400).l"
        );
    }

    #[test]
    fn branch_suffix_comes_from_mode() {
        let d = Decoded {
            mnemonic: "bne".into(),
            size: None,
            show_size: false,
            operands: vec![DecodedOperand::value(AddressingMode::Relative8, 0x20)],
            length: 2,
        };
        assert_eq!(fmt_decoded(&d), "bne.s $20");
    }
}
