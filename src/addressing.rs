use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Operation size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "b" => Some(Size::Byte),
            "w" => Some(Size::Word),
            "l" => Some(Size::Long),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Size::Byte => "b",
            Size::Word => "w",
            Size::Long => "l",
        }
    }

    pub fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }

    /// Accepts both signed and unsigned spellings of an immediate.
    pub fn holds(self, value: i64) -> bool {
        match self {
            Size::Byte => (-0x80..=0xFF).contains(&value),
            Size::Word => (-0x8000..=0xFFFF).contains(&value),
            Size::Long => (-0x8000_0000..=0xFFFF_FFFF).contains(&value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Data(u8),
    Address(u8),
    Pc,
    Sr,
    Ccr,
    Usp,
}

impl Register {
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "sp" => return Some(Register::Address(7)),
            "pc" => return Some(Register::Pc),
            "sr" => return Some(Register::Sr),
            "ccr" => return Some(Register::Ccr),
            "usp" => return Some(Register::Usp),
            _ => {}
        }
        let mut chars = lower.chars();
        let kind = chars.next()?;
        let digit = chars.next()?.to_digit(10)?;
        if chars.next().is_some() || digit > 7 {
            return None;
        }
        match kind {
            'd' => Some(Register::Data(digit as u8)),
            'a' => Some(Register::Address(digit as u8)),
            _ => None,
        }
    }

    /// Register field value; address registers and data registers share 0..7.
    pub fn number(self) -> u8 {
        match self {
            Register::Data(n) | Register::Address(n) => n,
            _ => 0,
        }
    }

    /// Position in a MOVEM mask (d0 = 0 .. a7 = 15).
    pub fn mask_bit(self) -> Option<u8> {
        match self {
            Register::Data(n) => Some(n),
            Register::Address(n) => Some(8 + n),
            _ => None,
        }
    }

    pub fn from_mask_bit(bit: u8) -> Self {
        if bit < 8 {
            Register::Data(bit)
        } else {
            Register::Address(bit - 8)
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Data(n) => write!(f, "d{n}"),
            Register::Address(n) => write!(f, "a{n}"),
            Register::Pc => f.write_str("pc"),
            Register::Sr => f.write_str("sr"),
            Register::Ccr => f.write_str("ccr"),
            Register::Usp => f.write_str("usp"),
        }
    }
}

/// Xn.size*scale inside an indexed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRegister {
    pub register: Register,
    pub size: Size,
    pub scale: u8,
}

impl IndexRegister {
    /// D/A bit plus register number, as used by extension words.
    pub fn field(&self) -> i64 {
        self.register.mask_bit().unwrap_or(0) as i64
    }

    pub fn scale_field(&self) -> i64 {
        match self.scale {
            2 => 1,
            4 => 2,
            8 => 3,
            _ => 0,
        }
    }
}

impl fmt::Display for IndexRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.register, self.size.suffix())?;
        if self.scale != 1 {
            write!(f, "*{}", self.scale)?;
        }
        Ok(())
    }
}

bitflags! {
    /// Operand classes an instruction accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeSet: u32 {
        const DN = 1 << 0;
        const AN = 1 << 1;
        const IND = 1 << 2;
        const POSTINC = 1 << 3;
        const PREDEC = 1 << 4;
        const DISP = 1 << 5;
        const INDEX = 1 << 6;
        const ABS = 1 << 7;
        const PC_DISP = 1 << 8;
        const PC_INDEX = 1 << 9;
        const IMM = 1 << 10;
        const REL8 = 1 << 11;
        const REL16 = 1 << 12;
        const REL32 = 1 << 13;
        const REGLIST = 1 << 14;
        const SR = 1 << 15;
        const CCR = 1 << 16;
        const USP = 1 << 17;

        const ALL = Self::DN.bits() | Self::AN.bits() | Self::IND.bits() | Self::POSTINC.bits()
            | Self::PREDEC.bits() | Self::DISP.bits() | Self::INDEX.bits() | Self::ABS.bits()
            | Self::PC_DISP.bits() | Self::PC_INDEX.bits() | Self::IMM.bits();
        const DATA = Self::ALL.bits() & !Self::AN.bits();
        const MEMORY = Self::DATA.bits() & !Self::DN.bits();
        const CONTROL = Self::IND.bits() | Self::DISP.bits() | Self::INDEX.bits() | Self::ABS.bits()
            | Self::PC_DISP.bits() | Self::PC_INDEX.bits();
        const ALTERABLE = Self::DN.bits() | Self::AN.bits() | Self::IND.bits() | Self::POSTINC.bits()
            | Self::PREDEC.bits() | Self::DISP.bits() | Self::INDEX.bits() | Self::ABS.bits();
        const DATA_ALTERABLE = Self::ALTERABLE.bits() & !Self::AN.bits();
        const MEMORY_ALTERABLE = Self::DATA_ALTERABLE.bits() & !Self::DN.bits();
        const CONTROL_ALTERABLE = Self::IND.bits() | Self::DISP.bits() | Self::INDEX.bits()
            | Self::ABS.bits();
        const REGISTERS = Self::DN.bits() | Self::AN.bits() | Self::REGLIST.bits();
    }
}

/// Companion fields a mode needs on its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Companions {
    pub base_displacement: bool,
    pub index_register: bool,
    pub outer_displacement: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    DataRegisterDirect,
    AddressRegisterDirect,
    AddressRegisterIndirect,
    PostIncrement,
    PreDecrement,
    Displacement,
    Index8,
    Index,
    MemoryIndirectPostIndexed,
    MemoryIndirectPreIndexed,
    PcDisplacement,
    PcIndex8,
    PcIndex,
    PcMemoryIndirectPostIndexed,
    PcMemoryIndirectPreIndexed,
    AbsoluteShort,
    AbsoluteLong,
    Immediate,
    Relative8,
    Relative16,
    Relative32,
    RegisterList,
    StatusRegister,
    ConditionCodeRegister,
    UserStackPointer,
}

impl AddressingMode {
    /// The 3-bit mode field; `None` for operands that are not effective addresses.
    pub fn mode_bits(self) -> Option<u8> {
        use AddressingMode::*;
        Some(match self {
            DataRegisterDirect => 0,
            AddressRegisterDirect => 1,
            AddressRegisterIndirect => 2,
            PostIncrement => 3,
            PreDecrement => 4,
            Displacement => 5,
            Index8 | Index | MemoryIndirectPostIndexed | MemoryIndirectPreIndexed => 6,
            PcDisplacement | PcIndex8 | PcIndex | PcMemoryIndirectPostIndexed
            | PcMemoryIndirectPreIndexed | AbsoluteShort | AbsoluteLong | Immediate => 7,
            _ => return None,
        })
    }

    /// The 3-bit register field; `base` is used for modes 0 to 6.
    pub fn register_bits(self, base: u8) -> Option<u8> {
        use AddressingMode::*;
        Some(match self {
            AbsoluteShort => 0,
            AbsoluteLong => 1,
            PcDisplacement => 2,
            PcIndex8 | PcIndex | PcMemoryIndirectPostIndexed | PcMemoryIndirectPreIndexed => 3,
            Immediate => 4,
            m if m.mode_bits().is_some() => base & 7,
            _ => return None,
        })
    }

    pub fn companions(self) -> Companions {
        use AddressingMode::*;
        match self {
            Displacement | PcDisplacement => Companions {
                base_displacement: true,
                ..Companions::default()
            },
            Index8 | Index | PcIndex8 | PcIndex => Companions {
                base_displacement: true,
                index_register: true,
                ..Companions::default()
            },
            MemoryIndirectPostIndexed
            | MemoryIndirectPreIndexed
            | PcMemoryIndirectPostIndexed
            | PcMemoryIndirectPreIndexed => Companions {
                base_displacement: true,
                index_register: true,
                outer_displacement: true,
            },
            _ => Companions::default(),
        }
    }

    /// Bytes of extension words following the opcode for this operand.
    pub fn extension_bytes(self, size: Option<Size>) -> u32 {
        use AddressingMode::*;
        match self {
            Displacement | PcDisplacement | Index8 | PcIndex8 | AbsoluteShort => 2,
            Index | PcIndex => 6,
            MemoryIndirectPostIndexed
            | MemoryIndirectPreIndexed
            | PcMemoryIndirectPostIndexed
            | PcMemoryIndirectPreIndexed => 10,
            AbsoluteLong => 4,
            Immediate => match size {
                Some(Size::Long) => 4,
                _ => 2,
            },
            _ => 0,
        }
    }

    pub fn class(self) -> ModeSet {
        use AddressingMode::*;
        match self {
            DataRegisterDirect => ModeSet::DN,
            AddressRegisterDirect => ModeSet::AN,
            AddressRegisterIndirect => ModeSet::IND,
            PostIncrement => ModeSet::POSTINC,
            PreDecrement => ModeSet::PREDEC,
            Displacement => ModeSet::DISP,
            Index8 | Index | MemoryIndirectPostIndexed | MemoryIndirectPreIndexed => ModeSet::INDEX,
            PcDisplacement => ModeSet::PC_DISP,
            PcIndex8 | PcIndex | PcMemoryIndirectPostIndexed | PcMemoryIndirectPreIndexed => {
                ModeSet::PC_INDEX
            }
            AbsoluteShort | AbsoluteLong => ModeSet::ABS,
            Immediate => ModeSet::IMM,
            Relative8 => ModeSet::REL8,
            Relative16 => ModeSet::REL16,
            Relative32 => ModeSet::REL32,
            RegisterList => ModeSet::REGLIST,
            StatusRegister => ModeSet::SR,
            ConditionCodeRegister => ModeSet::CCR,
            UserStackPointer => ModeSet::USP,
        }
    }

    /// The narrow variant relaxation may rewrite this mode to.
    pub fn narrow(self) -> Option<AddressingMode> {
        use AddressingMode::*;
        match self {
            AbsoluteLong => Some(AbsoluteShort),
            Index => Some(Index8),
            PcIndex => Some(PcIndex8),
            Relative16 => Some(Relative8),
            _ => None,
        }
    }

    /// Signed bit width of the displacement or address slot.
    pub fn capacity(self) -> Option<u32> {
        use AddressingMode::*;
        match self {
            Index8 | PcIndex8 | Relative8 => Some(8),
            Displacement | PcDisplacement | AbsoluteShort | Relative16 => Some(16),
            Index | PcIndex | AbsoluteLong | Relative32 | MemoryIndirectPostIndexed
            | MemoryIndirectPreIndexed | PcMemoryIndirectPostIndexed
            | PcMemoryIndirectPreIndexed => Some(32),
            _ => None,
        }
    }

    pub fn is_pc_relative(self) -> bool {
        use AddressingMode::*;
        matches!(
            self,
            PcDisplacement | PcIndex8 | PcIndex | PcMemoryIndirectPostIndexed | PcMemoryIndirectPreIndexed
        )
    }

    pub fn requires_68020(self) -> bool {
        use AddressingMode::*;
        matches!(
            self,
            Index
                | PcIndex
                | MemoryIndirectPostIndexed
                | MemoryIndirectPreIndexed
                | PcMemoryIndirectPostIndexed
                | PcMemoryIndirectPreIndexed
                | Relative32
        )
    }

    pub fn describe(self) -> &'static str {
        use AddressingMode::*;
        match self {
            DataRegisterDirect => "data register direct",
            AddressRegisterDirect => "address register direct",
            AddressRegisterIndirect => "address register indirect",
            PostIncrement => "address register indirect with post-increment",
            PreDecrement => "address register indirect with pre-decrement",
            Displacement => "address register indirect with displacement",
            Index8 | Index => "address register indirect with index",
            MemoryIndirectPostIndexed => "memory indirect post-indexed",
            MemoryIndirectPreIndexed => "memory indirect pre-indexed",
            PcDisplacement => "program counter with displacement",
            PcIndex8 | PcIndex => "program counter with index",
            PcMemoryIndirectPostIndexed => "program counter memory indirect post-indexed",
            PcMemoryIndirectPreIndexed => "program counter memory indirect pre-indexed",
            AbsoluteShort => "absolute short",
            AbsoluteLong => "absolute long",
            Immediate => "immediate",
            Relative8 | Relative16 | Relative32 => "relative branch target",
            RegisterList => "register list",
            StatusRegister => "status register",
            ConditionCodeRegister => "condition code register",
            UserStackPointer => "user stack pointer",
        }
    }
}

/// Two's complement fit in `bits` bits.
pub fn fits_signed(value: i64, bits: u32) -> bool {
    let half = 1i64 << (bits - 1);
    (-half..half).contains(&value)
}

/// Whether an address survives the sign extension of absolute short mode.
pub fn fits_absolute_short(address: i64) -> bool {
    fits_signed(address, 16) || (0xFFFF_8000..=0xFFFF_FFFF).contains(&address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(Register::parse("D3"), Some(Register::Data(3)));
        assert_eq!(Register::parse("sp"), Some(Register::Address(7)));
        assert_eq!(Register::parse("a8"), None);
        assert_eq!(Register::parse("d10"), None);
        assert_eq!(Register::parse("loop"), None);
    }

    #[test]
    fn mode_seven_register_fields() {
        assert_eq!(AddressingMode::AbsoluteShort.register_bits(5), Some(0));
        assert_eq!(AddressingMode::Immediate.register_bits(5), Some(4));
        assert_eq!(AddressingMode::PostIncrement.register_bits(5), Some(5));
        assert_eq!(AddressingMode::Relative8.register_bits(5), None);
    }

    #[test]
    fn classes_nest() {
        assert!(ModeSet::DATA.contains(ModeSet::IMM));
        assert!(!ModeSet::DATA.contains(ModeSet::AN));
        assert!(!ModeSet::MEMORY_ALTERABLE.contains(ModeSet::PC_DISP));
        assert!(ModeSet::CONTROL.contains(AddressingMode::PcIndex8.class()));
    }

    #[test]
    fn short_absolute_range() {
        assert!(fits_absolute_short(0x7FFF));
        assert!(!fits_absolute_short(0x8000));
        assert!(fits_absolute_short(0xFFFF_8000));
        assert!(fits_absolute_short(-2));
        assert!(!fits_absolute_short(0x1_0000));
    }
}
