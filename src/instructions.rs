use std::collections::HashMap;

use crate::addressing::{AddressingMode, ModeSet, Size};
use crate::encoding::{Field, InstructionEncoding};
use crate::error::FormError;

/// Condition mnemonics and their 4-bit codes; `hs`/`lo` are aliases.
pub const CONDITIONS: [(&str, u8); 18] = [
    ("t", 0),
    ("f", 1),
    ("hi", 2),
    ("ls", 3),
    ("cc", 4),
    ("hs", 4),
    ("cs", 5),
    ("lo", 5),
    ("ne", 6),
    ("eq", 7),
    ("vc", 8),
    ("vs", 9),
    ("pl", 10),
    ("mi", 11),
    ("ge", 12),
    ("lt", 13),
    ("gt", 14),
    ("le", 15),
];

pub fn condition_code(name: &str) -> Option<u8> {
    CONDITIONS.iter().find(|(n, _)| *n == name).map(|&(_, c)| c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Bcc,
    DBcc,
}

/// Whether `mnemonic` takes a relative branch target.
pub fn branch_kind(mnemonic: &str) -> Option<BranchKind> {
    match mnemonic {
        "bra" | "bsr" => return Some(BranchKind::Bcc),
        "dbra" => return Some(BranchKind::DBcc),
        _ => {}
    }
    if let Some(cc) = mnemonic.strip_prefix("db") {
        if condition_code(cc).is_some() {
            return Some(BranchKind::DBcc);
        }
    }
    match mnemonic.strip_prefix('b').and_then(condition_code) {
        Some(c) if c > 1 => Some(BranchKind::Bcc),
        _ => None,
    }
}

/// How an operation size lands in the `S` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCoding {
    /// b=0 w=1 l=2
    Standard,
    /// MOVE: b=1 w=3 l=2
    Move,
    /// One bit: w=0 l=1
    Single,
    /// Implied by the instruction.
    Fixed,
}

impl SizeCoding {
    pub fn encode(self, size: Size) -> Option<i64> {
        match (self, size) {
            (SizeCoding::Standard, Size::Byte) => Some(0),
            (SizeCoding::Standard, Size::Word) => Some(1),
            (SizeCoding::Standard, Size::Long) => Some(2),
            (SizeCoding::Move, Size::Byte) => Some(1),
            (SizeCoding::Move, Size::Word) => Some(3),
            (SizeCoding::Move, Size::Long) => Some(2),
            (SizeCoding::Single, Size::Word) => Some(0),
            (SizeCoding::Single, Size::Long) => Some(1),
            _ => None,
        }
    }

    pub fn decode(self, bits: i64) -> Option<Size> {
        [Size::Byte, Size::Word, Size::Long]
            .into_iter()
            .find(|&s| self.encode(s) == Some(bits))
    }
}

/// Where an operand's bits go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Mode and register fields plus extension words after the opcode.
    Ea { mode: Field, register: Field },
    /// Register number only.
    Register(Field),
    /// Address register number with a 16-bit displacement word after the opcode.
    Based(Field),
    /// Immediate 1..=8, with 8 stored as 0.
    Quick(Field),
    /// Immediate held in an opcode field; `signed` also admits negative spellings.
    Data { field: Field, signed: bool },
    /// Immediate emitted as extension words of the operation size.
    Immediate,
    /// Branch displacement from the opcode address.
    Displacement(Field),
    /// MOVEM register list.
    RegisterMask(Field),
    /// SR, CCR or USP; no bits.
    Implied,
}

#[derive(Debug, Clone)]
pub struct Form {
    /// Canonical mnemonic, as printed by the disassembler.
    pub name: String,
    pub sizes: Vec<Size>,
    pub default_size: Option<Size>,
    pub size_coding: SizeCoding,
    pub operands: Vec<(ModeSet, Slot)>,
    /// Fields fixed by the mnemonic rather than by an operand.
    pub implied: Vec<(Field, i64)>,
    pub encoding: InstructionEncoding,
}

impl Form {
    pub fn accepts_size(&self, size: Option<Size>) -> bool {
        match size {
            None => true,
            Some(s) => self.sizes.contains(&s),
        }
    }

    pub fn accepts_mode(&self, index: usize, mode: AddressingMode) -> bool {
        self.operands
            .get(index)
            .is_some_and(|(set, _)| set.contains(mode.class()))
    }

    /// Whether the size suffix is significant when printing.
    pub fn shows_size(&self) -> bool {
        self.sizes.len() > 1
    }

    /// Literal and implied bits; more means a more specific decode match.
    pub fn specificity(&self) -> u32 {
        let (mask, _) = self.encoding.fixed_bits();
        mask.count_ones()
            + self
                .implied
                .iter()
                .map(|(f, _)| self.encoding.width(*f))
                .sum::<u32>()
    }
}

/// Chosen form and effective size for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub form: usize,
    pub size: Option<Size>,
}

/// Every instruction form, indexed by mnemonic and by decode priority.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    forms: Vec<Form>,
    by_mnemonic: HashMap<String, Vec<usize>>,
    decode_order: Vec<usize>,
}

impl InstructionTable {
    /// Indexes `forms`; each alias maps to the forms of its targets, in order.
    pub fn new(forms: Vec<Form>, aliases: &[(&str, &[&str])]) -> Self {
        let mut by_mnemonic: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, form) in forms.iter().enumerate() {
            by_mnemonic.entry(form.name.clone()).or_default().push(i);
        }
        for (alias, targets) in aliases {
            let mut ids: Vec<usize> = by_mnemonic.get(*alias).cloned().unwrap_or_default();
            for target in *targets {
                ids.extend(by_mnemonic.get(*target).into_iter().flatten().copied());
            }
            by_mnemonic.insert(alias.to_string(), ids);
        }

        let mut decode_order: Vec<usize> = (0..forms.len()).collect();
        decode_order.sort_by_key(|&i| std::cmp::Reverse(forms[i].specificity()));
        Self {
            forms,
            by_mnemonic,
            decode_order,
        }
    }

    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn form(&self, id: usize) -> &Form {
        &self.forms[id]
    }

    pub fn knows(&self, mnemonic: &str) -> bool {
        self.by_mnemonic.contains_key(mnemonic)
    }

    /// Forms in the order the decoder should try them.
    pub fn decode_order(&self) -> impl Iterator<Item = (usize, &Form)> {
        self.decode_order.iter().map(|&i| (i, &self.forms[i]))
    }

    /// Picks the first form of `mnemonic` accepting `size` and every operand mode.
    pub fn check_supports(
        &self,
        mnemonic: &str,
        size: Option<Size>,
        modes: &[AddressingMode],
    ) -> Result<Selection, FormError> {
        let ids = self
            .by_mnemonic
            .get(mnemonic)
            .ok_or_else(|| FormError::UnknownMnemonic(mnemonic.to_string()))?;

        let by_count: Vec<usize> = ids
            .iter()
            .copied()
            .filter(|&i| self.forms[i].operands.len() == modes.len())
            .collect();
        if by_count.is_empty() {
            let mut counts: Vec<usize> = ids.iter().map(|&i| self.forms[i].operands.len()).collect();
            counts.sort_unstable();
            counts.dedup();
            let expected = counts
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(FormError::OperandCount {
                mnemonic: mnemonic.to_string(),
                expected,
                found: modes.len(),
            });
        }

        let by_size: Vec<usize> = by_count
            .iter()
            .copied()
            .filter(|&i| self.forms[i].accepts_size(size))
            .collect();
        let Some(&first) = by_size.first() else {
            let size = size.map_or("", Size::suffix);
            if by_count.iter().all(|&i| self.forms[i].sizes.is_empty()) {
                return Err(FormError::Unsized {
                    mnemonic: mnemonic.to_string(),
                });
            }
            return Err(FormError::Size {
                mnemonic: mnemonic.to_string(),
                size,
            });
        };

        for &i in &by_size {
            let form = &self.forms[i];
            if modes.iter().enumerate().all(|(k, &m)| form.accepts_mode(k, m)) {
                let size = size.or(form.default_size);
                if size == Some(Size::Byte) {
                    if let Some(k) = modes
                        .iter()
                        .position(|&m| m == AddressingMode::AddressRegisterDirect)
                    {
                        return Err(FormError::ByteAddressRegister { index: k + 1 });
                    }
                }
                return Ok(Selection { form: i, size });
            }
        }

        // report against the form that got furthest
        let leading = |i: usize| {
            modes
                .iter()
                .enumerate()
                .take_while(|&(k, &m)| self.forms[i].accepts_mode(k, m))
                .count()
        };
        let best = by_size.iter().copied().max_by_key(|&i| leading(i)).unwrap_or(first);
        let index = leading(best);
        Err(FormError::Mode {
            mnemonic: mnemonic.to_string(),
            index: index + 1,
            mode: modes[index].describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::m68000::table;
    use AddressingMode::*;

    #[test]
    fn branch_mnemonics() {
        assert_eq!(branch_kind("bra"), Some(BranchKind::Bcc));
        assert_eq!(branch_kind("bhs"), Some(BranchKind::Bcc));
        assert_eq!(branch_kind("dbra"), Some(BranchKind::DBcc));
        assert_eq!(branch_kind("dbne"), Some(BranchKind::DBcc));
        assert_eq!(branch_kind("bset"), None);
        assert_eq!(branch_kind("bt"), None);
    }

    #[test]
    fn size_codings() {
        assert_eq!(SizeCoding::Move.encode(Size::Byte), Some(1));
        assert_eq!(SizeCoding::Move.decode(0), None);
        assert_eq!(SizeCoding::Single.encode(Size::Byte), None);
        assert_eq!(SizeCoding::Standard.decode(2), Some(Size::Long));
    }

    #[test]
    fn move_to_address_register_selects_movea() {
        let t = table().unwrap();
        let sel = t
            .check_supports("move", Some(Size::Long), &[DataRegisterDirect, AddressRegisterDirect])
            .unwrap();
        assert_eq!(t.form(sel.form).name, "movea");
    }

    #[test]
    fn add_immediate_to_memory_selects_addi() {
        let t = table().unwrap();
        let sel = t
            .check_supports("add", Some(Size::Word), &[Immediate, AddressRegisterIndirect])
            .unwrap();
        assert_eq!(t.form(sel.form).name, "addi");
    }

    #[test]
    fn default_size_is_filled_in() {
        let t = table().unwrap();
        let sel = t
            .check_supports("move", None, &[DataRegisterDirect, DataRegisterDirect])
            .unwrap();
        assert_eq!(sel.size, Some(Size::Word));
    }

    #[test]
    fn rejections() {
        let t = table().unwrap();
        assert_eq!(
            t.check_supports("frob", None, &[]),
            Err(FormError::UnknownMnemonic("frob".into()))
        );
        assert!(matches!(
            t.check_supports("nop", None, &[DataRegisterDirect]),
            Err(FormError::OperandCount { found: 1, .. })
        ));
        assert!(matches!(
            t.check_supports("nop", Some(Size::Word), &[]),
            Err(FormError::Unsized { .. })
        ));
        assert!(matches!(
            t.check_supports("lea", Some(Size::Word), &[AddressRegisterIndirect, AddressRegisterDirect]),
            Err(FormError::Size { size: "w", .. })
        ));
        assert_eq!(
            t.check_supports("move", Some(Size::Byte), &[AddressRegisterDirect, DataRegisterDirect]),
            Err(FormError::ByteAddressRegister { index: 1 })
        );
        assert!(matches!(
            t.check_supports("lea", None, &[PostIncrement, AddressRegisterDirect]),
            Err(FormError::Mode { index: 1, .. })
        ));
    }
}
