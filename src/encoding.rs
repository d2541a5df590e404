//! Declarative bit-pattern encodings.
//!
//! A pattern is written most significant bit first, one character per bit:
//! `'0'` and `'1'` are literal bits and every other character names a
//! [`Field`]. `"0111DDD0qqqqqqqq"` is MOVEQ: the destination register lands in
//! bits 11..9 and the quick value in bits 7..0. A field whose positions are not
//! contiguous is still legal; its bits are filled in ascending order.

use std::collections::BTreeMap;

use crate::error::EncodingError;

/// Architectural value that a pattern maps onto instruction bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    SourceRegister,
    SourceMode,
    DestRegister,
    DestMode,
    Size,
    Quick,
    Condition,
    Displacement,
    Vector,
    Direction,
    IndexRegister,
    IndexSize,
    Scale,
    BaseSuppress,
    IndexSuppress,
    BaseDisplacementSize,
    IndirectSelect,
    RegisterMask,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::SourceRegister,
        Field::SourceMode,
        Field::DestRegister,
        Field::DestMode,
        Field::Size,
        Field::Quick,
        Field::Condition,
        Field::Displacement,
        Field::Vector,
        Field::Direction,
        Field::IndexRegister,
        Field::IndexSize,
        Field::Scale,
        Field::BaseSuppress,
        Field::IndexSuppress,
        Field::BaseDisplacementSize,
        Field::IndirectSelect,
        Field::RegisterMask,
    ];

    pub fn from_letter(c: char) -> Option<Self> {
        Some(match c {
            's' => Field::SourceRegister,
            'm' => Field::SourceMode,
            'D' => Field::DestRegister,
            'M' => Field::DestMode,
            'S' => Field::Size,
            'q' => Field::Quick,
            'c' => Field::Condition,
            'd' => Field::Displacement,
            'v' => Field::Vector,
            'r' => Field::Direction,
            'i' => Field::IndexRegister,
            'w' => Field::IndexSize,
            'x' => Field::Scale,
            'B' => Field::BaseSuppress,
            'I' => Field::IndexSuppress,
            'z' => Field::BaseDisplacementSize,
            'o' => Field::IndirectSelect,
            'k' => Field::RegisterMask,
            _ => return None,
        })
    }

    pub fn letter(self) -> char {
        match self {
            Field::SourceRegister => 's',
            Field::SourceMode => 'm',
            Field::DestRegister => 'D',
            Field::DestMode => 'M',
            Field::Size => 'S',
            Field::Quick => 'q',
            Field::Condition => 'c',
            Field::Displacement => 'd',
            Field::Vector => 'v',
            Field::Direction => 'r',
            Field::IndexRegister => 'i',
            Field::IndexSize => 'w',
            Field::Scale => 'x',
            Field::BaseSuppress => 'B',
            Field::IndexSuppress => 'I',
            Field::BaseDisplacementSize => 'z',
            Field::IndirectSelect => 'o',
            Field::RegisterMask => 'k',
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

const FIELD_COUNT: usize = Field::ALL.len();

/// Field values keyed by [`Field`], filled in by code generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues([Option<i64>; FIELD_COUNT]);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: Field, value: i64) -> &mut Self {
        self.0[field.index()] = Some(value);
        self
    }

    pub fn get(&self, field: Field) -> Option<i64> {
        self.0[field.index()]
    }
}

fn low_mask(length: u32) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Literal bits of a slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedBits {
    pub clear_mask: u64,
    pub set_mask: u64,
}

impl FixedBits {
    pub fn apply(&self, target: u64) -> u64 {
        (target & !self.clear_mask) | self.set_mask
    }

    pub fn matches(&self, word: u64) -> bool {
        word & self.clear_mask == self.set_mask
    }
}

/// Contiguous field: source bits `0..length` land at `dst_start..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRangeMapping {
    pub src_start: u32,
    pub dst_start: u32,
    pub length: u32,
}

impl BitRangeMapping {
    pub fn dst_mask(&self) -> u64 {
        low_mask(self.length) << self.dst_start
    }

    pub fn apply(&self, input: u64, target: u64) -> u64 {
        let bits = (input >> self.src_start) & low_mask(self.length);
        (target & !self.dst_mask()) | (bits << self.dst_start)
    }

    pub fn extract(&self, word: u64) -> u64 {
        ((word >> self.dst_start) & low_mask(self.length)) << self.src_start
    }
}

/// Scattered field: `bits[k] = (source bit, destination bit)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualBitMapping {
    pub bits: Vec<(u32, u32)>,
}

impl IndividualBitMapping {
    pub fn dst_mask(&self) -> u64 {
        self.bits.iter().fold(0, |m, &(_, dst)| m | (1 << dst))
    }

    pub fn apply(&self, input: u64, target: u64) -> u64 {
        self.bits.iter().fold(target & !self.dst_mask(), |word, &(src, dst)| {
            if input & (1 << src) != 0 {
                word | (1 << dst)
            } else {
                word
            }
        })
    }

    pub fn extract(&self, word: u64) -> u64 {
        self.bits.iter().fold(0, |value, &(src, dst)| {
            if word & (1 << dst) != 0 {
                value | (1 << src)
            } else {
                value
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitMapping {
    Range(BitRangeMapping),
    Individual(IndividualBitMapping),
}

impl BitMapping {
    /// Builds the mapping for ascending destination bit positions.
    fn for_positions(positions: &[u32]) -> Self {
        let contiguous = positions
            .iter()
            .enumerate()
            .all(|(k, &bit)| bit == positions[0] + k as u32);
        if contiguous {
            BitMapping::Range(BitRangeMapping {
                src_start: 0,
                dst_start: positions[0],
                length: positions.len() as u32,
            })
        } else {
            BitMapping::Individual(IndividualBitMapping {
                bits: positions
                    .iter()
                    .enumerate()
                    .map(|(src, &dst)| (src as u32, dst))
                    .collect(),
            })
        }
    }

    pub fn apply(&self, input: u64, target: u64) -> u64 {
        match self {
            BitMapping::Range(m) => m.apply(input, target),
            BitMapping::Individual(m) => m.apply(input, target),
        }
    }

    pub fn extract(&self, word: u64) -> u64 {
        match self {
            BitMapping::Range(m) => m.extract(word),
            BitMapping::Individual(m) => m.extract(word),
        }
    }

    pub fn dst_mask(&self) -> u64 {
        match self {
            BitMapping::Range(m) => m.dst_mask(),
            BitMapping::Individual(m) => m.dst_mask(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            BitMapping::Range(m) => m.length,
            BitMapping::Individual(m) => m.bits.len() as u32,
        }
    }
}

/// One 16- or 32-bit word of an encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub width: u32,
    pub fixed: FixedBits,
    pub fields: Vec<(Field, BitMapping)>,
}

impl Slice {
    fn parse(pattern: &str) -> Result<Self, EncodingError> {
        let chars: Vec<char> = pattern.chars().collect();
        let len = chars.len();
        if pattern.trim().is_empty() {
            return Err(EncodingError::Blank);
        }
        if len % 16 != 0 {
            return Err(EncodingError::NotMultipleOf16 {
                pattern: pattern.to_string(),
                len,
            });
        }
        if len > 32 {
            return Err(EncodingError::TooLong {
                pattern: pattern.to_string(),
                len,
            });
        }

        let mut fixed = FixedBits::default();
        let mut positions: BTreeMap<Field, Vec<u32>> = BTreeMap::new();
        for (i, &c) in chars.iter().enumerate().rev() {
            let bit_no = (len - 1 - i) as u32;
            match c {
                '0' => fixed.clear_mask |= 1 << bit_no,
                '1' => {
                    fixed.clear_mask |= 1 << bit_no;
                    fixed.set_mask |= 1 << bit_no;
                }
                _ => {
                    let field = Field::from_letter(c).ok_or_else(|| EncodingError::UnknownField {
                        pattern: pattern.to_string(),
                        ch: c,
                    })?;
                    positions.entry(field).or_default().push(bit_no);
                }
            }
        }

        let fields = positions
            .into_iter()
            .map(|(field, bits)| (field, BitMapping::for_positions(&bits)))
            .collect();
        Ok(Slice {
            width: len as u32,
            fixed,
            fields,
        })
    }

    pub fn byte_len(&self) -> usize {
        (self.width / 8) as usize
    }

    fn apply<F>(&self, source: &mut F) -> Result<u64, EncodingError>
    where
        F: FnMut(Field) -> Option<i64>,
    {
        let mut word = self.fixed.apply(0);
        for (field, mapping) in &self.fields {
            let value = source(*field).ok_or(EncodingError::MissingField(*field))?;
            word = mapping.apply(value as u64, word);
        }
        Ok(word)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionEncoding {
    slices: Vec<Slice>,
}

impl InstructionEncoding {
    /// Parses one pattern per slice, most significant slice first.
    pub fn of(patterns: &[&str]) -> Result<Self, EncodingError> {
        if patterns.is_empty() {
            return Err(EncodingError::Blank);
        }
        let slices = patterns
            .iter()
            .map(|p| Slice::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slices })
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn byte_len(&self) -> usize {
        self.slices.iter().map(Slice::byte_len).sum()
    }

    pub fn uses(&self, field: Field) -> bool {
        self.slices
            .iter()
            .any(|s| s.fields.iter().any(|(f, _)| *f == field))
    }

    /// Total bits a field occupies across all slices.
    pub fn width(&self, field: Field) -> u32 {
        self.slices
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter(|(f, _)| *f == field)
            .map(|(_, m)| m.width())
            .sum()
    }

    /// Literal bits of the first slice as `(mask, value)`.
    pub fn fixed_bits(&self) -> (u64, u64) {
        let first = &self.slices[0];
        (first.fixed.clear_mask, first.fixed.set_mask)
    }

    /// Big-endian bytes of every slice.
    pub fn apply<F>(&self, mut source: F) -> Result<Vec<u8>, EncodingError>
    where
        F: FnMut(Field) -> Option<i64>,
    {
        let mut out = Vec::with_capacity(self.byte_len());
        for slice in &self.slices {
            let word = slice.apply(&mut source)?;
            let n = slice.byte_len();
            out.extend_from_slice(&word.to_be_bytes()[8 - n..]);
        }
        Ok(out)
    }

    pub fn apply_values(&self, values: &FieldValues) -> Result<Vec<u8>, EncodingError> {
        self.apply(|f| values.get(f))
    }

    /// Inverse of [`apply`](Self::apply). `None` when `bytes` is too short or
    /// a literal bit disagrees.
    pub fn extract(&self, bytes: &[u8]) -> Option<FieldValues> {
        let mut values = FieldValues::new();
        let mut pos = 0;
        for slice in &self.slices {
            let n = slice.byte_len();
            let chunk = bytes.get(pos..pos + n)?;
            let word = chunk.iter().fold(0u64, |w, &b| (w << 8) | b as u64);
            if !slice.fixed.matches(word) {
                return None;
            }
            for (field, mapping) in &slice.fields {
                values.set(*field, mapping.extract(word) as i64);
            }
            pos += n;
        }
        Some(values)
    }
}
