//! Sparse big-endian output buffers.

use crate::error::WriterError;

/// Contiguous run of output starting at `start_offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub start_offset: u32,
    /// Bytes covered, including those only reserved while sizing.
    pub length: u32,
    pub bytes: Vec<u8>,
}

impl Buffer {
    fn new(start_offset: u32) -> Self {
        Self {
            start_offset,
            length: 0,
            bytes: Vec::new(),
        }
    }

    /// First offset past the buffer; writes keep it inside `u32`.
    pub fn end(&self) -> u32 {
        self.start_offset + self.length
    }

    /// Length after `count` more bytes, if the end stays inside the address space.
    fn grown(&self, count: u32) -> Result<u32, WriterError> {
        self.end()
            .checked_add(count)
            .map(|_| self.length + count)
            .ok_or(WriterError::AddressOverflow {
                offset: self.end(),
                count,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Append-only writer. In sizing mode it tracks offsets without storing bytes.
#[derive(Debug, Clone)]
pub struct ObjectCodeWriter {
    buffers: Vec<Buffer>,
    sizing: bool,
}

impl ObjectCodeWriter {
    pub fn new(origin: u32) -> Self {
        Self {
            buffers: vec![Buffer::new(origin)],
            sizing: false,
        }
    }

    pub fn sizing(origin: u32) -> Self {
        Self {
            sizing: true,
            ..Self::new(origin)
        }
    }

    pub fn is_sizing(&self) -> bool {
        self.sizing
    }

    /// Drops everything written and starts again at `origin`.
    pub fn reset(&mut self, origin: u32, sizing: bool) {
        self.buffers.clear();
        self.buffers.push(Buffer::new(origin));
        self.sizing = sizing;
    }

    fn current(&mut self) -> &mut Buffer {
        if self.buffers.is_empty() {
            self.buffers.push(Buffer::new(0));
        }
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    /// End of the highest non-empty buffer.
    fn high_water(&self) -> Option<u32> {
        self.buffers.iter().rev().find(|b| !b.is_empty()).map(Buffer::end)
    }

    pub fn set_offset(&mut self, address: u32) -> Result<(), WriterError> {
        if let Some(end) = self.high_water() {
            if address < end {
                return Err(WriterError::BackwardSeek {
                    target: address,
                    offset: end,
                });
            }
        }
        let current = self.current();
        if current.is_empty() {
            current.start_offset = address;
        } else if current.end() != address {
            self.buffers.push(Buffer::new(address));
        }
        Ok(())
    }

    pub fn offset(&self) -> u32 {
        self.buffers.last().map_or(0, Buffer::end)
    }

    /// Reserves `count` bytes; they read back as zero.
    pub fn advance(&mut self, count: u32) -> Result<(), WriterError> {
        let sizing = self.sizing;
        let current = self.current();
        current.length = current.grown(count)?;
        if !sizing {
            current.bytes.resize(current.length as usize, 0);
        }
        Ok(())
    }

    /// Appends `data`. Nothing is written when it would run past `$ffffffff`.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriterError> {
        let sizing = self.sizing;
        let current = self.current();
        let count = u32::try_from(data.len()).map_err(|_| WriterError::AddressOverflow {
            offset: current.end(),
            count: u32::MAX,
        })?;
        current.length = current.grown(count)?;
        if !sizing {
            current.bytes.extend_from_slice(data);
        }
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), WriterError> {
        self.write_bytes(&[value])
    }

    pub fn write_word(&mut self, value: u16) -> Result<(), WriterError> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_long(&mut self, value: u32) -> Result<(), WriterError> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Non-empty buffers in address order.
    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter().filter(|b| !b.is_empty())
    }

    /// Bytes stored at `address..address + len`, if one buffer holds all of them.
    pub fn read(&self, address: u32, len: u32) -> Option<&[u8]> {
        let end = address.checked_add(len)?;
        let buffer = self
            .buffers()
            .find(|b| b.start_offset <= address && end <= b.end())?;
        let from = (address - buffer.start_offset) as usize;
        buffer.bytes.get(from..from + len as usize)
    }

    /// Flattened output; gaps between buffers are zero-filled.
    pub fn bytes(&self, pad_leading: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut next: Option<u32> = if pad_leading { Some(0) } else { None };
        for buffer in self.buffers() {
            if let Some(at) = next {
                out.resize(out.len() + (buffer.start_offset - at) as usize, 0);
            }
            out.extend_from_slice(&buffer.bytes);
            next = Some(buffer.end());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn words_are_big_endian() {
        let mut w = ObjectCodeWriter::new(0);
        w.write_word(0x4E71).unwrap();
        w.write_long(0x0001_0203).unwrap();
        assert_eq!(w.offset(), 6);
        assert_eq!(w.bytes(false), vec![0x4E, 0x71, 0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn org_opens_a_new_buffer() {
        let mut w = ObjectCodeWriter::new(0);
        w.write_byte(1).unwrap();
        w.set_offset(4).unwrap();
        w.write_byte(2).unwrap();
        assert_eq!(w.buffers().count(), 2);
        assert_eq!(w.bytes(false), vec![1, 0, 0, 0, 2]);
    }

    #[test]
    fn empty_buffer_is_replaced() {
        let mut w = ObjectCodeWriter::new(0);
        w.set_offset(0x100).unwrap();
        w.set_offset(0x200).unwrap();
        w.write_word(0).unwrap();
        let starts: Vec<u32> = w.buffers().map(|b| b.start_offset).collect();
        assert_eq!(starts, vec![0x200]);
    }

    #[test]
    fn backward_seek_fails() {
        let mut w = ObjectCodeWriter::new(0x10);
        w.write_long(0).unwrap();
        assert_eq!(
            w.set_offset(0x12),
            Err(WriterError::BackwardSeek { target: 0x12, offset: 0x14 })
        );
        assert!(w.set_offset(0x14).is_ok());
    }

    #[test]
    fn leading_gap_on_request() {
        let mut w = ObjectCodeWriter::new(3);
        w.write_byte(0xAA).unwrap();
        assert_eq!(w.bytes(false), vec![0xAA]);
        assert_eq!(w.bytes(true), vec![0, 0, 0, 0xAA]);
    }

    #[test]
    fn sizing_counts_without_storing() {
        let mut w = ObjectCodeWriter::sizing(0);
        w.write_word(0x1234).unwrap();
        w.advance(6).unwrap();
        assert_eq!(w.offset(), 8);
        assert!(w.buffers().all(|b| b.bytes.is_empty()));
    }

    #[test]
    fn the_last_address_is_the_limit() {
        let mut w = ObjectCodeWriter::new(0xFFFF_FFFC);
        w.write_word(0x4E71).unwrap();
        assert_eq!(
            w.write_long(0),
            Err(WriterError::AddressOverflow { offset: 0xFFFF_FFFE, count: 4 })
        );
        assert_eq!(w.offset(), 0xFFFF_FFFE);
        assert_eq!(
            w.advance(2),
            Err(WriterError::AddressOverflow { offset: 0xFFFF_FFFE, count: 2 })
        );
        w.write_byte(0xAA).unwrap();
        assert_eq!(w.offset(), 0xFFFF_FFFF);
        assert_eq!(w.bytes(false), vec![0x4E, 0x71, 0xAA]);
    }
}
