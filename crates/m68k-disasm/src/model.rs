use std::path::Path;

use anyhow::{ensure, Result};
use serde::Serialize;

/// Bytes mapped at `base`.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub name: String,
    pub base: u32,
    pub bytes: Vec<u8>,
    pub perms: &'static str,
    pub kind: &'static str,
}

impl Segment {
    /// First address past the segment.
    pub fn end(&self) -> u32 {
        self.base.wrapping_add(self.bytes.len() as u32)
    }

    pub fn contains(&self, addr: u32) -> bool {
        (self.base..self.end()).contains(&addr)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub segments: Vec<Segment>,
}

impl Image {
    /// Bytes from `addr` to the end of its segment.
    pub fn slice_from(&self, addr: u32) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|seg| seg.contains(addr))
            .and_then(|seg| seg.bytes.get((addr - seg.base) as usize..))
    }
}

/// Maps a raw `.bin` file as one read/execute segment.
pub fn load_raw_bin(path: &Path, base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    image_from_bytes(&std::fs::read(path)?, base, skip, len)
}

pub fn image_from_bytes(data: &[u8], base: u32, skip: usize, len: Option<usize>) -> Result<Image> {
    ensure!(skip <= data.len(), "skip of {skip} bytes is past the end of a {}-byte file", data.len());
    let rest = &data[skip..];
    let take = len.unwrap_or(rest.len());
    ensure!(take <= rest.len(), "only {} bytes remain after skipping {skip}", rest.len());
    Ok(Image {
        segments: vec![Segment {
            name: "raw".into(),
            base,
            bytes: rest[..take].to_vec(),
            perms: "r-x",
            kind: "bin",
        }],
    })
}

pub fn read_u8(img: &Image, addr: u32) -> Option<u8> {
    img.slice_from(addr)?.first().copied()
}

/// Big-endian word; both bytes must be mapped.
pub fn read_u16(img: &Image, addr: u32) -> Option<u16> {
    let hi = read_u8(img, addr)?;
    let lo = read_u8(img, addr.wrapping_add(1))?;
    Some(u16::from_be_bytes([hi, lo]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_and_len_select_the_payload() {
        let img = image_from_bytes(&[0u8, 1, 2, 3, 4, 5], 0x1000, 2, Some(3)).unwrap();
        assert_eq!(img.segments.len(), 1);
        let seg = &img.segments[0];
        assert_eq!(seg.base, 0x1000);
        assert_eq!(seg.bytes, vec![2, 3, 4]);
        assert_eq!(read_u16(&img, 0x1000), Some(0x0203));
        assert_eq!(read_u16(&img, 0x1002), None);
    }

    #[test]
    fn out_of_range_skip_or_len_is_rejected() {
        assert!(image_from_bytes(&[0u8; 2], 0, 3, None).is_err());
        assert!(image_from_bytes(&[0u8; 4], 0, 2, Some(3)).is_err());
    }
}
