pub mod model;

pub use model::{image_from_bytes, load_raw_bin, read_u16, read_u8, Image, Segment};

use m68k_asm::decoder::{Decoded, Decoder};
use m68k_asm::disasm::fmt_decoded;
use serde::Serialize;

/// One row of a range listing.
#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub address: u32,
    pub bytes: Vec<u8>,
    pub text: String,
    /// `None` for words that did not decode.
    pub insn: Option<Decoded>,
}

/// Linear sweep over `[start, end)`. Undecodable words are emitted as `dc.w`.
pub fn disassemble_range(img: &Image, dec: &impl Decoder, start: u32, end: u32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pc = start;
    while pc < end {
        let Some(window) = img.slice_from(pc) else { break };
        let limit = window.len().min((end - pc) as usize);
        let window = &window[..limit];
        match dec.decode(window, pc) {
            Some(d) => {
                let len = d.length;
                lines.push(Line {
                    address: pc,
                    bytes: window[..len as usize].to_vec(),
                    text: fmt_decoded(&d),
                    insn: Some(d),
                });
                pc = pc.wrapping_add(len);
            }
            None => {
                let Some(word) = read_u16(img, pc).filter(|_| limit >= 2) else {
                    lines.push(Line { address: pc, bytes: window.to_vec(), text: "<truncated>".into(), insn: None });
                    break;
                };
                lines.push(Line { address: pc, bytes: word.to_be_bytes().to_vec(), text: format!("dc.w ${word:04x}"), insn: None });
                pc = pc.wrapping_add(2);
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use m68k_asm::isa::m68000::M68000Decoder;

    #[test]
    fn sweep_falls_back_to_words() {
        // nop; <undecodable>; rts
        let img = image_from_bytes(&[0x4E, 0x71, 0xFF, 0xFF, 0x4E, 0x75], 0x400, 0, None).unwrap();
        let dec = M68000Decoder::new().unwrap();
        let lines = disassemble_range(&img, &dec, 0x400, 0x406);
        let text: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(text, vec!["nop", "dc.w $ffff", "rts"]);
        assert_eq!(lines[2].address, 0x404);
    }
}
