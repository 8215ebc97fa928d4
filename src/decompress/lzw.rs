//! TIFF LZW: MSB-first codes of 9 to 12 bits with "early change".

use alloc::format;
use alloc::vec::Vec;

use crate::error::DngError;

const CLEAR: u16 = 256;
const EOI: u16 = 257;
const FIRST_FREE: u16 = 258;
const MAX_BITS: u32 = 12;
const TABLE_SIZE: usize = 1 << MAX_BITS;

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn read(&mut self, bits: u32) -> Option<u16> {
        while self.nbits < bits {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.acc = (self.acc << 8) | u32::from(byte);
            self.nbits += 8;
        }
        self.nbits -= bits;
        let code = (self.acc >> self.nbits) & ((1 << bits) - 1);
        self.acc &= (1 << self.nbits) - 1;
        Some(code as u16)
    }
}

/// String table as prefix links; entries below 256 are the literals.
struct Table {
    prefix: [u16; TABLE_SIZE],
    suffix: [u8; TABLE_SIZE],
    first: [u8; TABLE_SIZE],
    len: [u16; TABLE_SIZE],
}

impl Table {
    fn new() -> alloc::boxed::Box<Self> {
        let mut t = alloc::boxed::Box::new(Table {
            prefix: [0; TABLE_SIZE],
            suffix: [0; TABLE_SIZE],
            first: [0; TABLE_SIZE],
            len: [0; TABLE_SIZE],
        });
        for i in 0..256 {
            t.suffix[i] = i as u8;
            t.first[i] = i as u8;
            t.len[i] = 1;
        }
        t
    }

    fn emit(&self, code: u16, out: &mut Vec<u8>) {
        let len = usize::from(self.len[usize::from(code)]);
        let start = out.len();
        out.resize(start + len, 0);
        let mut c = code;
        for i in (0..len).rev() {
            out[start + i] = self.suffix[usize::from(c)];
            c = self.prefix[usize::from(c)];
        }
    }
}

/// Decode one LZW strip or tile, producing at most `expected` bytes.
pub(crate) fn decode(data: &[u8], expected: usize) -> Result<Vec<u8>, DngError> {
    if data.len() >= 2 && data[0] == 0 && data[1] & 0x01 != 0 {
        return Err(DngError::Unsupported("old-style (LSB-first) LZW".into()));
    }
    let mut table = Table::new();
    let mut reader = BitReader {
        data,
        pos: 0,
        acc: 0,
        nbits: 0,
    };
    let mut out = Vec::with_capacity(expected);
    let mut width = 9u32;
    let mut next = FIRST_FREE;
    let mut prev: Option<u16> = None;

    while out.len() < expected {
        let Some(code) = reader.read(width) else {
            break;
        };
        if code == EOI {
            break;
        }
        if code == CLEAR {
            width = 9;
            next = FIRST_FREE;
            prev = None;
            continue;
        }
        let Some(p) = prev else {
            if code > 255 {
                return Err(DngError::InvalidData(format!(
                    "LZW: first code after clear is {code}"
                )));
            }
            out.push(code as u8);
            prev = Some(code);
            continue;
        };

        let first = if code < next {
            if code > 255 && table.len[usize::from(code)] == 0 {
                return Err(DngError::InvalidData(format!("LZW: undefined code {code}")));
            }
            table.emit(code, &mut out);
            table.first[usize::from(code)]
        } else if code == next {
            let first = table.first[usize::from(p)];
            table.emit(p, &mut out);
            out.push(first);
            first
        } else {
            return Err(DngError::InvalidData(format!(
                "LZW: code {code} beyond next free entry {next}"
            )));
        };

        if usize::from(next) < TABLE_SIZE {
            let n = usize::from(next);
            table.prefix[n] = p;
            table.suffix[n] = first;
            table.first[n] = table.first[usize::from(p)];
            table.len[n] = table.len[usize::from(p)].saturating_add(1);
            next += 1;
        }
        if u32::from(next) + 1 >= (1 << width) && width < MAX_BITS {
            width += 1;
        }
        prev = Some(code);
    }
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// MSB-first packing of fixed-width codes; widths given per code.
    fn pack(codes: &[(u16, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc: u64 = 0;
        let mut nbits = 0;
        for &(code, width) in codes {
            acc = (acc << width) | u64::from(code);
            nbits += width;
            while nbits >= 8 {
                nbits -= 8;
                out.push((acc >> nbits) as u8);
            }
        }
        if nbits > 0 {
            out.push((acc << (8 - nbits)) as u8);
        }
        out
    }

    #[test]
    fn literals() {
        let data = pack(&[(256, 9), (1, 9), (2, 9), (3, 9), (4, 9), (257, 9)]);
        assert_eq!(decode(&data, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn kwkwk_case() {
        // "A", then 258 = "AA" (defined while decoding), then 259 = "AAA"
        let data = pack(&[(256, 9), (65, 9), (258, 9), (259, 9), (257, 9)]);
        assert_eq!(decode(&data, 6).unwrap(), vec![65; 6]);
    }

    #[test]
    fn repeated_pairs_reuse_table() {
        // ABABAB: A, B, AB(258), AB(258)... then EOI
        let data = pack(&[(256, 9), (65, 9), (66, 9), (258, 9), (258, 9), (257, 9)]);
        assert_eq!(decode(&data, 8).unwrap(), b"ABABABAB".to_vec());
    }

    #[test]
    fn output_is_capped() {
        let data = pack(&[(256, 9), (1, 9), (2, 9), (3, 9), (257, 9)]);
        assert_eq!(decode(&data, 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn code_beyond_table_is_rejected() {
        let data = pack(&[(256, 9), (1, 9), (300, 9)]);
        assert!(matches!(decode(&data, 10), Err(DngError::InvalidData(_))));
    }

    #[test]
    fn width_grows_to_ten_bits() {
        // 253 literals fill codes 258..=510; the next code is read with 10 bits.
        let mut codes = vec![(256u16, 9u32)];
        for i in 0..254u16 {
            codes.push((i, 9));
        }
        codes.push((7, 10));
        codes.push((257, 10));
        let data = pack(&codes);
        let out = decode(&data, 1000).unwrap();
        assert_eq!(out.len(), 255);
        assert_eq!(out[253], 253);
        assert_eq!(out[254], 7);
    }
}
