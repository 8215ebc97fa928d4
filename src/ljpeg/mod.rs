//! Lossless JPEG (ITU T.81 process 14, SOF3), the codec behind DNG
//! compression 7 and Canon CR2 raw data.

mod decode;
mod encode;

pub(crate) use decode::{decode, sniff};
pub(crate) use encode::encode;

/// What the first SOF marker of a JPEG stream says it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JpegKind {
    /// SOF3: lossless Huffman.
    Lossless,
    /// Any DCT frame (baseline, extended, progressive).
    Dct,
    /// Arithmetic or hierarchical lossless frames.
    Unsupported(u8),
}

// Markers
pub(crate) const SOI: u8 = 0xD8;
pub(crate) const EOI: u8 = 0xD9;
pub(crate) const SOF3: u8 = 0xC3;
pub(crate) const DHT: u8 = 0xC4;
pub(crate) const SOS: u8 = 0xDA;
pub(crate) const DRI: u8 = 0xDD;
pub(crate) const RST0: u8 = 0xD0;
pub(crate) const RST7: u8 = 0xD7;

/// Canonical Huffman table over the 17 difference categories, used by the
/// encoder. 14 four-bit codes and 3 five-bit codes; the all-ones code stays free.
pub(crate) const DEFAULT_BITS: [u8; 16] = [0, 0, 0, 14, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
pub(crate) const DEFAULT_VALUES: [u8; 17] =
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Build canonical (code, length) pairs indexed by symbol.
pub(crate) fn canonical_codes(bits: &[u8; 16], values: &[u8]) -> Option<[(u16, u8); 256]> {
    let mut codes = [(0u16, 0u8); 256];
    let mut code: u32 = 0;
    let mut k = 0usize;
    for (i, &count) in bits.iter().enumerate() {
        let len = i as u8 + 1;
        for _ in 0..count {
            if code >= (1u32 << len) {
                return None;
            }
            let sym = *values.get(k)?;
            codes[usize::from(sym)] = (code as u16, len);
            code += 1;
            k += 1;
        }
        code <<= 1;
    }
    Some(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_canonical() {
        let codes = canonical_codes(&DEFAULT_BITS, &DEFAULT_VALUES).unwrap();
        assert_eq!(codes[0], (0b0000, 4));
        assert_eq!(codes[13], (0b1101, 4));
        assert_eq!(codes[14], (0b11100, 5));
        assert_eq!(codes[16], (0b11110, 5));
    }

    #[test]
    fn overfull_table_is_rejected() {
        let mut bits = [0u8; 16];
        bits[0] = 3;
        assert!(canonical_codes(&bits, &[0, 1, 2]).is_none());
    }
}
