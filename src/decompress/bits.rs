//! Sample unpacking (file representation to native storage) and the
//! matching packer used by the writer.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::DngError;
use crate::pixel::SampleType;
use crate::tiff::ByteOrder;

/// Bytes of one stored row of `samples` samples at `bits` bits each.
/// Rows always start on a byte boundary.
pub(crate) fn packed_row_bytes(samples: usize, bits: u32) -> Option<usize> {
    samples
        .checked_mul(bits as usize)
        .map(|b| b.div_ceil(8))
}

/// Convert `rows` stored rows into native `storage` samples.
///
/// 8, 16 and 32-bit samples follow the file byte order. Other depths are
/// MSB-first bit packed.
pub(crate) fn unpack(
    raw: &[u8],
    bits: u32,
    order: ByteOrder,
    row_samples: usize,
    rows: usize,
    storage: SampleType,
) -> Result<Vec<u8>, DngError> {
    let row_bytes = packed_row_bytes(row_samples, bits).ok_or(DngError::UnexpectedEof)?;
    let needed = row_bytes.checked_mul(rows).ok_or(DngError::UnexpectedEof)?;
    if raw.len() < needed {
        return Err(DngError::UnexpectedEof);
    }
    let raw = &raw[..needed];
    let out_bytes = storage.bytes();

    match bits {
        8 => return Ok(raw.to_vec()),
        16 => {
            let mut out = Vec::with_capacity(needed);
            for b in raw.chunks_exact(2) {
                out.extend_from_slice(&order.u16([b[0], b[1]]).to_ne_bytes());
            }
            return Ok(out);
        }
        32 => {
            let mut out = Vec::with_capacity(needed);
            for b in raw.chunks_exact(4) {
                out.extend_from_slice(&order.u32([b[0], b[1], b[2], b[3]]).to_ne_bytes());
            }
            return Ok(out);
        }
        _ => {}
    }

    let mut out = vec![0u8; row_samples * rows * out_bytes];
    for (row, src) in raw.chunks_exact(row_bytes.max(1)).take(rows).enumerate() {
        let mut reader = MsbReader::new(src);
        let dst = &mut out[row * row_samples * out_bytes..(row + 1) * row_samples * out_bytes];
        for d in dst.chunks_exact_mut(out_bytes) {
            let v = reader.read(bits);
            match storage {
                SampleType::U8 => d[0] = v as u8,
                SampleType::U16 => d.copy_from_slice(&(v as u16).to_ne_bytes()),
                SampleType::U32 | SampleType::F32 => d.copy_from_slice(&v.to_ne_bytes()),
            }
        }
    }
    Ok(out)
}

/// Inverse of [`unpack`]: native `storage` samples to the file representation.
pub(crate) fn pack(
    native: &[u8],
    bits: u32,
    order: ByteOrder,
    row_samples: usize,
    rows: usize,
    storage: SampleType,
) -> Vec<u8> {
    let in_bytes = storage.bytes();
    let sample = |i: usize| -> u32 {
        let b = &native[i * in_bytes..(i + 1) * in_bytes];
        match storage {
            SampleType::U8 => u32::from(b[0]),
            SampleType::U16 => u32::from(u16::from_ne_bytes([b[0], b[1]])),
            SampleType::U32 | SampleType::F32 => u32::from_ne_bytes([b[0], b[1], b[2], b[3]]),
        }
    };

    let mut out = Vec::new();
    match bits {
        8 => out.extend_from_slice(&native[..row_samples * rows]),
        16 => {
            for i in 0..row_samples * rows {
                order.put_u16(&mut out, sample(i) as u16);
            }
        }
        32 => {
            for i in 0..row_samples * rows {
                order.put_u32(&mut out, sample(i));
            }
        }
        _ => {
            for row in 0..rows {
                let mut acc: u64 = 0;
                let mut nbits = 0u32;
                for col in 0..row_samples {
                    let v = u64::from(sample(row * row_samples + col)) & ((1u64 << bits) - 1);
                    acc = (acc << bits) | v;
                    nbits += bits;
                    while nbits >= 8 {
                        nbits -= 8;
                        out.push((acc >> nbits) as u8);
                    }
                }
                if nbits > 0 {
                    out.push((acc << (8 - nbits)) as u8);
                }
            }
        }
    }
    out
}

/// MSB-first bit reader over one row. Reads past the end yield zeros.
struct MsbReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    nbits: u32,
}

impl<'a> MsbReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            nbits: 0,
        }
    }

    fn read(&mut self, bits: u32) -> u32 {
        while self.nbits < bits {
            let byte = self.data.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
            self.acc = (self.acc << 8) | u64::from(byte);
            self.nbits += 8;
        }
        self.nbits -= bits;
        let v = (self.acc >> self.nbits) & ((1u64 << bits) - 1);
        self.acc &= (1u64 << self.nbits) - 1;
        v as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16s(native: &[u8]) -> Vec<u16> {
        native
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn unpack_12bit_msb_first() {
        // 0xABC, 0x123 packed as AB C1 23
        let raw = [0xAB, 0xC1, 0x23];
        let out = unpack(&raw, 12, ByteOrder::Little, 2, 1, SampleType::U16).unwrap();
        assert_eq!(u16s(&out), [0xABC, 0x123]);
    }

    #[test]
    fn unpack_rows_start_on_byte_boundary() {
        // 3 samples of 4 bits per row: 12 bits, padded to 2 bytes
        let raw = [0x12, 0x30, 0x45, 0x60];
        let out = unpack(&raw, 4, ByteOrder::Big, 3, 2, SampleType::U8).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn unpack_16bit_follows_byte_order() {
        let raw = [0x01, 0x02];
        let le = unpack(&raw, 16, ByteOrder::Little, 1, 1, SampleType::U16).unwrap();
        let be = unpack(&raw, 16, ByteOrder::Big, 1, 1, SampleType::U16).unwrap();
        assert_eq!(u16s(&le), [0x0201]);
        assert_eq!(u16s(&be), [0x0102]);
    }

    #[test]
    fn unpack_short_input_is_eof() {
        assert!(matches!(
            unpack(&[0u8; 3], 16, ByteOrder::Little, 2, 1, SampleType::U16),
            Err(DngError::UnexpectedEof)
        ));
    }

    #[test]
    fn pack_then_unpack_packed_depths() {
        for bits in [1u32, 4, 10, 12, 14] {
            let storage = if bits <= 8 { SampleType::U8 } else { SampleType::U16 };
            let max = (1u32 << bits) - 1;
            let (cols, rows) = (5usize, 3usize);
            let mut native = Vec::new();
            for i in 0..cols * rows {
                let v = (i as u32).wrapping_mul(2_654_435_761) % (max + 1);
                match storage {
                    SampleType::U8 => native.push(v as u8),
                    _ => native.extend_from_slice(&(v as u16).to_ne_bytes()),
                }
            }
            let packed = pack(&native, bits, ByteOrder::Big, cols, rows, storage);
            assert_eq!(packed.len(), packed_row_bytes(cols, bits).unwrap() * rows);
            let back = unpack(&packed, bits, ByteOrder::Big, cols, rows, storage).unwrap();
            assert_eq!(back, native, "bits={bits}");
        }
    }
}
