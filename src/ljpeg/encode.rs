use alloc::format;
use alloc::vec::Vec;

use super::{DEFAULT_BITS, DEFAULT_VALUES, DHT, EOI, SOF3, SOI, SOS, canonical_codes};
use crate::error::DngError;

struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl BitWriter {
    fn put(&mut self, value: u32, bits: u8) {
        if bits == 0 {
            return;
        }
        self.acc = (self.acc << bits) | (value & ((1 << bits) - 1));
        self.nbits += u32::from(bits);
        while self.nbits >= 8 {
            self.nbits -= 8;
            let byte = (self.acc >> self.nbits) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0);
            }
        }
        self.acc &= (1 << self.nbits) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            let pad = 8 - self.nbits as u8;
            self.put((1 << pad) - 1, pad);
        }
        self.out
    }
}

fn segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

/// Encode interleaved samples as a single-scan lossless JPEG using the
/// default Huffman table for every component.
pub(crate) fn encode(
    samples: &[u16],
    width: u16,
    height: u16,
    components: u8,
    precision: u8,
    predictor: u8,
) -> Result<Vec<u8>, DngError> {
    if !(2..=16).contains(&precision) {
        return Err(DngError::InvalidData(format!(
            "lossless JPEG precision {precision} outside 2..=16"
        )));
    }
    if !(1..=4).contains(&components) || !(1..=7).contains(&predictor) {
        return Err(DngError::InvalidData(format!(
            "lossless JPEG: {components} components, predictor {predictor}"
        )));
    }
    let (w, h, nc) = (usize::from(width), usize::from(height), usize::from(components));
    let row_len = w * nc;
    if samples.len() < row_len * h {
        return Err(DngError::BufferTooSmall {
            needed: row_len * h,
            actual: samples.len(),
        });
    }
    let codes = canonical_codes(&DEFAULT_BITS, &DEFAULT_VALUES)
        .ok_or_else(|| DngError::InvalidData("default Huffman table".into()))?;

    let mut out = Vec::with_capacity(samples.len() + 64);
    out.extend_from_slice(&[0xFF, SOI]);

    let mut dht = Vec::with_capacity(1 + 16 + DEFAULT_VALUES.len());
    dht.push(0x00);
    dht.extend_from_slice(&DEFAULT_BITS);
    dht.extend_from_slice(&DEFAULT_VALUES);
    segment(&mut out, DHT, &dht);

    let mut sof = Vec::with_capacity(6 + 3 * nc);
    sof.push(precision);
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.push(components);
    for c in 0..components {
        sof.extend_from_slice(&[c + 1, 0x11, 0]);
    }
    segment(&mut out, SOF3, &sof);

    let mut sos = Vec::with_capacity(4 + 2 * nc);
    sos.push(components);
    for c in 0..components {
        sos.extend_from_slice(&[c + 1, 0x00]);
    }
    sos.extend_from_slice(&[predictor, 0, 0]);
    segment(&mut out, SOS, &sos);

    let mask = if precision == 16 { 0xFFFF } else { (1i32 << precision) - 1 };
    let initial = 1i32 << (precision - 1);
    let mut bits = BitWriter {
        out,
        acc: 0,
        nbits: 0,
    };
    let px = |at: usize| i32::from(samples[at]) & mask;
    for y in 0..h {
        for x in 0..w {
            for c in 0..nc {
                let at = y * row_len + x * nc + c;
                let pred = if x == 0 && y == 0 {
                    initial
                } else if y == 0 {
                    px(at - nc)
                } else if x == 0 {
                    px(at - row_len)
                } else {
                    let (a, b, cc) = (px(at - nc), px(at - row_len), px(at - row_len - nc));
                    match predictor {
                        1 => a,
                        2 => b,
                        3 => cc,
                        4 => a + b - cc,
                        5 => a + ((b - cc) >> 1),
                        6 => b + ((a - cc) >> 1),
                        _ => (a + b) >> 1,
                    }
                };
                let diff = i32::from((px(at) - pred) as i16);
                if diff == -32768 {
                    let (code, len) = codes[16];
                    bits.put(u32::from(code), len);
                    continue;
                }
                let ssss = (32 - diff.unsigned_abs().leading_zeros()) as u8;
                let (code, len) = codes[usize::from(ssss)];
                bits.put(u32::from(code), len);
                let extra = if diff < 0 { diff - 1 } else { diff };
                bits.put(extra as u32, ssss);
            }
        }
    }
    let mut out = bits.finish();
    out.extend_from_slice(&[0xFF, EOI]);
    Ok(out)
}
