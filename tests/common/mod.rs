//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use zendng::{ByteOrder, DngWriter, WriteImage};

/// Native-endian samples for `bits`-bit storage, values in range for `bits`.
pub fn gradient(w: u32, h: u32, spp: u32, bits: u32) -> Vec<u8> {
    let max = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
    let n = (w * h * spp) as usize;
    let mut out = Vec::new();
    for i in 0..n as u32 {
        let v = i.wrapping_mul(2_654_435_761).rotate_left(7) & max;
        match bits {
            1..=8 => out.push(v as u8),
            9..=16 => out.extend_from_slice(&(v as u16).to_ne_bytes()),
            _ => out.extend_from_slice(&v.to_ne_bytes()),
        }
    }
    out
}

/// Native-endian f32 samples in [0, 1).
pub fn float_ramp(w: u32, h: u32, spp: u32) -> Vec<u8> {
    let n = w * h * spp;
    (0..n)
        .flat_map(|i| ((i % 251) as f32 / 251.0).to_ne_bytes())
        .collect()
}

/// 8-bit samples widened to native 16-bit storage.
pub fn widen(samples8: &[u8]) -> Vec<u8> {
    samples8
        .iter()
        .flat_map(|&v| u16::from(v).to_ne_bytes())
        .collect()
}

pub fn write_one(order: ByteOrder, image: WriteImage) -> Vec<u8> {
    DngWriter::new(order).add_image(image).write().unwrap()
}

/// Hand-assembled little-endian TIFF for malformed-file tests.
///
/// Every value must fit inline (four bytes or less).
pub struct RawTiff {
    pub bytes: Vec<u8>,
}

impl RawTiff {
    pub fn new() -> Self {
        Self {
            bytes: vec![b'I', b'I', 42, 0, 0, 0, 0, 0],
        }
    }

    /// Canon CR2 header: the "CR" marker follows the first IFD pointer.
    pub fn cr2() -> Self {
        Self {
            bytes: vec![b'I', b'I', 42, 0, 0, 0, 0, 0, b'C', b'R', 2, 0, 0, 0, 0, 0],
        }
    }

    /// Append raw bytes, word aligned; returns their offset.
    pub fn data(&mut self, bytes: &[u8]) -> u32 {
        if self.bytes.len() % 2 == 1 {
            self.bytes.push(0);
        }
        let at = self.bytes.len() as u32;
        self.bytes.extend_from_slice(bytes);
        at
    }

    /// Append an IFD of `(tag, type, count, value)` entries and return its
    /// offset. Entries are written in the given order.
    pub fn ifd(&mut self, entries: &[(u16, u16, u32, u32)], next: u32) -> u32 {
        if self.bytes.len() % 2 == 1 {
            self.bytes.push(0);
        }
        let at = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for &(tag, ty, count, value) in entries {
            self.bytes.extend_from_slice(&tag.to_le_bytes());
            self.bytes.extend_from_slice(&ty.to_le_bytes());
            self.bytes.extend_from_slice(&count.to_le_bytes());
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.bytes.extend_from_slice(&next.to_le_bytes());
        at
    }

    /// Overwrite the next-IFD pointer of the IFD at `ifd`.
    pub fn link(&mut self, ifd: u32, next: u32) {
        let at = ifd as usize;
        let count = u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]) as usize;
        let p = at + 2 + 12 * count;
        self.bytes[p..p + 4].copy_from_slice(&next.to_le_bytes());
    }

    pub fn finish(mut self, first_ifd: u32) -> Vec<u8> {
        self.bytes[4..8].copy_from_slice(&first_ifd.to_le_bytes());
        self.bytes
    }
}

pub const SHORT: u16 = 3;
pub const LONG: u16 = 4;

/// Entries of an uncompressed 8-bit gray image stored in one strip.
pub fn gray8_entries(w: u32, h: u32, strip: u32, len: u32) -> Vec<(u16, u16, u32, u32)> {
    vec![
        (256, LONG, 1, w),
        (257, LONG, 1, h),
        (258, SHORT, 1, 8),
        (259, SHORT, 1, 1),
        (262, SHORT, 1, 1),
        (273, LONG, 1, strip),
        (277, SHORT, 1, 1),
        (278, LONG, 1, h),
        (279, LONG, 1, len),
    ]
}

/// Offset just past an IFD of `entries` inline entries written at `at`.
pub fn ifd_end(at: u32, entries: usize) -> u32 {
    at + 2 + 12 * entries as u32 + 4
}

/// TIFF LZW stream of literal codes only: clear, one 9-bit code per byte,
/// then end-of-information when `end` is set.
pub fn lzw_literals(bytes: &[u8], end: bool) -> Vec<u8> {
    // Past ~250 codes the decoder switches to 10-bit codes.
    assert!(bytes.len() < 250);
    let mut codes = vec![256u16];
    codes.extend(bytes.iter().map(|&b| u16::from(b)));
    if end {
        codes.push(257);
    }
    let mut out = Vec::new();
    let (mut acc, mut nbits) = (0u32, 0u32);
    for code in codes {
        acc = (acc << 9) | u32::from(code);
        nbits += 9;
        while nbits >= 8 {
            nbits -= 8;
            out.push((acc >> nbits) as u8);
            acc &= (1 << nbits) - 1;
        }
    }
    if nbits > 0 {
        out.push((acc << (8 - nbits)) as u8);
    }
    out
}

fn jpeg_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Baseline JPEG where component `c` is `values[c]` everywhere.
///
/// Quantizers are all 1 and only DC coefficients are coded, so a decoder
/// reproduces the values up to IDCT rounding.
pub fn flat_jpeg(width: u16, height: u16, values: &[u8]) -> Vec<u8> {
    let n = values.len() as u8;
    let mut out = vec![0xFF, 0xD8];

    let mut dqt = vec![0u8];
    dqt.extend_from_slice(&[1; 64]);
    jpeg_segment(&mut out, 0xDB, &dqt);

    let mut sof = vec![8];
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.push(n);
    for c in 0..n {
        sof.extend_from_slice(&[c + 1, 0x11, 0]);
    }
    jpeg_segment(&mut out, 0xC0, &sof);

    // DC: categories 0..=11 as 4-bit codes. AC: end-of-block as "0".
    let mut dht = vec![0x00, 0, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    dht.extend(0..12u8);
    dht.extend_from_slice(&[0x10, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00]);
    jpeg_segment(&mut out, 0xC4, &dht);

    let mut sos = vec![n];
    for c in 0..n {
        sos.extend_from_slice(&[c + 1, 0x00]);
    }
    sos.extend_from_slice(&[0, 63, 0]);
    jpeg_segment(&mut out, 0xDA, &sos);

    let mut bits = JpegBits::default();
    let mut pred = vec![0i32; values.len()];
    let mcus = usize::from(width.div_ceil(8)) * usize::from(height.div_ceil(8));
    for _ in 0..mcus {
        for (c, &v) in values.iter().enumerate() {
            let dc = 8 * (i32::from(v) - 128);
            let diff = dc - pred[c];
            pred[c] = dc;
            let size = 32 - diff.unsigned_abs().leading_zeros();
            bits.put(size, 4);
            if size > 0 {
                let magnitude = if diff < 0 { diff - 1 } else { diff };
                bits.put(magnitude as u32 & ((1 << size) - 1), size);
            }
            bits.put(0, 1);
        }
    }
    out.extend_from_slice(&bits.finish());
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// MSB-first entropy coder output with 0xFF byte stuffing.
#[derive(Default)]
struct JpegBits {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl JpegBits {
    fn put(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.nbits += 1;
            if self.nbits == 8 {
                self.flush_byte();
            }
        }
    }

    fn flush_byte(&mut self) {
        let byte = self.acc as u8;
        self.out.push(byte);
        if byte == 0xFF {
            self.out.push(0);
        }
        self.acc = 0;
        self.nbits = 0;
    }

    fn finish(mut self) -> Vec<u8> {
        while self.nbits != 0 {
            self.acc = (self.acc << 1) | 1;
            self.nbits += 1;
            if self.nbits == 8 {
                self.flush_byte();
            }
        }
        self.out
    }
}
