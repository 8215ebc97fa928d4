use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use super::{DHT, DRI, EOI, JpegKind, RST0, RST7, SOF3, SOI, SOS, canonical_codes};
use crate::error::DngError;

/// A decoded lossless JPEG frame: `height` rows of `width * components`
/// interleaved samples.
#[derive(Clone, Debug)]
pub(crate) struct LosslessImage {
    pub width: usize,
    pub height: usize,
    pub components: usize,
    pub precision: u8,
    pub samples: Vec<u16>,
}

fn invalid(msg: &str) -> DngError {
    DngError::InvalidData(format!("lossless JPEG: {msg}"))
}

/// Classify a JPEG stream by its first SOF marker.
pub(crate) fn sniff(data: &[u8]) -> Option<JpegKind> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
        return None;
    }
    let mut pos = 2;
    loop {
        let (marker, _, next) = next_segment(data, pos).ok()??;
        match marker {
            SOF3 => return Some(JpegKind::Lossless),
            0xC0..=0xC2 => return Some(JpegKind::Dct),
            0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => return Some(JpegKind::Unsupported(marker)),
            SOS | EOI => return None,
            _ => pos = next,
        }
    }
}

/// Find the segment starting at or after `pos`: returns the marker, its
/// payload (after the length field) and the position after it.
/// Standalone markers have an empty payload.
fn next_segment(data: &[u8], mut pos: usize) -> Result<Option<(u8, &[u8], usize)>, DngError> {
    while pos < data.len() && data[pos] != 0xFF {
        pos += 1;
    }
    while pos < data.len() && data[pos] == 0xFF {
        pos += 1;
    }
    let Some(&marker) = data.get(pos) else {
        return Ok(None);
    };
    pos += 1;
    if marker == SOI || marker == EOI || (RST0..=RST7).contains(&marker) || marker == 0x01 {
        return Ok(Some((marker, &[], pos)));
    }
    let len = data
        .get(pos..pos + 2)
        .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
        .ok_or(DngError::UnexpectedEof)?;
    if len < 2 {
        return Err(invalid("segment length below 2"));
    }
    let body = data.get(pos + 2..pos + len).ok_or(DngError::UnexpectedEof)?;
    Ok(Some((marker, body, pos + len)))
}

struct Huffman {
    /// Indexed by the next `max_len` bits: (code length, category). Length 0
    /// marks an unassigned code.
    lut: Vec<(u8, u8)>,
    max_len: u8,
}

impl Huffman {
    fn build(bits: &[u8; 16], values: &[u8]) -> Result<Self, DngError> {
        let codes =
            canonical_codes(bits, values).ok_or_else(|| invalid("malformed Huffman table"))?;
        let max_len = bits
            .iter()
            .rposition(|&n| n > 0)
            .map_or(0, |i| i as u8 + 1);
        if max_len == 0 {
            return Err(invalid("empty Huffman table"));
        }
        let mut lut = vec![(0u8, 0u8); 1 << max_len];
        for &sym in values {
            if sym > 16 {
                return Err(invalid("difference category above 16"));
            }
            let (code, len) = codes[usize::from(sym)];
            let shift = max_len - len;
            let start = usize::from(code) << shift;
            for entry in &mut lut[start..start + (1 << shift)] {
                *entry = (len, sym);
            }
        }
        Ok(Self { lut, max_len })
    }
}

/// Entropy-coded segment reader: removes 0xFF00 stuffing and reads zeros
/// once a marker is reached.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    nbits: u32,
    at_marker: bool,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            nbits: 0,
            at_marker: false,
        }
    }

    fn fill(&mut self) {
        while self.nbits <= 56 {
            let mut byte = 0u8;
            if !self.at_marker {
                match self.data.get(self.pos) {
                    None => self.at_marker = true,
                    Some(0xFF) => {
                        if self.data.get(self.pos + 1) == Some(&0) {
                            byte = 0xFF;
                            self.pos += 2;
                        } else {
                            self.at_marker = true;
                        }
                    }
                    Some(&b) => {
                        byte = b;
                        self.pos += 1;
                    }
                }
            }
            self.acc = (self.acc << 8) | u64::from(byte);
            self.nbits += 8;
        }
    }

    fn peek(&mut self, n: u8) -> usize {
        if self.nbits < u32::from(n) {
            self.fill();
        }
        ((self.acc >> (self.nbits - u32::from(n))) & ((1u64 << n) - 1)) as usize
    }

    fn consume(&mut self, n: u8) {
        self.nbits -= u32::from(n);
        self.acc &= (1u64 << self.nbits) - 1;
    }

    fn bits(&mut self, n: u8) -> i32 {
        let v = self.peek(n) as i32;
        self.consume(n);
        v
    }

    fn diff(&mut self, table: &Huffman) -> Result<i32, DngError> {
        let (len, ssss) = table.lut[self.peek(table.max_len)];
        if len == 0 {
            return Err(invalid("invalid Huffman code"));
        }
        self.consume(len);
        Ok(match ssss {
            0 => 0,
            16 => 32768,
            t => {
                let v = self.bits(t);
                if v < 1 << (t - 1) { v - (1 << t) + 1 } else { v }
            }
        })
    }

    /// Skip to the RSTn marker ending this restart interval.
    fn restart(&mut self) -> Result<(), DngError> {
        self.acc = 0;
        self.nbits = 0;
        self.at_marker = false;
        while self.pos + 1 < self.data.len() {
            if self.data[self.pos] == 0xFF && (RST0..=RST7).contains(&self.data[self.pos + 1]) {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(invalid("missing restart marker"))
    }
}

struct Component {
    id: u8,
    table: usize,
}

/// Decode a complete lossless JPEG stream.
///
/// `max_samples` bounds the frame before its buffer is allocated.
pub(crate) fn decode(data: &[u8], max_samples: usize) -> Result<LosslessImage, DngError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(invalid("missing SOI marker"));
    }
    let mut tables: [Option<Huffman>; 4] = [None, None, None, None];
    let mut frame: Option<(u8, usize, usize, Vec<u8>)> = None;
    let mut restart_interval = 0usize;
    let mut pos = 2;

    loop {
        let (marker, body, next) = next_segment(data, pos)?.ok_or(DngError::UnexpectedEof)?;
        pos = next;
        match marker {
            DHT => {
                let mut b = body;
                while !b.is_empty() {
                    if b.len() < 17 {
                        return Err(DngError::UnexpectedEof);
                    }
                    let id = usize::from(b[0] & 0x0F);
                    let mut counts = [0u8; 16];
                    counts.copy_from_slice(&b[1..17]);
                    let n: usize = counts.iter().map(|&c| usize::from(c)).sum();
                    let values = b.get(17..17 + n).ok_or(DngError::UnexpectedEof)?;
                    if id > 3 {
                        return Err(invalid("Huffman table id above 3"));
                    }
                    tables[id] = Some(Huffman::build(&counts, values)?);
                    b = &b[17 + n..];
                }
            }
            SOF3 => {
                if body.len() < 6 {
                    return Err(DngError::UnexpectedEof);
                }
                let precision = body[0];
                let height = usize::from(u16::from_be_bytes([body[1], body[2]]));
                let width = usize::from(u16::from_be_bytes([body[3], body[4]]));
                let count = usize::from(body[5]);
                if !(2..=16).contains(&precision) {
                    return Err(invalid("precision outside 2..=16"));
                }
                if !(1..=4).contains(&count) || body.len() < 6 + 3 * count {
                    return Err(invalid("component count outside 1..=4"));
                }
                let ids = (0..count).map(|i| body[6 + 3 * i]).collect();
                frame = Some((precision, width, height, ids));
            }
            0xC0..=0xC2 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(DngError::Unsupported(format!(
                    "JPEG frame type 0x{marker:02X} is not lossless Huffman"
                )));
            }
            DRI => {
                if body.len() < 2 {
                    return Err(DngError::UnexpectedEof);
                }
                restart_interval = usize::from(u16::from_be_bytes([body[0], body[1]]));
            }
            SOS => {
                let (precision, width, height, ids) = frame
                    .take()
                    .ok_or_else(|| invalid("scan before frame header"))?;
                let ns = usize::from(*body.first().ok_or(DngError::UnexpectedEof)?);
                if ns != ids.len() || body.len() < 1 + 2 * ns + 3 {
                    return Err(DngError::Unsupported(
                        "lossless JPEG with non-interleaved scans".into(),
                    ));
                }
                let mut comps = Vec::with_capacity(ns);
                for i in 0..ns {
                    let id = body[1 + 2 * i];
                    let table = usize::from(body[2 + 2 * i] >> 4);
                    if table > 3 || tables[table].is_none() {
                        return Err(invalid("scan references a missing Huffman table"));
                    }
                    comps.push(Component { id, table });
                }
                let predictor = body[1 + 2 * ns];
                let point_transform = body[3 + 2 * ns] & 0x0F;
                if !(1..=7).contains(&predictor) {
                    return Err(invalid("predictor outside 1..=7"));
                }
                if point_transform >= precision {
                    return Err(invalid("point transform exceeds precision"));
                }
                for (c, id) in comps.iter().zip(&ids) {
                    if c.id != *id {
                        log::trace!("scan component id {} differs from frame id {id}", c.id);
                    }
                }
                let total = width
                    .checked_mul(height)
                    .and_then(|n| n.checked_mul(ns))
                    .ok_or_else(|| invalid("frame too large"))?;
                if total > max_samples {
                    return Err(DngError::LimitExceeded(format!(
                        "lossless JPEG frame {width}x{height}x{ns} exceeds {max_samples} samples"
                    )));
                }
                let scan = Scan {
                    width,
                    height,
                    precision,
                    predictor,
                    point_transform,
                    restart_interval,
                };
                let samples = scan.decode(data, pos, &comps, &tables)?;
                return Ok(LosslessImage {
                    width,
                    height,
                    components: ns,
                    precision,
                    samples,
                });
            }
            EOI => return Err(invalid("no scan before EOI")),
            _ => {}
        }
    }
}

struct Scan {
    width: usize,
    height: usize,
    precision: u8,
    predictor: u8,
    point_transform: u8,
    restart_interval: usize,
}

impl Scan {
    fn decode(
        &self,
        data: &[u8],
        pos: usize,
        comps: &[Component],
        tables: &[Option<Huffman>; 4],
    ) -> Result<Vec<u16>, DngError> {
        let nc = comps.len();
        let row_len = self.width * nc;
        let mut out = vec![0u16; row_len * self.height];
        let mut bits = BitReader::new(data, pos);
        let initial = 1i32 << (self.precision - self.point_transform - 1);
        let huff: Vec<&Huffman> = comps
            .iter()
            .filter_map(|c| tables[c.table].as_ref())
            .collect();

        let mut reset = (0usize, 0usize);
        let mut mcus = 0usize;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.restart_interval > 0 && mcus > 0 && mcus % self.restart_interval == 0 {
                    bits.restart()?;
                    reset = (x, y);
                }
                mcus += 1;
                for c in 0..nc {
                    let diff = bits.diff(huff[c])?;
                    let at = y * row_len + x * nc + c;
                    let ra = || i32::from(out[at - nc]);
                    let rb = || i32::from(out[at - row_len]);
                    let pred = if (x, y) == reset {
                        initial
                    } else if y == reset.1 {
                        ra()
                    } else if x == 0 {
                        rb()
                    } else {
                        let (a, b, cc) = (ra(), rb(), i32::from(out[at - row_len - nc]));
                        match self.predictor {
                            1 => a,
                            2 => b,
                            3 => cc,
                            4 => a + b - cc,
                            5 => a + ((b - cc) >> 1),
                            6 => b + ((a - cc) >> 1),
                            _ => (a + b) >> 1,
                        }
                    };
                    out[at] = (pred + diff) as u16;
                }
            }
        }
        if self.point_transform > 0 {
            for v in &mut out {
                *v <<= self.point_transform;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ljpeg::encode;

    fn gradient(w: usize, h: usize, nc: usize, bits: u32) -> Vec<u16> {
        let max = (1u32 << bits) - 1;
        (0..w * h * nc)
            .map(|i| {
                let x = (i / nc) % w;
                let y = (i / nc) / w;
                (((x * 37 + y * 91 + (i % nc) * 13) as u32 * 257) % (max + 1)) as u16
            })
            .collect()
    }

    #[test]
    fn sniff_detects_sof3() {
        let enc = encode(&[1, 2, 3, 4], 2, 2, 1, 12, 1).unwrap();
        assert_eq!(sniff(&enc), Some(JpegKind::Lossless));
        assert_eq!(sniff(b"not a jpeg"), None);
        let baseline = [0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x02];
        assert_eq!(sniff(&baseline), Some(JpegKind::Dct));
    }

    #[test]
    fn every_predictor_roundtrips() {
        let samples = gradient(9, 7, 1, 14);
        for predictor in 1..=7u8 {
            let enc = encode(&samples, 9, 7, 1, 14, predictor).unwrap();
            let dec = decode(&enc, usize::MAX).unwrap();
            assert_eq!((dec.width, dec.height, dec.components), (9, 7, 1));
            assert_eq!(dec.samples, samples, "predictor {predictor}");
        }
    }

    #[test]
    fn multi_component_interleaved() {
        let samples = gradient(5, 4, 2, 16);
        let enc = encode(&samples, 5, 4, 2, 16, 6).unwrap();
        let dec = decode(&enc, usize::MAX).unwrap();
        assert_eq!(dec.components, 2);
        assert_eq!(dec.samples, samples);
    }

    #[test]
    fn full_range_16bit_uses_category_16() {
        let samples = vec![0u16, 32768, 0, 65535, 1, 32769];
        let enc = encode(&samples, 6, 1, 1, 16, 1).unwrap();
        assert_eq!(decode(&enc, usize::MAX).unwrap().samples, samples);
    }

    #[test]
    fn max_samples_is_enforced() {
        let enc = encode(&gradient(8, 8, 1, 12), 8, 8, 1, 12, 1).unwrap();
        assert!(matches!(decode(&enc, 63), Err(DngError::LimitExceeded(_))));
    }

    #[test]
    fn rejects_missing_soi_and_truncation() {
        assert!(decode(&[0x00, 0x01], usize::MAX).is_err());
        let enc = encode(&gradient(4, 4, 1, 12), 4, 4, 1, 12, 1).unwrap();
        assert!(decode(&enc[..10], usize::MAX).is_err());
    }
}
