//! TIFF predictors: horizontal differencing (2) and floating point (3).

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::DngError;
use crate::pixel::SampleType;

/// Undo horizontal differencing on native samples, in place.
///
/// `stride` is the number of interleaved samples per pixel.
pub(crate) fn undo_horizontal(
    samples: &mut [u8],
    storage: SampleType,
    row_samples: usize,
    stride: usize,
) {
    let bytes = storage.bytes();
    let row_bytes = row_samples * bytes;
    if row_bytes == 0 {
        return;
    }
    for row in samples.chunks_exact_mut(row_bytes) {
        match storage {
            SampleType::U8 => {
                for i in stride..row_samples {
                    row[i] = row[i].wrapping_add(row[i - stride]);
                }
            }
            SampleType::U16 => {
                for i in stride..row_samples {
                    let l = (i - stride) * 2;
                    let left = u16::from_ne_bytes([row[l], row[l + 1]]);
                    let cur = u16::from_ne_bytes([row[i * 2], row[i * 2 + 1]]);
                    row[i * 2..i * 2 + 2].copy_from_slice(&cur.wrapping_add(left).to_ne_bytes());
                }
            }
            SampleType::U32 | SampleType::F32 => {
                for i in stride..row_samples {
                    let l = (i - stride) * 4;
                    let left = u32::from_ne_bytes([row[l], row[l + 1], row[l + 2], row[l + 3]]);
                    let c = i * 4;
                    let cur = u32::from_ne_bytes([row[c], row[c + 1], row[c + 2], row[c + 3]]);
                    row[c..c + 4].copy_from_slice(&cur.wrapping_add(left).to_ne_bytes());
                }
            }
        }
    }
}

/// Apply horizontal differencing to native samples, in place (writer side).
pub(crate) fn apply_horizontal(
    samples: &mut [u8],
    storage: SampleType,
    row_samples: usize,
    stride: usize,
) {
    let bytes = storage.bytes();
    let row_bytes = row_samples * bytes;
    if row_bytes == 0 {
        return;
    }
    for row in samples.chunks_exact_mut(row_bytes) {
        for i in (stride..row_samples).rev() {
            match storage {
                SampleType::U8 => row[i] = row[i].wrapping_sub(row[i - stride]),
                SampleType::U16 => {
                    let l = (i - stride) * 2;
                    let left = u16::from_ne_bytes([row[l], row[l + 1]]);
                    let cur = u16::from_ne_bytes([row[i * 2], row[i * 2 + 1]]);
                    row[i * 2..i * 2 + 2].copy_from_slice(&cur.wrapping_sub(left).to_ne_bytes());
                }
                SampleType::U32 | SampleType::F32 => {
                    let l = (i - stride) * 4;
                    let left = u32::from_ne_bytes([row[l], row[l + 1], row[l + 2], row[l + 3]]);
                    let c = i * 4;
                    let cur = u32::from_ne_bytes([row[c], row[c + 1], row[c + 2], row[c + 3]]);
                    row[c..c + 4].copy_from_slice(&cur.wrapping_sub(left).to_ne_bytes());
                }
            }
        }
    }
}

/// Undo the floating point predictor for 32-bit IEEE samples.
///
/// Each row holds the byte planes of its samples, most significant plane
/// first, byte-differenced across the whole row. Returns native f32 bytes.
pub(crate) fn undo_floating_point(
    raw: &[u8],
    row_samples: usize,
    rows: usize,
    stride: usize,
) -> Result<Vec<u8>, DngError> {
    let row_bytes = row_samples * 4;
    let needed = row_bytes * rows;
    if raw.len() < needed {
        return Err(DngError::InvalidData(format!(
            "floating point predictor: {} bytes, need {needed}",
            raw.len()
        )));
    }
    let mut out = vec![0u8; needed];
    let mut row = vec![0u8; row_bytes];
    for r in 0..rows {
        row.copy_from_slice(&raw[r * row_bytes..(r + 1) * row_bytes]);
        for i in stride..row_bytes {
            row[i] = row[i].wrapping_add(row[i - stride]);
        }
        let dst = &mut out[r * row_bytes..(r + 1) * row_bytes];
        for s in 0..row_samples {
            let be = [
                row[s],
                row[row_samples + s],
                row[2 * row_samples + s],
                row[3 * row_samples + s],
            ];
            dst[s * 4..s * 4 + 4].copy_from_slice(&u32::from_be_bytes(be).to_ne_bytes());
        }
    }
    Ok(out)
}

/// Inverse of [`undo_floating_point`] (writer side).
pub(crate) fn apply_floating_point(
    native: &[u8],
    row_samples: usize,
    rows: usize,
    stride: usize,
) -> Vec<u8> {
    let row_bytes = row_samples * 4;
    let mut out = vec![0u8; row_bytes * rows];
    for r in 0..rows {
        let src = &native[r * row_bytes..(r + 1) * row_bytes];
        let row = &mut out[r * row_bytes..(r + 1) * row_bytes];
        for s in 0..row_samples {
            let b = &src[s * 4..s * 4 + 4];
            let be = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]).to_be_bytes();
            for (plane, b) in be.iter().enumerate() {
                row[plane * row_samples + s] = *b;
            }
        }
        for i in (stride..row_bytes).rev() {
            row[i] = row[i].wrapping_sub(row[i - stride]);
        }
    }
    out
}
