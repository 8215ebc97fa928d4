//! Canon CR2 slice reordering.
//!
//! The sensor is stored as vertical slices, each written top to bottom
//! before the next begins. `[count, width, last_width]` describes `count`
//! slices of `width` columns followed by one of `last_width` columns.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::DngError;

/// Reorder slice-major samples into rows of `count * width + last_width`.
pub(crate) fn unslice(
    samples: &[u16],
    slices: [u16; 3],
    height: usize,
) -> Result<(usize, Vec<u16>), DngError> {
    let [count, width, last] = slices.map(usize::from);
    let out_width = count * width + last;
    let total = out_width * height;
    if out_width == 0 || samples.len() < total {
        return Err(DngError::InvalidData(format!(
            "CR2 slices {slices:?} over {height} rows need {total} samples, frame has {}",
            samples.len()
        )));
    }
    let mut out = vec![0u16; total];
    let mut src = 0;
    let widths = core::iter::repeat_n(width, count).chain(core::iter::once(last));
    let mut x = 0;
    for w in widths {
        for y in 0..height {
            let dst = y * out_width + x;
            out[dst..dst + w].copy_from_slice(&samples[src..src + w]);
            src += w;
        }
        x += w;
    }
    Ok((out_width, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_slices_and_remainder() {
        // Slices of 2, 2 and 1 columns over 2 rows.
        let stream = [1, 2, 6, 7, 3, 4, 8, 9, 5, 10];
        let (w, out) = unslice(&stream, [2, 2, 1], 2).unwrap();
        assert_eq!(w, 5);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(unslice(&[0; 9], [2, 2, 1], 2).is_err());
        assert!(unslice(&[0; 9], [0, 0, 0], 2).is_err());
    }
}
