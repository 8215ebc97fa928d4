//! Netpbm export of decoded images: P5, P6, P7, PFM.

use alloc::format;
use alloc::vec::Vec;

use enough::Stop;

use crate::error::DngError;
use crate::image::DngImage;
use crate::pixel::SampleType;

/// Write a decoded image as PGM (1 channel), PPM (3 channels) or PAM,
/// or PFM for 32-bit float samples.
///
/// 16-bit samples are written big-endian with maxval
/// `min(white_level[0], 65535)`. 32-bit integer samples are not supported.
pub fn encode_pnm(image: &DngImage<'_>, stop: impl Stop) -> Result<Vec<u8>, DngError> {
    let stop: &dyn Stop = &stop;
    if !image.has_pixels() {
        return Err(DngError::InvalidData(format!(
            "IFD at {}: no decoded pixels to export",
            image.ifd_offset
        )));
    }
    let (width, height) = (image.width, image.height);
    let w = width as usize;
    let h = height as usize;
    let channels = image.samples_per_pixel as usize;
    let sample = image.sample_type();
    let row_bytes = w
        .checked_mul(channels)
        .and_then(|n| n.checked_mul(sample.bytes()))
        .ok_or(DngError::DimensionsTooLarge { width, height })?;
    let expected = row_bytes
        .checked_mul(h)
        .ok_or(DngError::DimensionsTooLarge { width, height })?;
    let pixels = image.pixels();
    if pixels.len() < expected {
        return Err(DngError::BufferTooSmall {
            needed: expected,
            actual: pixels.len(),
        });
    }

    stop.check()?;

    match sample {
        SampleType::F32 => encode_pfm(pixels, width, height, channels, row_bytes, stop),
        SampleType::U8 | SampleType::U16 => {
            let maxval = if sample == SampleType::U8 {
                255
            } else {
                image.white_level[0].clamp(1, 65535)
            };
            let header = match channels {
                1 => format!("P5\n{width} {height}\n{maxval}\n"),
                3 => format!("P6\n{width} {height}\n{maxval}\n"),
                _ => {
                    let tupltype = match channels {
                        2 => "GRAYSCALE_ALPHA",
                        _ => "RGB_ALPHA",
                    };
                    format!(
                        "P7\nWIDTH {width}\nHEIGHT {height}\nDEPTH {channels}\n\
                             MAXVAL {maxval}\nTUPLTYPE {tupltype}\nENDHDR\n"
                    )
                }
            };
            let mut out = Vec::with_capacity(header.len() + expected);
            out.extend_from_slice(header.as_bytes());
            if sample == SampleType::U8 {
                out.extend_from_slice(&pixels[..expected]);
                return Ok(out);
            }
            for (row, src) in pixels[..expected].chunks_exact(row_bytes.max(1)).enumerate() {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for b in src.chunks_exact(2) {
                    let v = u16::from_ne_bytes([b[0], b[1]]).min(maxval as u16);
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Ok(out)
        }
        SampleType::U32 => Err(DngError::Unsupported(
            "PNM export of 32-bit integer samples".into(),
        )),
    }
}

fn encode_pfm(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    row_bytes: usize,
    stop: &dyn Stop,
) -> Result<Vec<u8>, DngError> {
    let magic = match channels {
        1 => "Pf",
        3 => "PF",
        _ => {
            return Err(DngError::Unsupported(format!(
                "PFM requires 1 or 3 channels, got {channels}"
            )));
        }
    };

    let header = format!("{magic}\n{width} {height}\n-1.0\n");
    let h = height as usize;
    let mut out = Vec::with_capacity(header.len().saturating_add(row_bytes * h));
    out.extend_from_slice(header.as_bytes());

    // PFM stores bottom-to-top, little-endian for a negative scale
    for row in (0..h).rev() {
        if row % 16 == 0 {
            stop.check()?;
        }
        let start = row * row_bytes;
        for b in pixels[start..start + row_bytes].chunks_exact(4) {
            let v = f32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    Ok(out)
}
