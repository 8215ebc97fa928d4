//! Pixel decoding for one image: strip and tile layout, decompression,
//! predictors and placement into the output buffer.

mod bits;
mod cr2;
#[cfg(feature = "deflate")]
mod deflate;
#[cfg(feature = "jpeg")]
mod jpeg;
mod lzw;
mod predictor;

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

pub(crate) use bits::{pack, packed_row_bytes};
#[cfg(feature = "deflate")]
pub(crate) use deflate::encode as deflate_encode;
pub(crate) use predictor::{apply_floating_point, apply_horizontal};

use crate::error::{DngError, warn};
use crate::image::DngImage;
use crate::limits::Limits;
use crate::ljpeg::{self, JpegKind};
use crate::pixel::{SampleFormat, SampleType};
use crate::tiff::ByteOrder;
use crate::tiff::tags::Compression;

const PREDICTOR_NONE: u16 = 1;
const PREDICTOR_HORIZONTAL: u16 = 2;
const PREDICTOR_FLOATING_POINT: u16 = 3;

/// One strip or tile: where its bytes are and where its samples land.
#[derive(Clone, Copy, Debug)]
struct Chunk {
    offset: u32,
    len: u32,
    /// Sample plane for planar configuration 2, otherwise 0.
    plane: usize,
    x: u32,
    y: u32,
    /// Stored columns and rows. Tiles may extend past the image edge.
    width: u32,
    rows: u32,
}

/// Image geometry shared by every chunk.
#[derive(Clone, Copy)]
struct Geometry {
    width: usize,
    height: usize,
    spp: usize,
    planar: bool,
    bytes: usize,
}

impl Geometry {
    fn of(image: &DngImage<'_>) -> Self {
        Self {
            width: image.width as usize,
            height: image.height as usize,
            spp: image.samples_per_pixel as usize,
            planar: image.planar_configuration == 2 && image.samples_per_pixel > 1,
            bytes: image.sample_type().bytes(),
        }
    }

    /// Interleaved samples per stored pixel of a chunk.
    fn chunk_spp(&self) -> usize {
        if self.planar { 1 } else { self.spp }
    }
}

fn check_output(image: &DngImage<'_>, limits: Option<&Limits>) -> Result<usize, DngError> {
    let len = image.output_len()?;
    if let Some(limits) = limits {
        limits.check(image.width, image.height)?;
        limits.check_memory(len)?;
    }
    Ok(len)
}

/// Decode the samples of `image` from `data`, the whole file.
///
/// On success the image holds native-endian samples and `bits_per_sample`
/// is the storage depth.
pub(crate) fn decode_image<'a>(
    data: &'a [u8],
    image: &mut DngImage<'a>,
    order: ByteOrder,
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
    stop: &dyn Stop,
) -> Result<(), DngError> {
    let no_chunks = image.strip_offsets.is_empty() && image.tile_offsets.is_empty();
    if image.compression == Compression::None && image.jpeg_byte_count > 0 && no_chunks {
        log::debug!(
            "IFD at {}: CR2 thumbnail pointer, reported without pixels",
            image.ifd_offset
        );
        image.width = 0;
        image.height = 0;
        return Ok(());
    }

    match image.compression {
        Compression::None | Compression::Lzw | Compression::Deflate => {
            if image.sample_format == SampleFormat::Float && image.bits_per_sample != 32 {
                return Err(DngError::Unsupported(format!(
                    "{}-bit floating point samples",
                    image.bits_per_sample
                )));
            }
            decode_chunked(data, image, order, limits, warnings, stop)
        }
        Compression::OldJpeg | Compression::Jpeg | Compression::LossyJpeg => {
            decode_jpeg(data, image, limits, warnings, stop)
        }
        other => Err(DngError::UnsupportedCompression(other.code())),
    }
}

/// Strip or tile list, validated against the image geometry.
fn chunks(image: &DngImage<'_>, data_len: usize) -> Result<Vec<Chunk>, DngError> {
    let at = image.ifd_offset;
    if image.width == 0 || image.height == 0 {
        return Err(DngError::InvalidIfd(format!(
            "IFD at {at}: {}x{} image has strips or tiles",
            image.width, image.height
        )));
    }
    let geo = Geometry::of(image);
    let planes = if geo.planar { geo.spp } else { 1 };

    let (offsets, counts, cw, ch) = match (image.tile_width, image.tile_length) {
        (Some(tw), Some(tl)) if !image.tile_offsets.is_empty() => {
            if tw == 0 || tl == 0 {
                return Err(DngError::InvalidIfd(format!("IFD at {at}: zero tile size")));
            }
            (&image.tile_offsets, &image.tile_byte_counts, tw, tl)
        }
        _ => (
            &image.strip_offsets,
            &image.strip_byte_counts,
            image.width,
            image.rows_per_strip.max(1),
        ),
    };
    let across = image.width.div_ceil(cw) as usize;
    let down = image.height.div_ceil(ch) as usize;
    let expected = across
        .checked_mul(down)
        .and_then(|n| n.checked_mul(planes))
        .ok_or(DngError::DimensionsTooLarge {
            width: image.width,
            height: image.height,
        })?;
    if offsets.len() < expected {
        return Err(DngError::InvalidData(format!(
            "IFD at {at}: {} chunk offsets, layout needs {expected}",
            offsets.len()
        )));
    }
    if offsets.len() > expected {
        log::trace!("IFD at {at}: ignoring {} extra chunk offsets", offsets.len() - expected);
    }
    let counts: Vec<u32> = if counts.len() >= expected {
        counts[..expected].to_vec()
    } else if expected == 1 {
        let off = offsets[0] as usize;
        vec![data_len.saturating_sub(off) as u32]
    } else {
        return Err(DngError::InvalidData(format!(
            "IFD at {at}: {} chunk byte counts for {expected} chunks",
            counts.len()
        )));
    };

    let mut out = Vec::with_capacity(expected);
    for plane in 0..planes {
        for row in 0..down {
            for col in 0..across {
                let i = plane * across * down + row * across + col;
                let y = row as u32 * ch;
                let is_strip = cw == image.width;
                out.push(Chunk {
                    offset: offsets[i],
                    len: counts[i],
                    plane,
                    x: col as u32 * cw,
                    y,
                    width: cw,
                    // The last strip only stores the remaining rows.
                    rows: if is_strip { ch.min(image.height - y) } else { ch },
                });
            }
        }
    }
    Ok(out)
}

/// Bytes of one chunk. A length running past the end of the file is clipped.
fn chunk_bytes<'a>(
    data: &'a [u8],
    chunk: &Chunk,
    warnings: &mut Vec<String>,
) -> Result<&'a [u8], DngError> {
    let start = chunk.offset as usize;
    if start > data.len() {
        return Err(DngError::UnexpectedEof);
    }
    let end = start.saturating_add(chunk.len as usize);
    if end > data.len() {
        warn(
            warnings,
            format!(
                "chunk at {start}: {} bytes declared, {} available",
                chunk.len,
                data.len() - start
            ),
        );
    }
    Ok(&data[start..end.min(data.len())])
}

fn decode_chunked<'a>(
    data: &'a [u8],
    image: &mut DngImage<'a>,
    order: ByteOrder,
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
    stop: &dyn Stop,
) -> Result<(), DngError> {
    let out_len = check_output(image, limits)?;
    if out_len == 0 {
        return Ok(());
    }
    let chunks = chunks(image, data.len())?;
    let geo = Geometry::of(image);
    let storage = image.sample_type();

    if let Some(pixels) = borrow_contiguous(data, image, &chunks, out_len) {
        log::debug!("IFD at {}: zero-copy {} bytes", image.ifd_offset, pixels.len());
        image.set_pixels(Cow::Borrowed(pixels));
        image.bits_per_sample = storage.bits();
        return Ok(());
    }

    let mut out = vec![0u8; out_len];
    for chunk in &chunks {
        stop.check()?;
        let raw = chunk_bytes(data, chunk, warnings)?;
        let row_samples = chunk.width as usize * geo.chunk_spp();
        let rows = chunk.rows as usize;
        log::trace!("chunk {chunk:?}: {} bytes", raw.len());
        let samples = decode_chunk(image, order, raw, row_samples, rows, storage, warnings)?;
        place(&mut out, geo, chunk, &samples, stop)?;
    }
    image.set_pixels(Cow::Owned(out));
    image.bits_per_sample = storage.bits();
    Ok(())
}

/// Uncompressed 8-bit strips laid out back to back can be used in place.
fn borrow_contiguous<'a>(
    data: &'a [u8],
    image: &DngImage<'_>,
    chunks: &[Chunk],
    out_len: usize,
) -> Option<&'a [u8]> {
    let tiled = image.tile_width.is_some() && !image.tile_offsets.is_empty();
    if image.compression != Compression::None
        || image.bits_per_sample != 8
        || tiled
        || Geometry::of(image).planar
    {
        return None;
    }
    let row_bytes = image.width as usize * image.samples_per_pixel as usize;
    let mut next = chunks.first()?.offset as usize;
    let start = next;
    for chunk in chunks {
        let size = chunk.rows as usize * row_bytes;
        if chunk.offset as usize != next || (chunk.len as usize) < size {
            return None;
        }
        next += size;
    }
    data.get(start..start.checked_add(out_len)?)
}

/// Decompress one chunk to native `storage` samples, predictor undone.
fn decode_chunk(
    image: &DngImage<'_>,
    order: ByteOrder,
    raw: &[u8],
    row_samples: usize,
    rows: usize,
    storage: SampleType,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>, DngError> {
    let bits = image.bits_per_sample;
    if image.compression == Compression::None {
        return bits::unpack(raw, bits, order, row_samples, rows, storage);
    }

    let row_bytes = packed_row_bytes(row_samples, bits).ok_or(DngError::DimensionsTooLarge {
        width: image.width,
        height: image.height,
    })?;
    let expected = row_bytes * rows;
    let mut inflated = match image.compression {
        Compression::Lzw => lzw::decode(raw, expected)?,
        #[cfg(feature = "deflate")]
        Compression::Deflate => deflate::decode(raw, expected)?,
        #[cfg(not(feature = "deflate"))]
        Compression::Deflate => {
            return Err(DngError::Unsupported(
                "Deflate compression (enable the `deflate` feature)".into(),
            ));
        }
        other => return Err(DngError::UnsupportedCompression(other.code())),
    };
    if inflated.len() < expected {
        warn(
            warnings,
            format!(
                "IFD at {}: chunk decompressed to {} of {expected} bytes, zero padded",
                image.ifd_offset,
                inflated.len()
            ),
        );
        inflated.resize(expected, 0);
    }

    let stride = if Geometry::of(image).planar { 1 } else { image.samples_per_pixel as usize };
    match image.predictor {
        PREDICTOR_NONE => bits::unpack(&inflated, bits, order, row_samples, rows, storage),
        PREDICTOR_HORIZONTAL => {
            if !matches!(bits, 8 | 16 | 32) {
                return Err(DngError::Unsupported(format!(
                    "horizontal predictor on {bits}-bit samples"
                )));
            }
            let mut samples = bits::unpack(&inflated, bits, order, row_samples, rows, storage)?;
            predictor::undo_horizontal(&mut samples, storage, row_samples, stride);
            Ok(samples)
        }
        PREDICTOR_FLOATING_POINT => {
            if storage != SampleType::F32 {
                return Err(DngError::InvalidData(format!(
                    "floating point predictor on {bits}-bit {:?} samples",
                    image.sample_format
                )));
            }
            predictor::undo_floating_point(&inflated, row_samples, rows, stride)
        }
        p @ (34894 | 34895) => Err(DngError::Unsupported(format!("predictor {p}"))),
        p => Err(DngError::InvalidData(format!("unknown predictor {p}"))),
    }
}

/// Copy a decoded chunk into the image, clipping at the right and bottom edges.
fn place(
    out: &mut [u8],
    geo: Geometry,
    chunk: &Chunk,
    samples: &[u8],
    stop: &dyn Stop,
) -> Result<(), DngError> {
    let (x0, y0) = (chunk.x as usize, chunk.y as usize);
    if x0 >= geo.width || y0 >= geo.height {
        return Ok(());
    }
    let cols = (chunk.width as usize).min(geo.width - x0);
    let rows = (chunk.rows as usize).min(geo.height - y0);
    let src_row = chunk.width as usize * geo.chunk_spp() * geo.bytes;
    let b = geo.bytes;

    for r in 0..rows {
        if r % 16 == 0 {
            stop.check()?;
        }
        let src = &samples[r * src_row..];
        let dst_px = (y0 + r) * geo.width + x0;
        if geo.planar {
            for c in 0..cols {
                let d = ((dst_px + c) * geo.spp + chunk.plane) * b;
                out[d..d + b].copy_from_slice(&src[c * b..c * b + b]);
            }
        } else {
            let n = cols * geo.spp * b;
            let d = dst_px * geo.spp * b;
            out[d..d + n].copy_from_slice(&src[..n]);
        }
    }
    Ok(())
}

/// The JPEG stream(s) of an image: its tiles or strips, or the
/// JPEGInterchangeFormat block.
fn jpeg_streams(image: &DngImage<'_>, data_len: usize) -> Result<Vec<Chunk>, DngError> {
    if !image.tile_offsets.is_empty() || !image.strip_offsets.is_empty() {
        return chunks(image, data_len);
    }
    if image.jpeg_offset == 0 {
        return Err(DngError::InvalidData(format!(
            "IFD at {}: no strips, tiles or JPEG offset",
            image.ifd_offset
        )));
    }
    let len = if image.jpeg_byte_count > 0 {
        image.jpeg_byte_count
    } else {
        data_len.saturating_sub(image.jpeg_offset as usize) as u32
    };
    Ok(vec![Chunk {
        offset: image.jpeg_offset,
        len,
        plane: 0,
        x: 0,
        y: 0,
        width: image.width,
        rows: image.height,
    }])
}

/// Upper bound on lossless JPEG samples: every sample costs at least one bit.
fn ljpeg_budget(stream: &[u8], limits: Option<&Limits>) -> usize {
    let by_size = stream.len().saturating_mul(8);
    let by_limit = limits
        .and_then(|l| l.max_memory_bytes)
        .map_or(usize::MAX, |m| usize::try_from(m / 2).unwrap_or(usize::MAX));
    by_size.min(by_limit)
}

fn decode_jpeg<'a>(
    data: &'a [u8],
    image: &mut DngImage<'a>,
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
    stop: &dyn Stop,
) -> Result<(), DngError> {
    let streams = jpeg_streams(image, data.len())?;
    let first = streams
        .first()
        .ok_or_else(|| DngError::InvalidData("empty JPEG stream list".into()))?;
    let first_bytes = chunk_bytes(data, first, warnings)?;
    let kind = if image.compression == Compression::LossyJpeg {
        JpegKind::Dct
    } else {
        ljpeg::sniff(first_bytes).ok_or_else(|| {
            DngError::InvalidData(format!("IFD at {}: not a JPEG stream", image.ifd_offset))
        })?
    };

    match kind {
        JpegKind::Lossless if image.cr2_slices.is_some_and(|s| s[0] > 0 || s[2] > 0) => {
            decode_cr2(first_bytes, image, limits)
        }
        JpegKind::Lossless if streams.len() == 1 && image.tile_offsets.is_empty() => {
            decode_ljpeg_whole(first_bytes, image, limits)
        }
        JpegKind::Lossless => decode_ljpeg_chunks(data, &streams, image, limits, warnings, stop),
        JpegKind::Dct => decode_baseline(data, &streams, image, limits, warnings, stop),
        JpegKind::Unsupported(marker) => Err(DngError::Unsupported(format!(
            "JPEG frame type 0x{marker:02X}"
        ))),
    }
}

fn u16_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// A single lossless stream covering the whole image. The frame's
/// dimensions are authoritative.
fn decode_ljpeg_whole(
    stream: &[u8],
    image: &mut DngImage<'_>,
    limits: Option<&Limits>,
) -> Result<(), DngError> {
    let frame = ljpeg::decode(stream, ljpeg_budget(stream, limits))?;
    let spp = image.samples_per_pixel as usize;
    let total = frame.samples.len();
    let row = frame.width * frame.components;
    // Frames may pack several image columns per component.
    let width = if spp > 0 && row % spp == 0 { row / spp } else { frame.width };
    let height = if width * spp > 0 { total / (width * spp) } else { 0 };
    if (width as u64) != u64::from(image.width) || (height as u64) != u64::from(image.height) {
        log::debug!(
            "IFD at {}: lossless JPEG frame {}x{}x{} replaces {}x{}",
            image.ifd_offset,
            frame.width,
            frame.height,
            frame.components,
            image.width,
            image.height
        );
    }
    image.width = width as u32;
    image.height = height as u32;
    image.bits_per_sample = 16;
    image.sample_format = SampleFormat::Uint;
    image.bits_per_sample_original = u32::from(frame.precision);
    check_output(image, limits)?;
    image.set_pixels(Cow::Owned(u16_bytes(&frame.samples[..width * height * spp])));
    Ok(())
}

fn decode_cr2(
    stream: &[u8],
    image: &mut DngImage<'_>,
    limits: Option<&Limits>,
) -> Result<(), DngError> {
    let slices = image.cr2_slices.unwrap_or_default();
    let frame = ljpeg::decode(stream, ljpeg_budget(stream, limits))?;
    let (width, samples) = cr2::unslice(&frame.samples, slices, frame.height)?;
    log::debug!(
        "IFD at {}: CR2 {} slices of {}, last {}, {width}x{}",
        image.ifd_offset,
        slices[0],
        slices[1],
        slices[2],
        frame.height
    );
    image.width = width as u32;
    image.height = frame.height as u32;
    image.samples_per_pixel = 1;
    image.bits_per_sample = 16;
    image.sample_format = SampleFormat::Uint;
    image.bits_per_sample_original = u32::from(frame.precision);
    check_output(image, limits)?;
    image.set_pixels(Cow::Owned(u16_bytes(&samples)));
    Ok(())
}

/// Lossless tiles or strips: each frame is read as a flat run of samples
/// filling the chunk row by row.
fn decode_ljpeg_chunks(
    data: &[u8],
    streams: &[Chunk],
    image: &mut DngImage<'_>,
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
    stop: &dyn Stop,
) -> Result<(), DngError> {
    // Lossless JPEG only carries unsigned integers.
    image.bits_per_sample = 16;
    image.sample_format = SampleFormat::Uint;
    let out_len = check_output(image, limits)?;
    let geo = Geometry::of(image);
    let mut out = vec![0u8; out_len];
    let mut precision = 0u8;
    for chunk in streams {
        stop.check()?;
        let stream = chunk_bytes(data, chunk, warnings)?;
        let frame = ljpeg::decode(stream, ljpeg_budget(stream, limits))?;
        let needed = chunk.width as usize * geo.chunk_spp() * chunk.rows as usize;
        if frame.samples.len() < needed {
            return Err(DngError::InvalidData(format!(
                "lossless JPEG chunk at {} holds {} samples, needs {needed}",
                chunk.offset,
                frame.samples.len()
            )));
        }
        precision = precision.max(frame.precision);
        place(&mut out, geo, chunk, &u16_bytes(&frame.samples[..needed]), stop)?;
    }
    image.bits_per_sample_original = u32::from(precision);
    image.set_pixels(Cow::Owned(out));
    Ok(())
}

#[cfg(feature = "jpeg")]
fn decode_baseline(
    data: &[u8],
    streams: &[Chunk],
    image: &mut DngImage<'_>,
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
    stop: &dyn Stop,
) -> Result<(), DngError> {
    let whole = streams.len() == 1 && image.tile_offsets.is_empty();
    if whole {
        stop.check()?;
        let decoded = jpeg::decode(chunk_bytes(data, &streams[0], warnings)?, limits)?;
        image.width = decoded.width;
        image.height = decoded.height;
        image.samples_per_pixel = decoded.channels;
        image.bits_per_sample = decoded.sample.bits();
        image.bits_per_sample_original = decoded.sample.bits();
        image.sample_format = SampleFormat::Uint;
        image.set_pixels(Cow::Owned(decoded.samples));
        return Ok(());
    }

    image.bits_per_sample = 8;
    image.bits_per_sample_original = 8;
    image.sample_format = SampleFormat::Uint;
    let out_len = check_output(image, limits)?;
    let geo = Geometry::of(image);
    let mut out = vec![0u8; out_len];
    for chunk in streams {
        stop.check()?;
        let decoded = jpeg::decode(chunk_bytes(data, chunk, warnings)?, limits)?;
        if decoded.sample != SampleType::U8 || decoded.channels as usize != geo.chunk_spp() {
            return Err(DngError::InvalidData(format!(
                "JPEG tile at {} decodes to {} {:?} channels, image has {}",
                chunk.offset, decoded.channels, decoded.sample, geo.spp
            )));
        }
        let placed = Chunk {
            width: decoded.width,
            rows: decoded.height,
            ..*chunk
        };
        place(&mut out, geo, &placed, &decoded.samples, stop)?;
    }
    image.set_pixels(Cow::Owned(out));
    Ok(())
}

#[cfg(not(feature = "jpeg"))]
fn decode_baseline(
    _data: &[u8],
    _streams: &[Chunk],
    _image: &mut DngImage<'_>,
    _limits: Option<&Limits>,
    _warnings: &mut Vec<String>,
    _stop: &dyn Stop,
) -> Result<(), DngError> {
    Err(DngError::Unsupported(
        "baseline JPEG (enable the `jpeg` feature)".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use enough::Unstoppable;

    fn geo(width: usize, height: usize, spp: usize, planar: bool) -> Geometry {
        Geometry {
            width,
            height,
            spp,
            planar,
            bytes: 1,
        }
    }

    fn chunk(x: u32, y: u32, width: u32, rows: u32, plane: usize) -> Chunk {
        Chunk {
            offset: 0,
            len: 0,
            plane,
            x,
            y,
            width,
            rows,
        }
    }

    #[test]
    fn place_clips_edge_tile() {
        let mut out = vec![0u8; 3 * 3];
        let tile: Vec<u8> = (1..=4).collect();
        place(&mut out, geo(3, 3, 1, false), &chunk(2, 2, 2, 2, 0), &tile, &Unstoppable).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn place_planar_interleaves() {
        let mut out = vec![0u8; 2 * 3];
        let g = geo(2, 1, 3, true);
        for plane in 0..3 {
            let s = [10 * plane as u8 + 1, 10 * plane as u8 + 2];
            place(&mut out, g, &chunk(0, 0, 2, 1, plane), &s, &Unstoppable).unwrap();
        }
        assert_eq!(out, [1, 11, 21, 2, 12, 22]);
    }

    #[test]
    fn chunk_past_eof_is_clipped() {
        let data = [1u8, 2, 3, 4];
        let mut warnings = Vec::new();
        let c = Chunk {
            offset: 2,
            len: 10,
            ..chunk(0, 0, 1, 1, 0)
        };
        assert_eq!(chunk_bytes(&data, &c, &mut warnings).unwrap(), &[3, 4]);
        assert_eq!(warnings.len(), 1);
        let c = Chunk { offset: 5, ..c };
        assert!(matches!(chunk_bytes(&data, &c, &mut warnings), Err(DngError::UnexpectedEof)));
    }

    #[test]
    fn ljpeg_budget_follows_stream_and_limits() {
        assert_eq!(ljpeg_budget(&[0; 10], None), 80);
        let limits = Limits {
            max_memory_bytes: Some(100),
            ..Limits::default()
        };
        assert_eq!(ljpeg_budget(&[0; 100], Some(&limits)), 50);
    }
}
