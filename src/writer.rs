//! DNG writer: serializes decoded-style sample buffers with DNG metadata.
//!
//! Used to build fixtures and fuzz seeds, and for round-trip tests of the
//! decoder. Output is always little- or big-endian classic TIFF.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::decompress;
use crate::error::DngError;
use crate::exif::Exif;
use crate::image::Matrix3;
use crate::ljpeg;
use crate::pixel::{SampleFormat, SampleType};
use crate::tiff::tags::{self, Compression, LightSource};
use crate::tiff::{ByteOrder, FieldType, TIFF_MAGIC};

/// Denominator used for every rational written.
const RATIONAL_DENOMINATOR: u32 = 10_000;

/// Compression applied to written strips or tiles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteCompression {
    #[default]
    None,
    /// Adobe Deflate (8), zlib via miniz_oxide.
    Deflate,
    /// Lossless JPEG (7), predictor 1, one frame per strip or tile.
    LosslessJpeg,
}

/// A tag written verbatim.
#[derive(Clone, Debug)]
struct Field {
    tag: u16,
    field_type: FieldType,
    count: u32,
    /// Value bytes in the output byte order.
    data: Vec<u8>,
}

/// One image to write.
///
/// `data` holds interleaved native-endian samples of 8, 16 or 32 bits,
/// the same representation [`crate::DngImage::pixels`] decodes to.
#[derive(Clone, Debug)]
pub struct WriteImage {
    width: u32,
    height: u32,
    samples_per_pixel: u32,
    bits_per_sample: u32,
    data: Vec<u8>,
    sample_format: SampleFormat,
    subfile_type: u32,
    photometric: Option<u16>,
    orientation: Option<u16>,
    rows_per_strip: Option<u32>,
    tiles: Option<(u32, u32)>,
    planar: bool,
    compression: WriteCompression,
    predictor: bool,
    cfa: Option<((u16, u16), Vec<u8>)>,
    cfa_plane_color: Option<Vec<u8>>,
    cfa_layout: Option<u16>,
    dng_version: Option<[u8; 4]>,
    unique_camera_model: Option<String>,
    black_level: Vec<f64>,
    white_level: Vec<u32>,
    matrices: Vec<(u16, Matrix3)>,
    analog_balance: Option<[f64; 3]>,
    as_shot_neutral: Option<[f64; 3]>,
    illuminants: Option<(LightSource, LightSource)>,
    active_area: Option<[u32; 4]>,
    cr2_slices: Option<[u16; 3]>,
    raw_tags: Vec<Field>,
}

impl WriteImage {
    pub fn new(
        width: u32,
        height: u32,
        samples_per_pixel: u32,
        bits_per_sample: u32,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            width,
            height,
            samples_per_pixel,
            bits_per_sample,
            data: data.into(),
            sample_format: SampleFormat::Uint,
            subfile_type: 0,
            photometric: None,
            orientation: None,
            rows_per_strip: None,
            tiles: None,
            planar: false,
            compression: WriteCompression::None,
            predictor: false,
            cfa: None,
            cfa_plane_color: None,
            cfa_layout: None,
            dng_version: None,
            unique_camera_model: None,
            black_level: Vec::new(),
            white_level: Vec::new(),
            matrices: Vec::new(),
            analog_balance: None,
            as_shot_neutral: None,
            illuminants: None,
            active_area: None,
            cr2_slices: None,
            raw_tags: Vec::new(),
        }
    }

    /// NewSubfileType; 1 marks a reduced-resolution preview.
    pub fn with_subfile_type(mut self, subfile_type: u32) -> Self {
        self.subfile_type = subfile_type;
        self
    }

    pub fn with_photometric(mut self, photometric: u16) -> Self {
        self.photometric = Some(photometric);
        self
    }

    pub fn with_orientation(mut self, orientation: u16) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn with_tiles(mut self, tile_width: u32, tile_length: u32) -> Self {
        self.tiles = Some((tile_width, tile_length));
        self
    }

    /// Store each sample plane separately (PlanarConfiguration 2).
    pub fn planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    pub fn with_compression(mut self, compression: WriteCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Horizontal differencing for Deflate; floating point samples use
    /// the floating point predictor instead.
    pub fn with_predictor(mut self, predictor: bool) -> Self {
        self.predictor = predictor;
        self
    }

    /// CFARepeatPatternDim as (rows, cols) and the CFAPattern.
    pub fn with_cfa(mut self, dim: (u16, u16), pattern: &[u8]) -> Self {
        self.cfa = Some((dim, pattern.to_vec()));
        self
    }

    pub fn with_cfa_plane_color(mut self, colors: &[u8]) -> Self {
        self.cfa_plane_color = Some(colors.to_vec());
        self
    }

    pub fn with_cfa_layout(mut self, layout: u16) -> Self {
        self.cfa_layout = Some(layout);
        self
    }

    pub fn with_dng_version(mut self, version: [u8; 4]) -> Self {
        self.dng_version = Some(version);
        self
    }

    pub fn with_unique_camera_model(mut self, model: &str) -> Self {
        self.unique_camera_model = Some(model.into());
        self
    }

    pub fn with_black_level(mut self, levels: &[f64]) -> Self {
        self.black_level = levels.to_vec();
        self
    }

    pub fn with_white_level(mut self, levels: &[u32]) -> Self {
        self.white_level = levels.to_vec();
        self
    }

    fn with_matrix(mut self, tag: u16, m: Matrix3) -> Self {
        self.matrices.retain(|(t, _)| *t != tag);
        self.matrices.push((tag, m));
        self
    }

    pub fn with_color_matrix1(self, m: Matrix3) -> Self {
        self.with_matrix(tags::COLOR_MATRIX1, m)
    }

    pub fn with_color_matrix2(self, m: Matrix3) -> Self {
        self.with_matrix(tags::COLOR_MATRIX2, m)
    }

    pub fn with_camera_calibration1(self, m: Matrix3) -> Self {
        self.with_matrix(tags::CAMERA_CALIBRATION1, m)
    }

    pub fn with_camera_calibration2(self, m: Matrix3) -> Self {
        self.with_matrix(tags::CAMERA_CALIBRATION2, m)
    }

    pub fn with_forward_matrix1(self, m: Matrix3) -> Self {
        self.with_matrix(tags::FORWARD_MATRIX1, m)
    }

    pub fn with_forward_matrix2(self, m: Matrix3) -> Self {
        self.with_matrix(tags::FORWARD_MATRIX2, m)
    }

    pub fn with_analog_balance(mut self, balance: [f64; 3]) -> Self {
        self.analog_balance = Some(balance);
        self
    }

    pub fn with_as_shot_neutral(mut self, neutral: [f64; 3]) -> Self {
        self.as_shot_neutral = Some(neutral);
        self
    }

    pub fn with_calibration_illuminants(mut self, first: LightSource, second: LightSource) -> Self {
        self.illuminants = Some((first, second));
        self
    }

    /// ActiveArea as top, left, bottom, right.
    pub fn with_active_area(mut self, area: [u32; 4]) -> Self {
        self.active_area = Some(area);
        self
    }

    /// Canon slice layout: count, slice width, last slice width. Only
    /// meaningful with [`WriteCompression::LosslessJpeg`], which then writes
    /// the whole image as one sliced frame.
    pub fn with_cr2_slices(mut self, slices: [u16; 3]) -> Self {
        self.cr2_slices = Some(slices);
        self
    }

    /// Write an extra tag. `data` must already be in the output byte order.
    /// Replaces any tag the writer would emit with the same number.
    pub fn with_raw_tag(
        mut self,
        tag: u16,
        field_type: FieldType,
        count: u32,
        data: Vec<u8>,
    ) -> Self {
        self.raw_tags.push(Field {
            tag,
            field_type,
            count,
            data,
        });
        self
    }

    fn storage(&self) -> Result<SampleType, DngError> {
        SampleType::for_bits(self.bits_per_sample, self.sample_format).ok_or_else(|| {
            DngError::InvalidData(format!(
                "cannot write {}-bit {:?} samples",
                self.bits_per_sample, self.sample_format
            ))
        })
    }

    fn validate(&self) -> Result<SampleType, DngError> {
        let storage = self.storage()?;
        if self.width == 0 || self.height == 0 {
            return Err(DngError::InvalidData("cannot write an empty image".into()));
        }
        if !(1..=4).contains(&self.samples_per_pixel) {
            return Err(DngError::InvalidData(format!(
                "samples per pixel {} outside 1..=4",
                self.samples_per_pixel
            )));
        }
        let needed = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(self.samples_per_pixel as usize))
            .and_then(|n| n.checked_mul(storage.bytes()))
            .ok_or(DngError::DimensionsTooLarge {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() != needed {
            return Err(DngError::BufferTooSmall {
                needed,
                actual: self.data.len(),
            });
        }
        if let Some((tw, tl)) = self.tiles
            && (tw == 0 || tl == 0 || tw % 16 != 0 || tl % 16 != 0)
        {
            return Err(DngError::InvalidData(format!(
                "tile size {tw}x{tl} must be a non-zero multiple of 16"
            )));
        }
        if self.compression == WriteCompression::LosslessJpeg
            && !(2..=16).contains(&self.bits_per_sample)
        {
            return Err(DngError::InvalidData(format!(
                "lossless JPEG cannot store {}-bit samples",
                self.bits_per_sample
            )));
        }
        if self.predictor
            && self.compression == WriteCompression::Deflate
            && !matches!(self.bits_per_sample, 8 | 16 | 32)
        {
            return Err(DngError::InvalidData(format!(
                "horizontal predictor needs 8, 16 or 32-bit samples, got {}",
                self.bits_per_sample
            )));
        }
        Ok(storage)
    }

    fn planes(&self) -> usize {
        if self.planar { self.samples_per_pixel as usize } else { 1 }
    }

    fn chunk_spp(&self) -> usize {
        if self.planar { 1 } else { self.samples_per_pixel as usize }
    }

    /// Native samples of one chunk, zero padded past the image edge.
    fn chunk_native(
        &self,
        storage: SampleType,
        plane: usize,
        x: u32,
        y: u32,
        cw: u32,
        rows: u32,
    ) -> Vec<u8> {
        let b = storage.bytes();
        let spp = self.samples_per_pixel as usize;
        let cspp = self.chunk_spp();
        let mut out = vec![0u8; cw as usize * rows as usize * cspp * b];
        for r in 0..rows {
            let iy = y + r;
            if iy >= self.height {
                break;
            }
            for c in 0..cw {
                let ix = x + c;
                if ix >= self.width {
                    break;
                }
                let src_px = (iy as usize * self.width as usize + ix as usize) * spp;
                let dst = ((r * cw + c) as usize * cspp) * b;
                if self.planar {
                    let s = (src_px + plane) * b;
                    out[dst..dst + b].copy_from_slice(&self.data[s..s + b]);
                } else {
                    let s = src_px * b;
                    out[dst..dst + spp * b].copy_from_slice(&self.data[s..s + spp * b]);
                }
            }
        }
        out
    }

    fn encode_chunk(
        &self,
        order: ByteOrder,
        storage: SampleType,
        mut native: Vec<u8>,
        cw: u32,
        rows: u32,
    ) -> Result<Vec<u8>, DngError> {
        let row_samples = cw as usize * self.chunk_spp();
        let rows_n = rows as usize;
        let bits = self.bits_per_sample;
        match self.compression {
            WriteCompression::None => {
                Ok(decompress::pack(&native, bits, order, row_samples, rows_n, storage))
            }
            WriteCompression::Deflate => {
                let stride = self.chunk_spp();
                let raw = if self.predictor && storage == SampleType::F32 {
                    decompress::apply_floating_point(&native, row_samples, rows_n, stride)
                } else {
                    if self.predictor {
                        decompress::apply_horizontal(&mut native, storage, row_samples, stride);
                    }
                    decompress::pack(&native, bits, order, row_samples, rows_n, storage)
                };
                deflate(&raw)
            }
            WriteCompression::LosslessJpeg => {
                let (w, h) = (u16::try_from(cw), u16::try_from(rows));
                let (Ok(w), Ok(h)) = (w, h) else {
                    return Err(DngError::InvalidData(format!(
                        "lossless JPEG frame {cw}x{rows} exceeds 65535"
                    )));
                };
                let samples = to_u16(&native, storage);
                ljpeg::encode(&samples, w, h, self.chunk_spp() as u8, bits as u8, 1)
            }
        }
    }
}

#[cfg(feature = "deflate")]
fn deflate(raw: &[u8]) -> Result<Vec<u8>, DngError> {
    Ok(decompress::deflate_encode(raw))
}

#[cfg(not(feature = "deflate"))]
fn deflate(_raw: &[u8]) -> Result<Vec<u8>, DngError> {
    Err(DngError::Unsupported(
        "Deflate compression (enable the `deflate` feature)".into(),
    ))
}

fn to_u16(native: &[u8], storage: SampleType) -> Vec<u16> {
    match storage {
        SampleType::U8 => native.iter().map(|&v| u16::from(v)).collect(),
        _ => native
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect(),
    }
}

/// Builds the tag list of one IFD in the output byte order.
struct Fields {
    order: ByteOrder,
    list: Vec<Field>,
}

impl Fields {
    fn push(&mut self, tag: u16, field_type: FieldType, count: usize, data: Vec<u8>) {
        self.list.retain(|f| f.tag != tag);
        self.list.push(Field {
            tag,
            field_type,
            count: count as u32,
            data,
        });
    }

    fn bytes(&mut self, tag: u16, field_type: FieldType, v: &[u8]) {
        self.push(tag, field_type, v.len(), v.to_vec());
    }

    fn shorts(&mut self, tag: u16, v: &[u16]) {
        let mut data = Vec::with_capacity(v.len() * 2);
        for &x in v {
            self.order.put_u16(&mut data, x);
        }
        self.push(tag, FieldType::Short, v.len(), data);
    }

    fn longs(&mut self, tag: u16, v: &[u32]) {
        let mut data = Vec::with_capacity(v.len() * 4);
        for &x in v {
            self.order.put_u32(&mut data, x);
        }
        self.push(tag, FieldType::Long, v.len(), data);
    }

    fn ascii(&mut self, tag: u16, s: &str) {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        let n = data.len();
        self.push(tag, FieldType::Ascii, n, data);
    }

    fn rationals(&mut self, tag: u16, v: &[f64]) {
        let mut data = Vec::with_capacity(v.len() * 8);
        for &x in v {
            let n = (x * f64::from(RATIONAL_DENOMINATOR)).round().clamp(0.0, f64::from(u32::MAX));
            self.order.put_u32(&mut data, n as u32);
            self.order.put_u32(&mut data, RATIONAL_DENOMINATOR);
        }
        self.push(tag, FieldType::Rational, v.len(), data);
    }

    fn srationals(&mut self, tag: u16, v: &[f64]) {
        let mut data = Vec::with_capacity(v.len() * 8);
        for &x in v {
            let n = (x * f64::from(RATIONAL_DENOMINATOR))
                .round()
                .clamp(f64::from(i32::MIN), f64::from(i32::MAX));
            self.order.put_u32(&mut data, n as i32 as u32);
            self.order.put_u32(&mut data, RATIONAL_DENOMINATOR);
        }
        self.push(tag, FieldType::SRational, v.len(), data);
    }

    fn into_sorted(mut self) -> Vec<Field> {
        self.list.sort_by_key(|f| f.tag);
        self.list
    }
}

/// Bytes an IFD block occupies: count, entries, next pointer, then every
/// value longer than four bytes padded to a word.
fn block_len(fields: &[Field]) -> usize {
    let external: usize = fields
        .iter()
        .filter(|f| f.data.len() > 4)
        .map(|f| f.data.len().next_multiple_of(2))
        .sum();
    2 + 12 * fields.len() + 4 + external
}

fn write_block(out: &mut Vec<u8>, order: ByteOrder, fields: &[Field], next: u32) {
    let start = out.len();
    let mut external = start + 2 + 12 * fields.len() + 4;
    order.put_u16(out, fields.len() as u16);
    for f in fields {
        order.put_u16(out, f.tag);
        order.put_u16(out, f.field_type.code());
        order.put_u32(out, f.count);
        if f.data.len() <= 4 {
            out.extend_from_slice(&f.data);
            out.resize(out.len() + 4 - f.data.len(), 0);
        } else {
            order.put_u32(out, external as u32);
            external += f.data.len().next_multiple_of(2);
        }
    }
    order.put_u32(out, next);
    for f in fields.iter().filter(|f| f.data.len() > 4) {
        out.extend_from_slice(&f.data);
        if f.data.len() % 2 == 1 {
            out.push(0);
        }
    }
}

fn pad_to_word(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

/// Where one image's chunks landed in the output.
struct Placed {
    offsets: Vec<u32>,
    counts: Vec<u32>,
}

/// Serializes images into a DNG file.
///
/// The first image becomes IFD0. By default the remaining images are its
/// SubIFDs, the usual DNG arrangement of a preview in IFD0 and raw data
/// in a SubIFD; [`DngWriter::chained`] links them as IFD1, IFD2, ...
/// instead.
#[derive(Clone, Debug)]
pub struct DngWriter {
    order: ByteOrder,
    chained: bool,
    images: Vec<WriteImage>,
    exif: Option<Exif>,
    make: Option<String>,
    model: Option<String>,
}

impl DngWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            chained: false,
            images: Vec::new(),
            exif: None,
            make: None,
            model: None,
        }
    }

    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    pub fn add_image(mut self, image: WriteImage) -> Self {
        self.images.push(image);
        self
    }

    /// Write an EXIF IFD, and Make/Model into IFD0.
    pub fn with_exif(mut self, exif: Exif) -> Self {
        self.make = exif.make.clone();
        self.model = exif.model.clone();
        self.exif = Some(exif);
        self
    }

    pub fn write(&self) -> Result<Vec<u8>, DngError> {
        if self.images.is_empty() {
            return Err(DngError::InvalidData("no images to write".into()));
        }
        let order = self.order;
        let mut out = Vec::new();
        out.extend_from_slice(&order.marker());
        order.put_u16(&mut out, TIFF_MAGIC);
        order.put_u32(&mut out, 0);

        let mut placed = Vec::with_capacity(self.images.len());
        for image in &self.images {
            placed.push(self.write_data(&mut out, image)?);
        }

        let mut blocks: Vec<Vec<Field>> = self
            .images
            .iter()
            .zip(&placed)
            .map(|(image, p)| self.image_fields(image, p))
            .collect::<Result<_, _>>()?;
        let exif_block = self.exif.as_ref().map(|e| self.exif_fields(e));

        // Sub-blocks (SubIFDs or chained IFDs after the first, then EXIF) go
        // before IFD0, whose offsets to them are only known afterwards.
        pad_to_word(&mut out);
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut cursor = out.len();
        for block in blocks.iter().skip(1) {
            offsets.push(cursor);
            cursor += block_len(block);
        }
        let exif_offset = exif_block.as_ref().map(|b| {
            let at = cursor;
            cursor += block_len(b);
            at
        });
        let ifd0_offset = cursor;

        if let Some(at) = exif_offset {
            let mut f = Fields {
                order,
                list: core::mem::take(&mut blocks[0]),
            };
            f.longs(tags::EXIF_IFD, &[to_u32(at)?]);
            if let Some(make) = &self.make {
                f.ascii(tags::MAKE, make);
            }
            if let Some(model) = &self.model {
                f.ascii(tags::MODEL, model);
            }
            blocks[0] = f.into_sorted();
        }
        if !self.chained && blocks.len() > 1 {
            let subs = offsets.iter().map(|&o| to_u32(o)).collect::<Result<Vec<_>, _>>()?;
            let mut f = Fields {
                order,
                list: core::mem::take(&mut blocks[0]),
            };
            f.longs(tags::SUB_IFDS, &subs);
            blocks[0] = f.into_sorted();
        }

        for (i, block) in blocks.iter().enumerate().skip(1) {
            let next = if self.chained {
                offsets.get(i).map_or(Ok(0), |&o| to_u32(o))?
            } else {
                0
            };
            write_block(&mut out, order, block, next);
        }
        if let Some(block) = &exif_block {
            write_block(&mut out, order, block, 0);
        }
        debug_assert_eq!(out.len(), ifd0_offset);
        let next = if self.chained {
            offsets.first().map_or(Ok(0), |&o| to_u32(o))?
        } else {
            0
        };
        write_block(&mut out, order, &blocks[0], next);

        let first = to_u32(ifd0_offset)?;
        let mut header = Vec::with_capacity(4);
        order.put_u32(&mut header, first);
        out[4..8].copy_from_slice(&header);
        log::debug!(
            "wrote {} images, {} bytes, IFD0 at {ifd0_offset}",
            self.images.len(),
            out.len()
        );
        Ok(out)
    }

    fn write_data(&self, out: &mut Vec<u8>, image: &WriteImage) -> Result<Placed, DngError> {
        let storage = image.validate()?;
        let mut placed = Placed {
            offsets: Vec::new(),
            counts: Vec::new(),
        };

        if image.compression == WriteCompression::LosslessJpeg
            && let Some(slices) = image.cr2_slices
        {
            let stream = cr2_stream(image, storage, slices)?;
            pad_to_word(out);
            placed.offsets.push(to_u32(out.len())?);
            placed.counts.push(to_u32(stream.len())?);
            out.extend_from_slice(&stream);
            return Ok(placed);
        }

        let (cw, ch) = image.tiles.unwrap_or((
            image.width,
            image.rows_per_strip.unwrap_or(image.height).clamp(1, image.height),
        ));
        let across = image.width.div_ceil(cw);
        let down = image.height.div_ceil(ch);
        for plane in 0..image.planes() {
            for row in 0..down {
                for col in 0..across {
                    let (x, y) = (col * cw, row * ch);
                    let rows = if image.tiles.is_some() { ch } else { ch.min(image.height - y) };
                    let native = image.chunk_native(storage, plane, x, y, cw, rows);
                    let bytes = image.encode_chunk(self.order, storage, native, cw, rows)?;
                    pad_to_word(out);
                    placed.offsets.push(to_u32(out.len())?);
                    placed.counts.push(to_u32(bytes.len())?);
                    out.extend_from_slice(&bytes);
                }
            }
        }
        Ok(placed)
    }

    fn image_fields(&self, image: &WriteImage, placed: &Placed) -> Result<Vec<Field>, DngError> {
        let mut f = Fields {
            order: self.order,
            list: Vec::new(),
        };
        let spp = image.samples_per_pixel as usize;
        let compression = match image.compression {
            WriteCompression::None => Compression::None,
            WriteCompression::Deflate => Compression::Deflate,
            WriteCompression::LosslessJpeg => Compression::Jpeg,
        };
        let photometric = image.photometric.unwrap_or(match (&image.cfa, spp) {
            (Some(_), _) => tags::PHOTOMETRIC_CFA,
            (None, 3) => tags::PHOTOMETRIC_RGB,
            (None, 1) => tags::PHOTOMETRIC_BLACK_IS_ZERO,
            _ => tags::PHOTOMETRIC_LINEAR_RAW,
        });

        f.longs(tags::NEW_SUBFILE_TYPE, &[image.subfile_type]);
        f.longs(tags::IMAGE_WIDTH, &[image.width]);
        f.longs(tags::IMAGE_LENGTH, &[image.height]);
        f.shorts(tags::BITS_PER_SAMPLE, &vec![image.bits_per_sample as u16; spp]);
        f.shorts(tags::COMPRESSION, &[compression.code()]);
        f.shorts(tags::PHOTOMETRIC, &[photometric]);
        f.shorts(tags::SAMPLES_PER_PIXEL, &[spp as u16]);
        f.shorts(tags::PLANAR_CONFIGURATION, &[if image.planar { 2 } else { 1 }]);
        if let Some(o) = image.orientation {
            f.shorts(tags::ORIENTATION, &[o]);
        }
        if image.sample_format != SampleFormat::Uint {
            f.shorts(tags::SAMPLE_FORMAT, &vec![image.sample_format.code(); spp]);
        }
        if image.predictor && image.compression == WriteCompression::Deflate {
            let p = if image.sample_format == SampleFormat::Float { 3 } else { 2 };
            f.shorts(tags::PREDICTOR, &[p]);
        }

        let sliced =
            image.compression == WriteCompression::LosslessJpeg && image.cr2_slices.is_some();
        match image.tiles {
            Some((tw, tl)) if !sliced => {
                f.longs(tags::TILE_WIDTH, &[tw]);
                f.longs(tags::TILE_LENGTH, &[tl]);
                f.longs(tags::TILE_OFFSETS, &placed.offsets);
                f.longs(tags::TILE_BYTE_COUNTS, &placed.counts);
            }
            _ => {
                let rps = if sliced {
                    image.height
                } else {
                    image.rows_per_strip.unwrap_or(image.height).clamp(1, image.height)
                };
                f.longs(tags::ROWS_PER_STRIP, &[rps]);
                f.longs(tags::STRIP_OFFSETS, &placed.offsets);
                f.longs(tags::STRIP_BYTE_COUNTS, &placed.counts);
            }
        }

        if let Some((dim, pattern)) = &image.cfa {
            f.shorts(tags::CFA_REPEAT_PATTERN_DIM, &[dim.0, dim.1]);
            f.bytes(tags::CFA_PATTERN, FieldType::Byte, pattern);
        }
        if let Some(colors) = &image.cfa_plane_color {
            f.bytes(tags::CFA_PLANE_COLOR, FieldType::Byte, colors);
        }
        if let Some(layout) = image.cfa_layout {
            f.shorts(tags::CFA_LAYOUT, &[layout]);
        }
        if let Some(v) = image.dng_version {
            f.bytes(tags::DNG_VERSION, FieldType::Byte, &v);
        }
        if let Some(model) = &image.unique_camera_model {
            f.ascii(tags::UNIQUE_CAMERA_MODEL, model);
        }
        if !image.black_level.is_empty() {
            f.rationals(tags::BLACK_LEVEL, &image.black_level);
        }
        if !image.white_level.is_empty() {
            f.longs(tags::WHITE_LEVEL, &image.white_level);
        }
        for (tag, m) in &image.matrices {
            let flat: Vec<f64> = m.iter().flatten().copied().collect();
            f.srationals(*tag, &flat);
        }
        if let Some(b) = image.analog_balance {
            f.rationals(tags::ANALOG_BALANCE, &b);
        }
        if let Some(n) = image.as_shot_neutral {
            f.rationals(tags::AS_SHOT_NEUTRAL, &n);
        }
        if let Some((a, b)) = image.illuminants {
            f.shorts(tags::CALIBRATION_ILLUMINANT1, &[a.code()]);
            f.shorts(tags::CALIBRATION_ILLUMINANT2, &[b.code()]);
        }
        if let Some(area) = image.active_area {
            f.longs(tags::ACTIVE_AREA, &area);
        }
        if let Some(s) = image.cr2_slices {
            f.shorts(tags::CR2_SLICES, &s);
        }
        for raw in &image.raw_tags {
            f.push(raw.tag, raw.field_type, raw.count as usize, raw.data.clone());
        }
        Ok(f.into_sorted())
    }

    fn exif_fields(&self, exif: &Exif) -> Vec<Field> {
        let mut f = Fields {
            order: self.order,
            list: Vec::new(),
        };
        if let Some(t) = exif.exposure_time {
            f.rationals(tags::EXPOSURE_TIME, &[t]);
        }
        if let Some(n) = exif.f_number {
            f.rationals(tags::F_NUMBER, &[n]);
        }
        if let Some(iso) = exif.iso {
            f.shorts(tags::ISO_SPEED, &[iso.min(u32::from(u16::MAX)) as u16]);
        }
        if let Some(s) = exif.shutter_speed {
            f.srationals(tags::SHUTTER_SPEED_VALUE, &[s]);
        }
        if f.list.is_empty() {
            // A zero-entry IFD is malformed.
            f.shorts(tags::ISO_SPEED, &[0]);
        }
        f.into_sorted()
    }
}

/// One lossless frame holding the image as CR2 slices, each slice written
/// top to bottom before the next.
fn cr2_stream(
    image: &WriteImage,
    storage: SampleType,
    slices: [u16; 3],
) -> Result<Vec<u8>, DngError> {
    let [count, sw, last] = slices.map(usize::from);
    let (w, h) = (image.width as usize, image.height as usize);
    if image.samples_per_pixel != 1 || count * sw + last != w {
        return Err(DngError::InvalidData(format!(
            "CR2 slices {slices:?} do not cover a {w}-wide single-channel image"
        )));
    }
    let samples = to_u16(&image.data, storage);
    let mut stream = Vec::with_capacity(samples.len());
    let widths = core::iter::repeat_n(sw, count).chain(core::iter::once(last));
    let mut x = 0;
    for sw in widths {
        for y in 0..h {
            stream.extend_from_slice(&samples[y * w + x..y * w + x + sw]);
        }
        x += sw;
    }
    // Frame rows hold two samples per column, the usual CR2 arrangement.
    let frame_w = if w % 2 == 0 { w / 2 } else { w };
    let comps = if w % 2 == 0 { 2 } else { 1 };
    let (Ok(fw), Ok(fh)) = (u16::try_from(frame_w), u16::try_from(h)) else {
        return Err(DngError::InvalidData("CR2 frame exceeds 65535".into()));
    };
    ljpeg::encode(&stream, fw, fh, comps, image.bits_per_sample as u8, 1)
}

fn to_u32(n: usize) -> Result<u32, DngError> {
    u32::try_from(n).map_err(|_| DngError::LimitExceeded(format!("offset {n} beyond 4 GiB")))
}
