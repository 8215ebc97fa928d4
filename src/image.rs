//! Per-image metadata and decoded samples.

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "rgb")]
use rgb::AsPixels as _;

use crate::error::{DngError, warn};
use crate::field::{self, FieldData, FieldInfo};
use crate::pixel::{PixelLayout, SampleFormat, SampleType};
use crate::tiff::tags::{self, Compression, LightSource};
use crate::tiff::{ByteOrder, Ifd};

/// Row-major 3x3 matrix.
pub type Matrix3 = [[f64; 3]; 3];

pub const IDENTITY: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// One image of a DNG file: its metadata and decoded samples.
///
/// Samples are interleaved, row-major and native-endian, widened to
/// `bits_per_sample` (8, 16 or 32) bits. The value range is still that of
/// `bits_per_sample_original`.
#[derive(Clone, Debug)]
pub struct DngImage<'a> {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    /// Storage bits per sample after decoding.
    pub bits_per_sample: u32,
    /// Bits per sample as stored in the file.
    pub bits_per_sample_original: u32,
    pub sample_format: SampleFormat,
    pub compression: Compression,
    pub photometric: Option<u16>,
    /// NewSubfileType; bit 0 marks a reduced-resolution preview.
    pub new_subfile_type: u32,
    pub orientation: u16,
    pub planar_configuration: u16,
    pub predictor: u16,
    pub rows_per_strip: u32,
    pub strip_offsets: Vec<u32>,
    pub strip_byte_counts: Vec<u32>,
    pub tile_width: Option<u32>,
    pub tile_length: Option<u32>,
    pub tile_offsets: Vec<u32>,
    pub tile_byte_counts: Vec<u32>,
    /// JPEGInterchangeFormat (old-style JPEG and CR2 thumbnails).
    pub jpeg_offset: u32,
    pub jpeg_byte_count: u32,

    /// CFARepeatPatternDim as (rows, cols).
    pub cfa_repeat_dim: (u16, u16),
    /// CFAPattern, `rows * cols` plane indices.
    pub cfa_pattern: Option<Vec<u8>>,
    /// CFAPlaneColor: color of each plane index (0=R 1=G 2=B 3=C 4=M 5=Y 6=W).
    pub cfa_plane_color: Vec<u8>,
    pub cfa_layout: u16,

    pub dng_version: Option<[u8; 4]>,
    pub unique_camera_model: Option<String>,
    pub black_level: [f64; 4],
    pub white_level: [u32; 4],
    pub color_matrix1: Matrix3,
    pub color_matrix2: Matrix3,
    pub camera_calibration1: Matrix3,
    pub camera_calibration2: Matrix3,
    pub forward_matrix1: Matrix3,
    pub forward_matrix2: Matrix3,
    pub analog_balance: Option<[f64; 3]>,
    pub as_shot_neutral: Option<[f64; 3]>,
    pub calibration_illuminant1: LightSource,
    pub calibration_illuminant2: LightSource,
    /// ActiveArea as top, left, bottom, right.
    pub active_area: Option<[u32; 4]>,
    /// Canon CR2 slice layout: count, slice width, last slice width.
    pub cr2_slices: Option<[u16; 3]>,

    pub custom_fields: Vec<FieldData>,
    /// Byte order of the source file (applies to custom field data).
    pub byte_order: ByteOrder,
    /// File offset of this image's IFD.
    pub ifd_offset: u32,

    pixels: Cow<'a, [u8]>,
}

fn matrix(ifd: &Ifd<'_>, tag: u16) -> Matrix3 {
    let Some(entry) = ifd.get(tag) else {
        return IDENTITY;
    };
    let v = entry.f64_values();
    if v.len() < 9 {
        return IDENTITY;
    }
    [[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]]
}

fn triple(ifd: &Ifd<'_>, tag: u16) -> Option<[f64; 3]> {
    let v = ifd.get(tag)?.f64_values();
    (v.len() >= 3).then(|| [v[0], v[1], v[2]])
}

/// Spread up to four per-sample values; a single value applies to all.
fn per_sample<T: Copy + Default>(values: &[T]) -> [T; 4] {
    let mut out = [T::default(); 4];
    match values {
        [] => {}
        [one] => out = [*one; 4],
        many => {
            for (o, v) in out.iter_mut().zip(many) {
                *o = *v;
            }
        }
    }
    out
}

impl<'a> DngImage<'a> {
    /// Build the metadata for one image IFD. Pixels stay empty.
    pub(crate) fn from_ifd(
        ifd: &Ifd<'_>,
        order: ByteOrder,
        custom: &[FieldInfo],
        warnings: &mut Vec<String>,
    ) -> Result<Self, DngError> {
        let lookup = |primary: u16, alts: &[u16]| {
            ifd.u32(primary)
                .or_else(|| alts.iter().find_map(|&t| ifd.u32(t)))
        };
        let at = ifd.offset;
        let width = lookup(tags::IMAGE_WIDTH, &tags::ALT_WIDTH)
            .ok_or_else(|| DngError::InvalidIfd(format!("IFD at {at}: missing ImageWidth")))?;
        let height = lookup(tags::IMAGE_LENGTH, &tags::ALT_HEIGHT)
            .ok_or_else(|| DngError::InvalidIfd(format!("IFD at {at}: missing ImageLength")))?;

        let bps_values = ifd
            .get(tags::BITS_PER_SAMPLE)
            .or_else(|| ifd.get(tags::ALT_BITS_PER_SAMPLE))
            .map(|e| e.u32_values())
            .unwrap_or_default();
        let bits = bps_values.first().copied().unwrap_or(1);
        if bps_values.iter().any(|&b| b != bits) {
            warn(
                warnings,
                format!("IFD at {at}: mixed BitsPerSample {bps_values:?}, using {bits}"),
            );
        }
        if bits == 0 || bits > 32 {
            return Err(DngError::InvalidIfd(format!(
                "IFD at {at}: BitsPerSample {bits} out of range"
            )));
        }

        let samples_per_pixel = ifd.u32(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        if !(1..=4).contains(&samples_per_pixel) {
            return Err(DngError::InvalidIfd(format!(
                "IFD at {at}: SamplesPerPixel {samples_per_pixel} must be 1..=4"
            )));
        }
        let planar_configuration = ifd.u32(tags::PLANAR_CONFIGURATION).unwrap_or(1) as u16;
        if !(1..=2).contains(&planar_configuration) {
            return Err(DngError::InvalidIfd(format!(
                "IFD at {at}: PlanarConfiguration {planar_configuration}"
            )));
        }

        let list = |tag: u16| ifd.get(tag).map(|e| e.u32_values()).unwrap_or_default();

        let cfa_repeat_dim = match ifd.get(tags::CFA_REPEAT_PATTERN_DIM).map(|e| e.u32_values()) {
            Some(v) if v.len() >= 2 => (v[0] as u16, v[1] as u16),
            _ => (2, 2),
        };
        let cfa_pattern = match ifd.get(tags::CFA_PATTERN) {
            Some(e) => {
                let expected = usize::from(cfa_repeat_dim.0) * usize::from(cfa_repeat_dim.1);
                if e.data.len() == expected && expected > 0 {
                    Some(e.data.to_vec())
                } else {
                    warn(
                        warnings,
                        format!(
                            "IFD at {at}: CFAPattern has {} entries, expected {expected}; ignored",
                            e.data.len()
                        ),
                    );
                    None
                }
            }
            None => None,
        };
        let cfa_plane_color = ifd
            .get(tags::CFA_PLANE_COLOR)
            .map(|e| e.data.iter().take(4).copied().collect())
            .unwrap_or_else(|| alloc::vec![0, 1, 2]);

        let dng_version = ifd
            .get(tags::DNG_VERSION)
            .and_then(|e| <[u8; 4]>::try_from(e.data).ok());

        let black = ifd
            .get(tags::BLACK_LEVEL)
            .map(|e| e.f64_values())
            .unwrap_or_default();
        let white = list(tags::WHITE_LEVEL);
        let white_level = if white.is_empty() {
            let default = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
            [default; 4]
        } else {
            per_sample(&white)
        };

        let active_area = match list(tags::ACTIVE_AREA).as_slice() {
            [top, left, bottom, right, ..] => Some([*top, *left, *bottom, *right]),
            _ => None,
        };
        let cr2_slices = match list(tags::CR2_SLICES).as_slice() {
            [n, w, last, ..] => Some([*n as u16, *w as u16, *last as u16]),
            _ => None,
        };

        let illuminant = |tag| {
            ifd.u32(tag)
                .map_or(LightSource::Unknown, |c| LightSource::from_code(c as u16))
        };

        let image = DngImage {
            width,
            height,
            samples_per_pixel,
            bits_per_sample: bits,
            bits_per_sample_original: bits,
            sample_format: ifd
                .u32(tags::SAMPLE_FORMAT)
                .map_or(SampleFormat::Uint, SampleFormat::from_code),
            compression: Compression::from_code(ifd.u32(tags::COMPRESSION).unwrap_or(1) as u16),
            photometric: ifd.u32(tags::PHOTOMETRIC).map(|p| p as u16),
            new_subfile_type: ifd
                .u32(tags::NEW_SUBFILE_TYPE)
                .or_else(|| ifd.u32(tags::SUBFILE_TYPE).map(|t| u32::from(t == 2)))
                .unwrap_or(0),
            orientation: ifd.u32(tags::ORIENTATION).unwrap_or(1) as u16,
            planar_configuration,
            predictor: ifd.u32(tags::PREDICTOR).unwrap_or(1) as u16,
            rows_per_strip: ifd
                .u32(tags::ROWS_PER_STRIP)
                .filter(|&r| r > 0)
                .map_or(height, |r| r.min(height.max(1))),
            strip_offsets: list(tags::STRIP_OFFSETS),
            strip_byte_counts: list(tags::STRIP_BYTE_COUNTS),
            tile_width: ifd.u32(tags::TILE_WIDTH),
            tile_length: ifd.u32(tags::TILE_LENGTH),
            tile_offsets: list(tags::TILE_OFFSETS),
            tile_byte_counts: list(tags::TILE_BYTE_COUNTS),
            jpeg_offset: ifd.u32(tags::JPEG_IF_OFFSET).unwrap_or(0),
            jpeg_byte_count: ifd.u32(tags::JPEG_IF_BYTE_COUNT).unwrap_or(0),
            cfa_repeat_dim,
            cfa_pattern,
            cfa_plane_color,
            cfa_layout: ifd.u32(tags::CFA_LAYOUT).unwrap_or(1) as u16,
            dng_version,
            unique_camera_model: ifd.get(tags::UNIQUE_CAMERA_MODEL).map(|e| e.ascii()),
            black_level: per_sample(&black),
            white_level,
            color_matrix1: matrix(ifd, tags::COLOR_MATRIX1),
            color_matrix2: matrix(ifd, tags::COLOR_MATRIX2),
            camera_calibration1: matrix(ifd, tags::CAMERA_CALIBRATION1),
            camera_calibration2: matrix(ifd, tags::CAMERA_CALIBRATION2),
            forward_matrix1: matrix(ifd, tags::FORWARD_MATRIX1),
            forward_matrix2: matrix(ifd, tags::FORWARD_MATRIX2),
            analog_balance: triple(ifd, tags::ANALOG_BALANCE),
            as_shot_neutral: triple(ifd, tags::AS_SHOT_NEUTRAL),
            calibration_illuminant1: illuminant(tags::CALIBRATION_ILLUMINANT1),
            calibration_illuminant2: illuminant(tags::CALIBRATION_ILLUMINANT2),
            active_area,
            cr2_slices,
            custom_fields: field::capture(ifd, custom, warnings),
            byte_order: order,
            ifd_offset: ifd.offset,
            pixels: Cow::Borrowed(&[]),
        };
        log::debug!(
            "IFD at {at}: {width}x{height}, {samples_per_pixel} spp, {bits} bps, {:?}",
            image.compression
        );
        Ok(image)
    }

    /// Access the decoded samples. Empty when the image was not decoded.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether samples were decoded for this image.
    pub fn has_pixels(&self) -> bool {
        !self.pixels.is_empty()
    }

    /// Whether the pixel data is borrowed (zero-copy from input).
    pub fn is_borrowed(&self) -> bool {
        matches!(self.pixels, Cow::Borrowed(p) if !p.is_empty())
    }

    /// Take ownership of the pixel data (copies if borrowed).
    pub fn into_owned(self) -> DngImage<'static> {
        DngImage {
            width: self.width,
            height: self.height,
            samples_per_pixel: self.samples_per_pixel,
            bits_per_sample: self.bits_per_sample,
            bits_per_sample_original: self.bits_per_sample_original,
            sample_format: self.sample_format,
            compression: self.compression,
            photometric: self.photometric,
            new_subfile_type: self.new_subfile_type,
            orientation: self.orientation,
            planar_configuration: self.planar_configuration,
            predictor: self.predictor,
            rows_per_strip: self.rows_per_strip,
            strip_offsets: self.strip_offsets,
            strip_byte_counts: self.strip_byte_counts,
            tile_width: self.tile_width,
            tile_length: self.tile_length,
            tile_offsets: self.tile_offsets,
            tile_byte_counts: self.tile_byte_counts,
            jpeg_offset: self.jpeg_offset,
            jpeg_byte_count: self.jpeg_byte_count,
            cfa_repeat_dim: self.cfa_repeat_dim,
            cfa_pattern: self.cfa_pattern,
            cfa_plane_color: self.cfa_plane_color,
            cfa_layout: self.cfa_layout,
            dng_version: self.dng_version,
            unique_camera_model: self.unique_camera_model,
            black_level: self.black_level,
            white_level: self.white_level,
            color_matrix1: self.color_matrix1,
            color_matrix2: self.color_matrix2,
            camera_calibration1: self.camera_calibration1,
            camera_calibration2: self.camera_calibration2,
            forward_matrix1: self.forward_matrix1,
            forward_matrix2: self.forward_matrix2,
            analog_balance: self.analog_balance,
            as_shot_neutral: self.as_shot_neutral,
            calibration_illuminant1: self.calibration_illuminant1,
            calibration_illuminant2: self.calibration_illuminant2,
            active_area: self.active_area,
            cr2_slices: self.cr2_slices,
            custom_fields: self.custom_fields,
            byte_order: self.byte_order,
            ifd_offset: self.ifd_offset,
            pixels: Cow::Owned(self.pixels.into_owned()),
        }
    }

    pub(crate) fn set_pixels(&mut self, pixels: Cow<'a, [u8]>) {
        self.pixels = pixels;
    }

    /// Storage type of the decoded samples.
    pub fn sample_type(&self) -> SampleType {
        SampleType::for_bits(self.bits_per_sample, self.sample_format).unwrap_or(SampleType::U32)
    }

    /// Memory layout of [`Self::pixels`].
    pub fn layout(&self) -> PixelLayout {
        PixelLayout::new(self.samples_per_pixel as u8, self.sample_type())
    }

    /// DNGVersion packed little-endian (1.4.0.0 is `0x0000_0401`).
    pub fn version(&self) -> u32 {
        self.dng_version.map_or(0, u32::from_le_bytes)
    }

    pub fn is_dng(&self) -> bool {
        self.dng_version.is_some()
    }

    /// Whether NewSubfileType marks this image as a reduced-resolution preview.
    pub fn is_preview(&self) -> bool {
        self.new_subfile_type & tags::SUBFILE_REDUCED_IMAGE != 0
    }

    /// Plane index of the CFA site at (`row`, `col`).
    pub fn cfa_color(&self, row: u32, col: u32) -> Option<u8> {
        let pattern = self.cfa_pattern.as_ref()?;
        let (rows, cols) = (u32::from(self.cfa_repeat_dim.0), u32::from(self.cfa_repeat_dim.1));
        if rows == 0 || cols == 0 {
            return None;
        }
        pattern
            .get(((row % rows) * cols + col % cols) as usize)
            .copied()
    }

    /// The CFA pattern as a 2x2 grid, for the common Bayer layouts.
    pub fn cfa_pattern_2x2(&self) -> Option<[[u8; 2]; 2]> {
        if self.cfa_repeat_dim != (2, 2) {
            return None;
        }
        let p = self.cfa_pattern.as_ref()?;
        Some([[p[0], p[1]], [p[2], p[3]]])
    }

    /// Size in bytes of the decoded sample buffer.
    pub(crate) fn output_len(&self) -> Result<usize, DngError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(self.samples_per_pixel as usize))
            .and_then(|n| n.checked_mul(self.sample_type().bytes()))
            .ok_or(DngError::DimensionsTooLarge {
                width: self.width,
                height: self.height,
            })
    }

    /// Decoded 16-bit samples, or `None` for other storage types.
    pub fn samples_u16(&self) -> Option<Vec<u16>> {
        if self.sample_type() != SampleType::U16 {
            return None;
        }
        Some(
            self.pixels
                .chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                .collect(),
        )
    }

    /// Decoded 32-bit float samples, or `None` for other storage types.
    pub fn samples_f32(&self) -> Option<Vec<f32>> {
        if self.sample_type() != SampleType::F32 {
            return None;
        }
        Some(
            self.pixels
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Reinterpret 8-bit pixel data as a typed pixel slice.
    ///
    /// Returns [`DngError::LayoutMismatch`] if the layout doesn't match `P`.
    #[cfg(feature = "rgb")]
    pub fn as_pixels<P: crate::DecodePixel>(&self) -> Result<&[P], DngError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        if self.layout() != P::layout() {
            return Err(DngError::LayoutMismatch {
                expected: P::layout(),
                actual: self.layout(),
            });
        }
        Ok(self.pixels().as_pixels())
    }

    /// Zero-copy view as an [`imgref::ImgRef`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn as_imgref<P: crate::DecodePixel>(&self) -> Result<imgref::ImgRef<'_, P>, DngError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }

    /// Convert to an [`imgref::ImgVec`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec<P: crate::DecodePixel>(&self) -> Result<imgref::ImgVec<P>, DngError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgVec::new(
            pixels.to_vec(),
            self.width as usize,
            self.height as usize,
        ))
    }
}
