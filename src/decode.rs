use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use enough::Stop;

use crate::decompress;
use crate::error::{DngError, warn};
use crate::exif::Exif;
use crate::field::FieldInfo;
use crate::image::DngImage;
use crate::limits::Limits;
use crate::tiff::{ByteOrder, parse_container};

/// Decode request builder.
///
/// ```no_run
/// use zendng::{DecodeRequest, Limits, Unstoppable};
///
/// let data: &[u8] = &[]; // your DNG bytes
/// let limits = Limits {
///     max_pixels: Some(100_000_000),
///     ..Default::default()
/// };
/// let output = DecodeRequest::new(data)
///     .with_limits(&limits)
///     .decode(Unstoppable)?;
/// if let Some(raw) = output.largest() {
///     println!("{}x{} {} bits", raw.width, raw.height, raw.bits_per_sample);
/// }
/// # Ok::<(), zendng::DngError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    limits: Option<&'a Limits>,
    custom_fields: &'a [FieldInfo],
    strict: bool,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            limits: None,
            custom_fields: &[],
            strict: false,
        }
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Capture these extra tags into [`DngImage::custom_fields`].
    pub fn with_custom_fields(mut self, fields: &'a [FieldInfo]) -> Self {
        self.custom_fields = fields;
        self
    }

    /// Fail on the first image that cannot be decoded instead of keeping
    /// its metadata and recording a warning.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parse the container and decode every image.
    pub fn decode(self, stop: impl Stop) -> Result<DecodeOutput<'a>, DngError> {
        let stop: &dyn Stop = &stop;
        let data = self.data;
        let mut warnings = Vec::new();
        let container = parse_container(data, self.limits, &mut warnings)?;
        let order = container.order;
        let exif = Exif::collect(container.images.first(), container.exif.as_ref());

        let mut first_error: Option<DngError> = None;
        let mut images = Vec::with_capacity(container.images.len());
        for ifd in &container.images {
            stop.check()?;
            match DngImage::from_ifd(ifd, order, self.custom_fields, &mut warnings) {
                Ok(image) => images.push(image),
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    warn(&mut warnings, format!("IFD at {} skipped: {e}", ifd.offset));
                    first_error.get_or_insert(e);
                }
            }
        }
        if images.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| DngError::InvalidIfd("no image directories".into())));
        }

        for image in &mut images {
            stop.check()?;
            let before = (
                image.width,
                image.height,
                image.samples_per_pixel,
                image.bits_per_sample,
                image.bits_per_sample_original,
                image.sample_format,
            );
            match decompress::decode_image(data, image, order, self.limits, &mut warnings, stop) {
                Ok(()) => log::debug!(
                    "IFD at {}: decoded {}x{}x{} at {} bits ({} bytes)",
                    image.ifd_offset,
                    image.width,
                    image.height,
                    image.samples_per_pixel,
                    image.bits_per_sample,
                    image.pixels().len()
                ),
                Err(e @ DngError::Cancelled(_)) => return Err(e),
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    (
                        image.width,
                        image.height,
                        image.samples_per_pixel,
                        image.bits_per_sample,
                        image.bits_per_sample_original,
                        image.sample_format,
                    ) = before;
                    warn(
                        &mut warnings,
                        format!("IFD at {}: pixels not decoded: {e}", image.ifd_offset),
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        if !images.iter().any(DngImage::has_pixels)
            && let Some(e) = first_error
        {
            return Err(e);
        }

        Ok(DecodeOutput {
            images,
            exif,
            warnings,
            byte_order: order,
            is_cr2: container.is_cr2,
        })
    }
}

/// Decode every image of a DNG with default settings.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<DecodeOutput<'_>, DngError> {
    DecodeRequest::new(data).decode(stop)
}

/// All images of a decoded file.
///
/// Pixel buffers may borrow from the input (uncompressed 8-bit strips);
/// [`DecodeOutput::into_owned`] detaches them.
#[derive(Clone, Debug)]
pub struct DecodeOutput<'a> {
    /// Images in load order: IFD0, its SubIFDs depth-first, then the next
    /// chained IFD.
    pub images: Vec<DngImage<'a>>,
    pub exif: Exif,
    /// Recoverable problems met while loading.
    pub warnings: Vec<String>,
    pub byte_order: ByteOrder,
    /// The header carries the Canon "CR" marker.
    pub is_cr2: bool,
}

impl<'a> DecodeOutput<'a> {
    /// Index of the full-resolution image: the widest image with decoded
    /// pixels, ties going to the higher decoded bit depth.
    pub fn largest_index(&self) -> Option<usize> {
        let mut best: Option<(usize, &DngImage<'a>)> = None;
        for (i, image) in self.images.iter().enumerate() {
            if !image.has_pixels() {
                continue;
            }
            best = match best {
                Some((_, b))
                    if image.width > b.width
                        || (image.width == b.width && image.bits_per_sample > b.bits_per_sample) =>
                {
                    Some((i, image))
                }
                None => Some((i, image)),
                keep => keep,
            };
        }
        best.map(|(i, _)| i)
    }

    pub fn largest(&self) -> Option<&DngImage<'a>> {
        self.largest_index().map(|i| &self.images[i])
    }

    /// Take ownership of all pixel data (copies borrowed buffers).
    pub fn into_owned(self) -> DecodeOutput<'static> {
        DecodeOutput {
            images: self.images.into_iter().map(DngImage::into_owned).collect(),
            exif: self.exif,
            warnings: self.warnings,
            byte_order: self.byte_order,
            is_cr2: self.is_cr2,
        }
    }
}
