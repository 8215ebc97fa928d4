//! Load-and-query handle over a whole DNG, answering for its largest image.

use alloc::vec::Vec;

use enough::Unstoppable;

use crate::decode::{DecodeOutput, DecodeRequest};
use crate::error::DngError;
use crate::image::DngImage;
use crate::limits::Limits;

/// Read access to the full-resolution image of a loaded raw file.
///
/// Every accessor is total: after a failed load the dimensions are 0,
/// there is no variant index and the pixel data is empty.
pub trait RawDecoder {
    /// Whether the file loaded and at least one image decoded.
    fn is_valid(&self) -> bool;

    /// Index of the widest decoded image, ties going to the higher bit depth.
    fn largest_variant_index(&self) -> Option<usize>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Samples per pixel.
    fn channel_count(&self) -> u32;

    /// Storage bits per sample: 8, 16 or 32.
    fn bit_depth(&self) -> u32;

    /// Native-endian interleaved samples.
    fn pixel_data(&self) -> &[u8];
}

/// A DNG decoded up front. Construction never fails; a failed load is
/// reported through [`RawDecoder::is_valid`] and [`DngLoader::error`].
///
/// ```no_run
/// use zendng::{DngLoader, RawDecoder};
///
/// let loader = DngLoader::open("raw.dng");
/// if loader.is_valid() {
///     println!("{}x{}, {} bits", loader.width(), loader.height(), loader.bit_depth());
/// }
/// ```
#[derive(Debug)]
pub struct DngLoader {
    loaded: Result<DecodeOutput<'static>, DngError>,
    largest: Option<usize>,
}

impl DngLoader {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_request(DecodeRequest::new(&bytes))
    }

    pub fn with_limits(bytes: Vec<u8>, limits: &Limits) -> Self {
        Self::from_request(DecodeRequest::new(&bytes).with_limits(limits))
    }

    /// Decode with a configured request; the result no longer borrows its input.
    pub fn from_request(request: DecodeRequest<'_>) -> Self {
        let loaded = request.decode(Unstoppable).map(DecodeOutput::into_owned);
        Self::from_result(loaded)
    }

    /// Read and decode a file. An I/O failure is kept as [`DngError::Io`].
    #[cfg(feature = "std")]
    pub fn open(path: impl AsRef<std::path::Path>) -> Self {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => Self::from_bytes(bytes),
            Err(e) => Self::from_result(Err(DngError::Io(e))),
        }
    }

    fn from_result(loaded: Result<DecodeOutput<'static>, DngError>) -> Self {
        let largest = match &loaded {
            Ok(output) => {
                for w in &output.warnings {
                    log::debug!("load warning: {w}");
                }
                output.largest_index()
            }
            Err(e) => {
                log::debug!("load failed: {e}");
                None
            }
        };
        Self { loaded, largest }
    }

    /// Why loading failed, if it did.
    pub fn error(&self) -> Option<&DngError> {
        self.loaded.as_ref().err()
    }

    /// Every image and the file-level metadata.
    pub fn output(&self) -> Option<&DecodeOutput<'static>> {
        self.loaded.as_ref().ok()
    }

    pub fn largest(&self) -> Option<&DngImage<'static>> {
        let i = self.largest?;
        self.output()?.images.get(i)
    }
}

impl RawDecoder for DngLoader {
    fn is_valid(&self) -> bool {
        self.largest.is_some()
    }

    fn largest_variant_index(&self) -> Option<usize> {
        self.largest
    }

    fn width(&self) -> u32 {
        self.largest().map_or(0, |i| i.width)
    }

    fn height(&self) -> u32 {
        self.largest().map_or(0, |i| i.height)
    }

    fn channel_count(&self) -> u32 {
        self.largest().map_or(0, |i| i.samples_per_pixel)
    }

    fn bit_depth(&self) -> u32 {
        self.largest().map_or(0, |i| i.bits_per_sample)
    }

    fn pixel_data(&self) -> &[u8] {
        self.largest().map_or(&[], |i| i.pixels())
    }
}
