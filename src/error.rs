use alloc::string::String;
use enough::StopReason;

/// Errors from DNG/TIFF parsing, decoding and writing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DngError {
    #[error("unrecognized format: not a TIFF/DNG byte order and magic")]
    UnrecognizedFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid IFD: {0}")]
    InvalidIfd(String),

    #[error("unsupported compression {0}")]
    UnsupportedCompression(u16),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid image data: {0}")]
    InvalidData(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("pixel layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: crate::PixelLayout,
        actual: crate::PixelLayout,
    },

    #[error("JPEG decode failed: {0}")]
    Jpeg(String),

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for DngError {
    fn from(r: StopReason) -> Self {
        DngError::Cancelled(r)
    }
}

/// Record a recoverable problem: logged at warn level and kept for the caller.
pub(crate) fn warn(warnings: &mut alloc::vec::Vec<String>, message: String) {
    log::warn!("{message}");
    warnings.push(message);
}
