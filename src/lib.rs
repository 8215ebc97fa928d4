//! # zendng
//!
//! DNG and TIFF raw container loader. Parses every image of a file (IFD0,
//! chained IFDs and SubIFDs), extracts the camera metadata raw processing
//! needs, and decodes the stored samples into a flat native-endian buffer.
//!
//! ## Supported data
//!
//! - Uncompressed samples of 1 to 32 bits, MSB-first packed below 8/16/32
//! - LZW (5) and Adobe Deflate (8, 32946, `deflate` feature), with the
//!   horizontal and floating point predictors
//! - Lossless JPEG (7, and 6 when the stream is SOF3), including Canon CR2
//!   slices
//! - Baseline JPEG previews and lossy DNG tiles (`jpeg` feature)
//! - Strips and tiles, chunky or planar
//!
//! Samples are widened to 8, 16 or 32 bits. The original depth stays in
//! [`DngImage::bits_per_sample_original`].
//!
//! ## Zero-Copy Decoding
//!
//! Uncompressed 8-bit strips stored back to back are returned as a slice
//! of the input buffer. Everything else is decoded into an owned buffer.
//!
//! ## Non-Goals
//!
//! - Demosaicing, color conversion, lens correction
//! - Nikon NEF compressed data
//! - Maker note interpretation
//! - BigTIFF containers
//!
//! ## Usage
//!
//! ```no_run
//! use zendng::{DecodeRequest, ImageInfo, Unstoppable};
//!
//! let data: &[u8] = &[]; // your DNG bytes
//!
//! // Probe without decoding
//! let info = ImageInfo::from_bytes(data)?;
//! println!("{}x{} {:?}", info.width, info.height, info.compression);
//!
//! // Decode every image; pick the full-resolution one
//! let output = DecodeRequest::new(data).decode(Unstoppable)?;
//! if let Some(raw) = output.largest() {
//!     println!("{}x{}x{} at {} bits", raw.width, raw.height,
//!              raw.samples_per_pixel, raw.bits_per_sample);
//!     let _ = raw.cfa_pattern_2x2();
//! }
//! # Ok::<(), zendng::DngError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod decode;
mod decompress;
mod error;
mod exif;
mod export;
mod field;
mod image;
mod info;
mod limits;
mod ljpeg;
mod loader;
mod pixel;
mod tiff;
mod writer;

// Re-exports
pub use decode::{DecodeOutput, DecodeRequest, decode};
pub use enough::{Stop, Unstoppable};
pub use error::DngError;
pub use exif::Exif;
pub use export::encode_pnm;
pub use field::{FieldData, FieldInfo};
pub use image::{DngImage, IDENTITY, Matrix3};
pub use info::{ImageInfo, probe};
pub use limits::Limits;
pub use loader::{DngLoader, RawDecoder};
#[cfg(feature = "rgb")]
pub use pixel::DecodePixel;
pub use pixel::{PixelLayout, SampleFormat, SampleType};
pub use tiff::tags::{Compression, LightSource, SUBFILE_REDUCED_IMAGE};
pub use tiff::{ByteOrder, FieldType};
pub use writer::{DngWriter, WriteCompression, WriteImage};
