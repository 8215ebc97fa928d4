use alloc::format;
use alloc::vec::Vec;

use jpeg_decoder::{Decoder, PixelFormat};

use crate::error::DngError;
use crate::limits::Limits;
use crate::pixel::SampleType;

/// A baseline (DCT) JPEG decoded by `jpeg-decoder`.
pub(crate) struct Baseline {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub sample: SampleType,
    /// Native-endian samples.
    pub samples: Vec<u8>,
}

pub(crate) fn decode(data: &[u8], limits: Option<&Limits>) -> Result<Baseline, DngError> {
    let mut decoder = Decoder::new(data);
    decoder
        .read_info()
        .map_err(|e| DngError::Jpeg(format!("{e}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| DngError::Jpeg("missing frame header".into()))?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));
    let (channels, sample) = match info.pixel_format {
        PixelFormat::L8 => (1, SampleType::U8),
        PixelFormat::L16 => (1, SampleType::U16),
        PixelFormat::RGB24 => (3, SampleType::U8),
        PixelFormat::CMYK32 => (4, SampleType::U8),
    };
    let out_len = (width as usize) * (height as usize) * channels * sample.bytes();
    if let Some(limits) = limits {
        limits.check(width, height)?;
        limits.check_memory(out_len)?;
        decoder.set_max_decoding_buffer_size(out_len);
    }

    let mut samples = decoder
        .decode()
        .map_err(|e| DngError::Jpeg(format!("{e}")))?;
    if sample == SampleType::U16 {
        for b in samples.chunks_exact_mut(2) {
            let v = u16::from_be_bytes([b[0], b[1]]);
            b.copy_from_slice(&v.to_ne_bytes());
        }
    }
    log::trace!("baseline JPEG {width}x{height}x{channels} {sample:?}");
    Ok(Baseline {
        width,
        height,
        channels: channels as u32,
        sample,
        samples,
    })
}
