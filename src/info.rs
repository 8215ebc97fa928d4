use alloc::vec::Vec;

use crate::error::DngError;
use crate::image::DngImage;
use crate::tiff::parse_container;
use crate::tiff::tags::Compression;

/// Image header information, read from tags without decoding pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    /// Bits per sample as stored in the file.
    pub bits_per_sample_original: u32,
    pub compression: Compression,
    pub new_subfile_type: u32,
    /// The IFD carries a DNGVersion tag.
    pub is_dng: bool,
}

impl ImageInfo {
    /// Probe the full-resolution image: the widest, ties going to the
    /// higher stored bit depth.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DngError> {
        probe(data)?
            .into_iter()
            .reduce(|best, info| {
                let wider = info.width > best.width;
                let deeper = info.width == best.width
                    && info.bits_per_sample_original > best.bits_per_sample_original;
                if wider || deeper { info } else { best }
            })
            .ok_or_else(|| DngError::InvalidIfd("no image directories".into()))
    }
}

impl From<&DngImage<'_>> for ImageInfo {
    fn from(image: &DngImage<'_>) -> Self {
        Self {
            width: image.width,
            height: image.height,
            samples_per_pixel: image.samples_per_pixel,
            bits_per_sample_original: image.bits_per_sample_original,
            compression: image.compression,
            new_subfile_type: image.new_subfile_type,
            is_dng: image.is_dng(),
        }
    }
}

/// Parse the container and describe every image IFD, in load order.
///
/// Directories missing required tags are left out.
pub fn probe(data: &[u8]) -> Result<Vec<ImageInfo>, DngError> {
    let mut warnings = Vec::new();
    let container = parse_container(data, None, &mut warnings)?;
    let infos: Vec<ImageInfo> = container
        .images
        .iter()
        .filter_map(|ifd| {
            DngImage::from_ifd(ifd, container.order, &[], &mut warnings)
                .map_err(|e| log::debug!("probe: IFD at {} skipped: {e}", ifd.offset))
                .ok()
        })
        .map(|image| ImageInfo::from(&image))
        .collect();
    if infos.is_empty() {
        return Err(DngError::InvalidIfd("no image directories".into()));
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_non_tiff() {
        assert!(matches!(probe(b"P5\n1 1\n255\n\0"), Err(DngError::UnrecognizedFormat)));
        assert!(matches!(probe(b"II*"), Err(DngError::UnexpectedEof)));
    }
}
