/// Storage type of one decoded sample.
///
/// Decoded buffers always hold samples in native endianness, widened to the
/// next of 8, 16 or 32 bits.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 8-bit unsigned.
    U8,
    /// 16-bit unsigned (native endian).
    U16,
    /// 32-bit unsigned (native endian).
    U32,
    /// 32-bit IEEE float (native endian).
    F32,
}

impl SampleType {
    /// Bytes per sample.
    pub fn bytes(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    /// Bits per sample.
    pub fn bits(&self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Storage type for `bits` stored bits in the given sample format.
    pub(crate) fn for_bits(bits: u32, format: SampleFormat) -> Option<Self> {
        match (bits, format) {
            (32, SampleFormat::Float) => Some(Self::F32),
            (_, SampleFormat::Float) => None,
            (1..=8, _) => Some(Self::U8),
            (9..=16, _) => Some(Self::U16),
            (17..=32, _) => Some(Self::U32),
            _ => None,
        }
    }
}

/// TIFF SampleFormat (tag 339).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    #[default]
    Uint,
    Int,
    Float,
    Undefined,
}

impl SampleFormat {
    pub(crate) fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Uint,
            2 => Self::Int,
            3 => Self::Float,
            _ => Self::Undefined,
        }
    }

    pub(crate) fn code(&self) -> u16 {
        match self {
            Self::Uint => 1,
            Self::Int => 2,
            Self::Float => 3,
            Self::Undefined => 4,
        }
    }
}

/// Pixel memory layout of a decoded image: interleaved channels of one
/// sample type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelLayout {
    pub channels: u8,
    pub sample: SampleType,
}

impl PixelLayout {
    pub const GRAY8: Self = Self::new(1, SampleType::U8);
    pub const GRAY16: Self = Self::new(1, SampleType::U16);
    pub const RGB8: Self = Self::new(3, SampleType::U8);
    pub const RGB16: Self = Self::new(3, SampleType::U16);
    pub const RGBA8: Self = Self::new(4, SampleType::U8);

    pub const fn new(channels: u8, sample: SampleType) -> Self {
        Self { channels, sample }
    }

    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels as usize * self.sample.bytes()
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels as usize
    }
}

/// Pixel types usable with [`crate::DngImage::as_pixels`].
#[cfg(feature = "rgb")]
pub trait DecodePixel: Copy + 'static {
    fn layout() -> PixelLayout;
}

#[cfg(feature = "rgb")]
impl DecodePixel for rgb::RGB8 {
    fn layout() -> PixelLayout {
        PixelLayout::RGB8
    }
}

#[cfg(feature = "rgb")]
impl DecodePixel for rgb::RGBA8 {
    fn layout() -> PixelLayout {
        PixelLayout::RGBA8
    }
}
