//! Tag numbers and enumerated tag values used by DNG/TIFF.

// Baseline TIFF
pub(crate) const NEW_SUBFILE_TYPE: u16 = 254;
pub(crate) const SUBFILE_TYPE: u16 = 255;
pub(crate) const IMAGE_WIDTH: u16 = 256;
pub(crate) const IMAGE_LENGTH: u16 = 257;
pub(crate) const BITS_PER_SAMPLE: u16 = 258;
pub(crate) const COMPRESSION: u16 = 259;
pub(crate) const PHOTOMETRIC: u16 = 262;
pub(crate) const MAKE: u16 = 271;
pub(crate) const MODEL: u16 = 272;
pub(crate) const STRIP_OFFSETS: u16 = 273;
pub(crate) const ORIENTATION: u16 = 274;
pub(crate) const SAMPLES_PER_PIXEL: u16 = 277;
pub(crate) const ROWS_PER_STRIP: u16 = 278;
pub(crate) const STRIP_BYTE_COUNTS: u16 = 279;
pub(crate) const PLANAR_CONFIGURATION: u16 = 284;
pub(crate) const PREDICTOR: u16 = 317;
pub(crate) const TILE_WIDTH: u16 = 322;
pub(crate) const TILE_LENGTH: u16 = 323;
pub(crate) const TILE_OFFSETS: u16 = 324;
pub(crate) const TILE_BYTE_COUNTS: u16 = 325;
pub(crate) const SUB_IFDS: u16 = 330;
pub(crate) const SAMPLE_FORMAT: u16 = 339;
pub(crate) const JPEG_IF_OFFSET: u16 = 513;
pub(crate) const JPEG_IF_BYTE_COUNT: u16 = 514;

// Legacy raw aliases for width/height/bits (Panasonic-style IFDs)
pub(crate) const ALT_WIDTH: [u16; 2] = [2, 61441];
pub(crate) const ALT_HEIGHT: [u16; 2] = [3, 61442];
pub(crate) const ALT_BITS_PER_SAMPLE: u16 = 61443;

// TIFF/EP and EXIF
pub(crate) const CFA_REPEAT_PATTERN_DIM: u16 = 33421;
pub(crate) const CFA_PATTERN: u16 = 33422;
pub(crate) const EXPOSURE_TIME: u16 = 33434;
pub(crate) const F_NUMBER: u16 = 33437;
pub(crate) const EXIF_IFD: u16 = 34665;
pub(crate) const ISO_SPEED: u16 = 34855;
pub(crate) const SHUTTER_SPEED_VALUE: u16 = 37377;
pub(crate) const MAKER_NOTE: u16 = 37500;

// DNG
pub(crate) const DNG_VERSION: u16 = 50706;
pub(crate) const UNIQUE_CAMERA_MODEL: u16 = 50708;
pub(crate) const CFA_PLANE_COLOR: u16 = 50710;
pub(crate) const CFA_LAYOUT: u16 = 50711;
pub(crate) const BLACK_LEVEL: u16 = 50714;
pub(crate) const WHITE_LEVEL: u16 = 50717;
pub(crate) const COLOR_MATRIX1: u16 = 50721;
pub(crate) const COLOR_MATRIX2: u16 = 50722;
pub(crate) const CAMERA_CALIBRATION1: u16 = 50723;
pub(crate) const CAMERA_CALIBRATION2: u16 = 50724;
pub(crate) const ANALOG_BALANCE: u16 = 50727;
pub(crate) const AS_SHOT_NEUTRAL: u16 = 50728;
pub(crate) const CR2_SLICES: u16 = 50752;
pub(crate) const CALIBRATION_ILLUMINANT1: u16 = 50778;
pub(crate) const CALIBRATION_ILLUMINANT2: u16 = 50779;
pub(crate) const ACTIVE_AREA: u16 = 50829;
pub(crate) const FORWARD_MATRIX1: u16 = 50964;
pub(crate) const FORWARD_MATRIX2: u16 = 50965;

/// Lowest tag number an image IFD is expected to use.
pub(crate) const FIRST_IMAGE_TAG: u16 = NEW_SUBFILE_TYPE;

// PhotometricInterpretation values written by the DNG writer.
pub(crate) const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
pub(crate) const PHOTOMETRIC_RGB: u16 = 2;
pub(crate) const PHOTOMETRIC_CFA: u16 = 32803;
pub(crate) const PHOTOMETRIC_LINEAR_RAW: u16 = 34892;

/// NewSubfileType bit marking a reduced-resolution (preview) image.
pub const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// Compression scheme of an image's strips or tiles.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    Lzw,
    /// Old-style JPEG (6): CR2 lossless JPEG or a baseline JPEG thumbnail.
    OldJpeg,
    /// JPEG (7): lossless JPEG raw data, or baseline JPEG previews.
    Jpeg,
    /// Adobe Deflate (8), or the legacy 32946 code.
    Deflate,
    /// Lossy DNG (34892): baseline JPEG tiles.
    LossyJpeg,
    /// Nikon NEF Huffman (34713).
    Nef,
    Other(u16),
}

impl Compression {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::None,
            5 => Self::Lzw,
            6 => Self::OldJpeg,
            7 => Self::Jpeg,
            8 | 32946 => Self::Deflate,
            34892 => Self::LossyJpeg,
            34713 => Self::Nef,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::None => 1,
            Self::Lzw => 5,
            Self::OldJpeg => 6,
            Self::Jpeg => 7,
            Self::Deflate => 8,
            Self::LossyJpeg => 34892,
            Self::Nef => 34713,
            Self::Other(code) => *code,
        }
    }
}

/// EXIF LightSource values used by CalibrationIlluminant1/2.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LightSource {
    #[default]
    Unknown,
    Daylight,
    Fluorescent,
    Tungsten,
    Flash,
    FineWeather,
    CloudyWeather,
    Shade,
    DaylightFluorescent,
    DayWhiteFluorescent,
    CoolWhiteFluorescent,
    WhiteFluorescent,
    StandardLightA,
    StandardLightB,
    StandardLightC,
    D55,
    D65,
    D75,
    D50,
    IsoStudioTungsten,
    Other,
    Unrecognized(u16),
}

impl LightSource {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Daylight,
            2 => Self::Fluorescent,
            3 => Self::Tungsten,
            4 => Self::Flash,
            9 => Self::FineWeather,
            10 => Self::CloudyWeather,
            11 => Self::Shade,
            12 => Self::DaylightFluorescent,
            13 => Self::DayWhiteFluorescent,
            14 => Self::CoolWhiteFluorescent,
            15 => Self::WhiteFluorescent,
            17 => Self::StandardLightA,
            18 => Self::StandardLightB,
            19 => Self::StandardLightC,
            20 => Self::D55,
            21 => Self::D65,
            22 => Self::D75,
            23 => Self::D50,
            24 => Self::IsoStudioTungsten,
            255 => Self::Other,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Unknown => 0,
            Self::Daylight => 1,
            Self::Fluorescent => 2,
            Self::Tungsten => 3,
            Self::Flash => 4,
            Self::FineWeather => 9,
            Self::CloudyWeather => 10,
            Self::Shade => 11,
            Self::DaylightFluorescent => 12,
            Self::DayWhiteFluorescent => 13,
            Self::CoolWhiteFluorescent => 14,
            Self::WhiteFluorescent => 15,
            Self::StandardLightA => 17,
            Self::StandardLightB => 18,
            Self::StandardLightC => 19,
            Self::D55 => 20,
            Self::D65 => 21,
            Self::D75 => 22,
            Self::D50 => 23,
            Self::IsoStudioTungsten => 24,
            Self::Other => 255,
            Self::Unrecognized(code) => *code,
        }
    }
}
