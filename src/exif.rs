use alloc::string::String;

use crate::tiff::{Ifd, tags};

/// Capture settings from IFD0 and the EXIF IFD.
///
/// Maker notes are located but not interpreted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exif {
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    /// APEX value.
    pub shutter_speed: Option<f64>,
    pub iso: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// File offset of the MakerNote value.
    pub maker_note_offset: Option<u32>,
}

impl Exif {
    pub(crate) fn collect(ifd0: Option<&Ifd<'_>>, exif: Option<&Ifd<'_>>) -> Self {
        let mut out = Exif::default();
        if let Some(ifd0) = ifd0 {
            out.make = ifd0.get(tags::MAKE).map(|e| e.ascii());
            out.model = ifd0.get(tags::MODEL).map(|e| e.ascii());
        }
        let Some(exif) = exif else {
            return out;
        };
        out.exposure_time = exif.get(tags::EXPOSURE_TIME).and_then(|e| e.f64_at(0));
        out.f_number = exif.get(tags::F_NUMBER).and_then(|e| e.f64_at(0));
        out.shutter_speed = exif
            .get(tags::SHUTTER_SPEED_VALUE)
            .and_then(|e| e.f64_at(0));
        out.iso = exif.u32(tags::ISO_SPEED);
        out.maker_note_offset = exif.get(tags::MAKER_NOTE).and_then(|e| e.value_offset);
        out
    }
}
