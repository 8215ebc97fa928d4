use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::{ByteOrder, Cursor};
use crate::error::{DngError, warn};

/// TIFF field (value) types.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd,
    Long8,
    SLong8,
    Ifd8,
}

impl FieldType {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            13 => Self::Ifd,
            16 => Self::Long8,
            17 => Self::SLong8,
            18 => Self::Ifd8,
            _ => return None,
        })
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Ascii => 2,
            Self::Short => 3,
            Self::Long => 4,
            Self::Rational => 5,
            Self::SByte => 6,
            Self::Undefined => 7,
            Self::SShort => 8,
            Self::SLong => 9,
            Self::SRational => 10,
            Self::Float => 11,
            Self::Double => 12,
            Self::Ifd => 13,
            Self::Long8 => 16,
            Self::SLong8 => 17,
            Self::Ifd8 => 18,
        }
    }

    /// Size in bytes of one element.
    pub fn size(&self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational
            | Self::SRational
            | Self::Double
            | Self::Long8
            | Self::SLong8
            | Self::Ifd8 => 8,
        }
    }
}

/// One IFD entry with its value bytes resolved.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry<'a> {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    /// Value bytes, `count * field_type.size()` long.
    pub data: &'a [u8],
    /// File offset of an out-of-line value; `None` when stored inline.
    pub value_offset: Option<u32>,
    pub order: ByteOrder,
}

impl<'a> Entry<'a> {
    fn element(&self, i: usize) -> Option<&'a [u8]> {
        let size = self.field_type.size();
        let start = i.checked_mul(size)?;
        self.data.get(start..start + size)
    }

    fn u16_in(&self, b: &[u8]) -> u16 {
        self.order.u16([b[0], b[1]])
    }

    fn u32_in(&self, b: &[u8]) -> u32 {
        self.order.u32([b[0], b[1], b[2], b[3]])
    }

    fn u64_in(&self, b: &[u8]) -> u64 {
        self.order
            .u64([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// Value `i` as an unsigned integer. Rationals yield their integer
    /// quotient; negative signed values yield `None`.
    pub fn u32_at(&self, i: usize) -> Option<u32> {
        let b = self.element(i)?;
        match self.field_type {
            FieldType::Byte | FieldType::Undefined => Some(u32::from(b[0])),
            FieldType::Short => Some(u32::from(self.u16_in(b))),
            FieldType::Long | FieldType::Ifd => Some(self.u32_in(b)),
            FieldType::Rational => {
                let num = self.u32_in(&b[0..4]);
                let den = self.u32_in(&b[4..8]);
                Some(num.checked_div(den).unwrap_or(0))
            }
            FieldType::SByte => u32::try_from(b[0] as i8).ok(),
            FieldType::SShort => u32::try_from(self.u16_in(b) as i16).ok(),
            FieldType::SLong => u32::try_from(self.u32_in(b) as i32).ok(),
            FieldType::Long8 | FieldType::Ifd8 => u32::try_from(self.u64_in(b)).ok(),
            FieldType::SLong8 => u32::try_from(self.u64_in(b) as i64).ok(),
            _ => None,
        }
    }

    /// Value `i` as a float, for any numeric type.
    pub fn f64_at(&self, i: usize) -> Option<f64> {
        let b = self.element(i)?;
        match self.field_type {
            FieldType::Rational => {
                let num = self.u32_in(&b[0..4]);
                let den = self.u32_in(&b[4..8]);
                if den == 0 {
                    return Some(0.0);
                }
                Some(f64::from(num) / f64::from(den))
            }
            FieldType::SRational => {
                let num = self.u32_in(&b[0..4]) as i32;
                let den = self.u32_in(&b[4..8]) as i32;
                if den == 0 {
                    return Some(0.0);
                }
                Some(f64::from(num) / f64::from(den))
            }
            FieldType::Float => Some(f64::from(f32::from_bits(self.u32_in(b)))),
            FieldType::Double => Some(f64::from_bits(self.u64_in(b))),
            FieldType::SByte => Some(f64::from(b[0] as i8)),
            FieldType::SShort => Some(f64::from(self.u16_in(b) as i16)),
            FieldType::SLong => Some(f64::from(self.u32_in(b) as i32)),
            FieldType::SLong8 => Some(self.u64_in(b) as i64 as f64),
            FieldType::Long8 | FieldType::Ifd8 => Some(self.u64_in(b) as f64),
            _ => self.u32_at(i).map(f64::from),
        }
    }

    pub fn u32_values(&self) -> Vec<u32> {
        (0..self.count as usize)
            .map_while(|i| self.u32_at(i))
            .collect()
    }

    pub fn f64_values(&self) -> Vec<f64> {
        (0..self.count as usize)
            .map_while(|i| self.f64_at(i))
            .collect()
    }

    /// ASCII value without trailing NULs.
    pub fn ascii(&self) -> String {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }
}

/// One parsed image file directory.
#[derive(Clone, Debug)]
pub(crate) struct Ifd<'a> {
    pub offset: u32,
    pub entries: Vec<Entry<'a>>,
    pub next: u32,
}

impl<'a> Ifd<'a> {
    pub fn get(&self, tag: u16) -> Option<&Entry<'a>> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn u32(&self, tag: u16) -> Option<u32> {
        self.get(tag).and_then(|e| e.u32_at(0))
    }

    /// Parse the IFD at `offset`.
    ///
    /// Entries with an unknown field type, or whose value lies outside the
    /// buffer, are dropped with a warning. The IFD itself must fit.
    pub fn parse(
        data: &'a [u8],
        order: ByteOrder,
        offset: u32,
        warnings: &mut Vec<String>,
    ) -> Result<Self, DngError> {
        let mut cursor = Cursor::new(data, order);
        cursor.set_position(offset as usize)?;
        let count = cursor.read_u16_err()?;
        if count == 0 {
            return Err(DngError::InvalidIfd(format!(
                "IFD at offset {offset} has no entries"
            )));
        }
        log::trace!("IFD at {offset}: {count} entries");

        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let entry_start = cursor.position();
            let tag = cursor.read_u16_err()?;
            let type_code = cursor.read_u16_err()?;
            let value_count = cursor.read_u32_err()?;
            let value_field = cursor.read_bytes_err(4)?;

            let Some(field_type) = FieldType::from_code(type_code) else {
                log::trace!("tag {tag}: unknown field type {type_code}, skipped");
                continue;
            };
            let size = (value_count as usize).checked_mul(field_type.size());
            let (value, value_offset) = match size {
                Some(size) if size <= 4 => (Some(&value_field[..size]), None),
                Some(size) => {
                    let at = order.u32([
                        value_field[0],
                        value_field[1],
                        value_field[2],
                        value_field[3],
                    ]);
                    let value = (at as usize)
                        .checked_add(size)
                        .and_then(|end| data.get(at as usize..end));
                    (value, Some(at))
                }
                None => (None, None),
            };
            let Some(value) = value else {
                warn(
                    warnings,
                    format!(
                        "tag {tag} at offset {entry_start}: value of {value_count} x \
                         {field_type:?} lies outside the file, skipped"
                    ),
                );
                continue;
            };
            entries.push(Entry {
                tag,
                field_type,
                count: value_count,
                data: value,
                value_offset,
                order,
            });
        }
        let next = cursor.read_u32_err()?;

        Ok(Self {
            offset,
            entries,
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn push_entry(out: &mut Vec<u8>, tag: u16, ty: u16, count: u32, value: u32) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&ty.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn inline_and_offset_values() {
        let mut data = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        data.extend_from_slice(&3u16.to_le_bytes());
        push_entry(&mut data, 256, 3, 1, 640);
        // two SHORTs fit inline
        data.extend_from_slice(&258u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&12u16.to_le_bytes());
        data.extend_from_slice(&14u16.to_le_bytes());
        // one RATIONAL lives at offset 50
        push_entry(&mut data, 50714, 5, 1, 50);
        data.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(data.len(), 50);
        data.extend_from_slice(&513u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());

        let mut warnings = Vec::new();
        let ifd = Ifd::parse(&data, ByteOrder::Little, 8, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(ifd.entries.len(), 3);
        assert_eq!(ifd.next, 0);
        assert_eq!(ifd.u32(256), Some(640));
        assert_eq!(ifd.get(258).unwrap().u32_values(), vec![12, 14]);
        let black = ifd.get(50714).unwrap();
        assert_eq!(black.u32_at(0), Some(256));
        assert_eq!(black.f64_at(0), Some(256.5));
    }

    #[test]
    fn out_of_range_value_is_dropped() {
        let mut data = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        data.extend_from_slice(&2u16.to_le_bytes());
        push_entry(&mut data, 256, 3, 1, 16);
        push_entry(&mut data, 50721, 10, 9, 0xFFFF_0000);
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut warnings = Vec::new();
        let ifd = Ifd::parse(&data, ByteOrder::Little, 8, &mut warnings).unwrap();
        assert_eq!(ifd.entries.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn empty_and_truncated_ifds_fail() {
        let mut data = vec![b'I', b'I', 42, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut warnings = Vec::new();
        assert!(matches!(
            Ifd::parse(&data, ByteOrder::Little, 8, &mut warnings),
            Err(DngError::InvalidIfd(_))
        ));
        data[8] = 5;
        assert!(matches!(
            Ifd::parse(&data, ByteOrder::Little, 8, &mut warnings),
            Err(DngError::UnexpectedEof)
        ));
    }

    #[test]
    fn signed_and_float_values() {
        let srational = [0xFF, 0xFF, 0xFF, 0xFE, 0, 0, 0, 4];
        let e = Entry {
            tag: 50721,
            field_type: FieldType::SRational,
            count: 1,
            data: &srational,
            value_offset: None,
            order: ByteOrder::Big,
        };
        assert_eq!(e.f64_at(0), Some(-0.5));
        assert_eq!(e.u32_at(0), None);

        let float = 1.5f32.to_bits().to_be_bytes();
        let e = Entry {
            tag: 0,
            field_type: FieldType::Float,
            count: 1,
            data: &float,
            value_offset: None,
            order: ByteOrder::Big,
        };
        assert_eq!(e.f64_at(0), Some(1.5));
    }

    #[test]
    fn ascii_stops_at_nul() {
        let text = b"Canon\0\0\0";
        let e = Entry {
            tag: 271,
            field_type: FieldType::Ascii,
            count: 8,
            data: text,
            value_offset: Some(100),
            order: ByteOrder::Little,
        };
        assert_eq!(e.ascii(), "Canon");
    }
}
