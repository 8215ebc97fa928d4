//! TIFF container layer: byte order, header, IFD entries and the IFD walk.
//!
//! DNG and CR2 are both TIFF files, so everything above this module works on
//! the parsed container rather than on raw offsets.

mod cursor;
mod entry;
pub(crate) mod tags;
mod walk;

pub(crate) use cursor::Cursor;
pub use entry::FieldType;
pub(crate) use entry::Ifd;
pub(crate) use walk::parse_container;

use crate::error::DngError;

/// Byte order of a TIFF file, from its "II"/"MM" header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// "II", Intel order.
    #[default]
    Little,
    /// "MM", Motorola order.
    Big,
}

impl ByteOrder {
    pub(crate) fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    pub(crate) fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }

    pub(crate) fn u64(self, b: [u8; 8]) -> u64 {
        match self {
            Self::Little => u64::from_le_bytes(b),
            Self::Big => u64::from_be_bytes(b),
        }
    }

    pub(crate) fn put_u16(self, out: &mut alloc::vec::Vec<u8>, v: u16) {
        match self {
            Self::Little => out.extend_from_slice(&v.to_le_bytes()),
            Self::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub(crate) fn put_u32(self, out: &mut alloc::vec::Vec<u8>, v: u32) {
        match self {
            Self::Little => out.extend_from_slice(&v.to_le_bytes()),
            Self::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub(crate) fn marker(self) -> [u8; 2] {
        match self {
            Self::Little => *b"II",
            Self::Big => *b"MM",
        }
    }
}

pub(crate) const TIFF_MAGIC: u16 = 42;

/// Parsed TIFF header.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    pub order: ByteOrder,
    pub first_ifd: u32,
    /// Canon CR2 carries "CR" right after the header.
    pub is_cr2: bool,
}

pub(crate) fn parse_header(data: &[u8]) -> Result<Header, DngError> {
    if data.len() < 8 {
        return Err(DngError::UnexpectedEof);
    }
    let order = match [data[0], data[1]] {
        [b'I', b'I'] => ByteOrder::Little,
        [b'M', b'M'] => ByteOrder::Big,
        _ => return Err(DngError::UnrecognizedFormat),
    };
    let magic = order.u16([data[2], data[3]]);
    if magic != TIFF_MAGIC {
        if magic == 43 {
            return Err(DngError::Unsupported("BigTIFF containers".into()));
        }
        return Err(DngError::UnrecognizedFormat);
    }
    let first_ifd = order.u32([data[4], data[5], data[6], data[7]]);
    if first_ifd == 0 {
        return Err(DngError::InvalidHeader("first IFD offset is zero".into()));
    }
    let is_cr2 = data.len() >= 10 && &data[8..10] == b"CR";
    Ok(Header {
        order,
        first_ifd,
        is_cr2,
    })
}
