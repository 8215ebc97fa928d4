use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::warn;
use crate::tiff::{FieldType, Ifd};

/// A tag the caller wants captured verbatim from every image IFD.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub tag: u16,
    pub field_type: FieldType,
    pub name: String,
}

impl FieldInfo {
    pub fn new(tag: u16, field_type: FieldType, name: impl Into<String>) -> Self {
        Self {
            tag,
            field_type,
            name: name.into(),
        }
    }
}

/// Raw value of a captured custom field, in the file's byte order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldData {
    pub tag: u16,
    pub field_type: FieldType,
    pub name: String,
    pub count: u32,
    pub data: Vec<u8>,
}

pub(crate) fn capture(
    ifd: &Ifd<'_>,
    infos: &[FieldInfo],
    warnings: &mut Vec<String>,
) -> Vec<FieldData> {
    let mut out = Vec::new();
    for info in infos {
        let Some(entry) = ifd.get(info.tag) else {
            continue;
        };
        if entry.field_type != info.field_type {
            warn(
                warnings,
                format!(
                    "custom field {} (tag {}): expected {:?}, found {:?}; skipped",
                    info.name, info.tag, info.field_type, entry.field_type
                ),
            );
            continue;
        }
        out.push(FieldData {
            tag: info.tag,
            field_type: info.field_type,
            name: info.name.clone(),
            count: entry.count,
            data: entry.data.to_vec(),
        });
    }
    out
}
