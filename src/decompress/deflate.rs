use alloc::format;
use alloc::vec::Vec;

use miniz_oxide::inflate::{TINFLStatus, decompress_to_vec_zlib_with_limit};

use crate::error::DngError;

/// Inflate one zlib-wrapped strip or tile, producing at most `expected` bytes.
pub(crate) fn decode(data: &[u8], expected: usize) -> Result<Vec<u8>, DngError> {
    match decompress_to_vec_zlib_with_limit(data, expected) {
        Ok(out) => Ok(out),
        // Trailing output beyond the chunk is ignored.
        Err(e) if e.status == TINFLStatus::HasMoreOutput => Ok(e.output),
        Err(e) => Err(DngError::InvalidData(format!("deflate: {:?}", e.status))),
    }
}

pub(crate) fn encode(data: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(data, 6)
}
