use super::ByteOrder;
use crate::error::DngError;

/// Bounds-checked reader over the input buffer in one byte order.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) -> Result<(), DngError> {
        if pos > self.data.len() {
            return Err(DngError::UnexpectedEof);
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn read_bytes_err(&mut self, n: usize) -> Result<&'a [u8], DngError> {
        let end = self.pos.checked_add(n).ok_or(DngError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(DngError::UnexpectedEof);
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_u16_err(&mut self) -> Result<u16, DngError> {
        let b = self.read_bytes_err(2)?;
        Ok(self.order.u16([b[0], b[1]]))
    }

    pub(crate) fn read_u32_err(&mut self) -> Result<u32, DngError> {
        let b = self.read_bytes_err(4)?;
        Ok(self.order.u32([b[0], b[1], b[2], b[3]]))
    }
}
