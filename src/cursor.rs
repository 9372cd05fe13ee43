//! Bounds-checked little-endian reader over an in-memory byte buffer.
//!
//! Every decode path owns its own `Cursor`, so concurrent decodes of
//! different assets never share read state. All multi-byte fields in both
//! legacy formats are little-endian.

use crate::error::{Result, ZarError};

/// Read cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current read offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume `count` bytes, naming the field for error reporting.
    pub fn take(&mut self, count: usize, context: &'static str) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(ZarError::TruncatedData {
                context,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Skip `count` reserved/padding bytes.
    pub fn skip(&mut self, count: usize, context: &'static str) -> Result<()> {
        self.take(count, context).map(|_| ())
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.take(1, context)?[0])
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self, context: &'static str) -> Result<i16> {
        let b = self.take(2, context)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        let b = self.take(4, context)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a length-prefixed name (u8 length, then that many bytes).
    ///
    /// Legacy names are ASCII; anything else is replaced lossily.
    pub fn read_name(&mut self, context: &'static str) -> Result<String> {
        let len = self.read_u8(context)? as usize;
        let bytes = self.take(len, context)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF];
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_u32("field").unwrap(), 0x0403_0201);
        assert_eq!(c.read_i16("field").unwrap(), -1);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn take_past_end_is_truncated_data() {
        let mut c = Cursor::new(&[1, 2]);
        let err = c.take(3, "header").unwrap_err();
        match err {
            ZarError::TruncatedData {
                context,
                needed,
                available,
            } => {
                assert_eq!(context, "header");
                assert_eq!(needed, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_length_prefixed_name() {
        let mut data = vec![4u8];
        data.extend_from_slice(b"walk");
        data.push(0xAA);
        let mut c = Cursor::new(&data);
        assert_eq!(c.read_name("sequence name").unwrap(), "walk");
        assert_eq!(c.remaining(), 1);
    }
}
