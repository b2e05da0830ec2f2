//! Little-endian primitives shared by the binary formats.
//!
//! Lengths and counts are ULEB128; fixed-width integers are little-endian.

use crate::error::{BackendError, Result};

/// Append-only byte sink.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn uleb128(&mut self, mut value: usize) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// A length-prefixed UTF-8 string.
    pub fn str(&mut self, value: &str) {
        self.uleb128(value.len());
        self.bytes(value.as_bytes());
    }

    /// A length-prefixed byte blob.
    pub fn blob(&mut self, value: &[u8]) {
        self.uleb128(value.len());
        self.bytes(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an input buffer. Every read is bounds-checked and reports
/// truncation as malformed input.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.offset == self.bytes.len()
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(BackendError::malformed(format!(
                "unexpected end of input at offset {} (wanted {} bytes, {} left)",
                self.offset,
                len,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn uleb128(&mut self) -> Result<usize> {
        let mut result: usize = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift >= usize::BITS {
                return Err(BackendError::malformed("length prefix overflows"));
            }
            result |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn str(&mut self) -> Result<&'a str> {
        let len = self.uleb128()?;
        let offset = self.offset;
        std::str::from_utf8(self.take(len)?).map_err(|_| {
            BackendError::malformed(format!("invalid UTF-8 string at offset {}", offset))
        })
    }

    pub fn blob(&mut self) -> Result<&'a [u8]> {
        let len = self.uleb128()?;
        self.take(len)
    }

    /// Fail if anything is left unread.
    pub fn expect_end(&self) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(BackendError::malformed(format!(
                "{} trailing bytes after offset {}",
                self.remaining(),
                self.offset
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uleb128() {
        let mut w = ByteWriter::new();
        w.uleb128(0);
        w.uleb128(127);
        w.uleb128(128);
        w.uleb128(300);
        let bytes = w.finish();
        assert_eq!(bytes, vec![0x00, 0x7f, 0x80, 0x01, 0xac, 0x02]);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.uleb128().unwrap(), 0);
        assert_eq!(r.uleb128().unwrap(), 127);
        assert_eq!(r.uleb128().unwrap(), 128);
        assert_eq!(r.uleb128().unwrap(), 300);
        assert!(r.is_at_end());
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let mut r = ByteReader::new(&[0x01, 0x02]);
        assert!(matches!(r.u64(), Err(BackendError::MalformedBinaryInput { .. })));
    }

    #[test]
    fn test_string_length_past_end() {
        let mut w = ByteWriter::new();
        w.uleb128(10);
        w.bytes(b"abc");
        let bytes = w.finish();
        assert!(ByteReader::new(&bytes).str().is_err());
    }
}
