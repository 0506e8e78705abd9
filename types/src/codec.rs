//! Little-endian byte cursor used by the canonical block and transaction
//! encodings.

use crate::hash::Hash256;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("{field} length {len} exceeds {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {0}")]
    Invalid(String),
}

/// Append-only writer emitting fixed-width little-endian fields.
#[derive(Default, Debug)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Raw bytes, no length prefix.
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn put_hash(&mut self, hash: &Hash256) {
        self.buffer.extend_from_slice(hash.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Reading cursor over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    input: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.input.len() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.input.len(),
            });
        }
        let (prefix, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(prefix)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_hash(&mut self) -> Result<Hash256, CodecError> {
        Ok(Hash256::new(self.read_array()?))
    }

    /// UTF-8 string of `len` bytes, rejected when longer than `max`.
    pub fn read_string(
        &mut self,
        len: usize,
        max: usize,
        field: &'static str,
    ) -> Result<String, CodecError> {
        if len > max {
            return Err(CodecError::TooLong { field, len, max });
        }
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
    }

    /// Fails if any input is left unread.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.input.len() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_little_endian() {
        let mut w = ByteWriter::default();
        w.put_u16(0x0102);
        w.put_i32(-2);
        assert_eq!(w.finish(), vec![0x02, 0x01, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn reader_reports_short_input() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::UnexpectedEof {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let mut r = ByteReader::new(&[7, 0, 9]);
        assert_eq!(r.read_u16().unwrap(), 7);
        assert_eq!(r.finish(), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn strings_are_bounded() {
        let mut r = ByteReader::new(b"hello");
        assert!(matches!(
            r.clone().read_string(5, 4, "name"),
            Err(CodecError::TooLong { field: "name", .. })
        ));
        assert_eq!(r.read_string(5, 10, "name").unwrap(), "hello");
    }
}
