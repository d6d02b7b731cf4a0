//! Little-endian writer primitive
//!
//! Every converted format is a flat sequence of fixed-width little-endian
//! numbers and null-terminated UTF-8 strings. [`LeWriter`] wraps any
//! [`Write`] and exposes exactly those writes; [`LeReader`] is its mirror
//! over a byte slice, used by loaders and tests.

use std::io::{self, Write};

use thiserror::Error;

/// Errors raised while encoding a record.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("string {0:?} contains an interior null byte and cannot be null-terminated")]
    InteriorNul(String),

    #[error("{what} value {value} does not fit in {bits} bits")]
    OutOfRange {
        what: &'static str,
        value: u64,
        bits: u32,
    },
}

/// Little-endian writer over any byte sink.
///
/// The inner writer is owned, so it is dropped (and a file handle released)
/// on every exit path, including early `?` returns.
pub struct LeWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> LeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Total bytes written so far.
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), WriteError> {
        self.write_bytes(&[v])
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), WriteError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i16(&mut self, v: i16) -> Result<(), WriteError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), WriteError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), WriteError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<(), WriteError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32s(&mut self, values: &[f32]) -> Result<(), WriteError> {
        for &v in values {
            self.write_f32(v)?;
        }
        Ok(())
    }

    /// Write an index as either 2 or 4 bytes.
    pub fn write_index(&mut self, index: u32, size: u8) -> Result<(), WriteError> {
        if size == 2 {
            let narrow = u16::try_from(index).map_err(|_| WriteError::OutOfRange {
                what: "index",
                value: index as u64,
                bits: 16,
            })?;
            self.write_u16(narrow)
        } else {
            self.write_u32(index)
        }
    }

    /// Write a UTF-8 string followed by a single null byte.
    pub fn write_cstr(&mut self, s: &str) -> Result<(), WriteError> {
        if s.as_bytes().contains(&0) {
            return Err(WriteError::InteriorNul(s.to_string()));
        }
        self.write_bytes(s.as_bytes())?;
        self.write_u8(0)
    }

    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Little-endian cursor over a byte slice. Every read returns `None` once
/// the slice is exhausted.
pub struct LeReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        Some(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_f32s<const N: usize>(&mut self) -> Option<[f32; N]> {
        let mut out = [0.0f32; N];
        for v in out.iter_mut() {
            *v = self.read_f32()?;
        }
        Some(out)
    }

    pub fn read_index(&mut self, size: u8) -> Option<u32> {
        if size == 2 {
            self.read_u16().map(u32::from)
        } else {
            self.read_u32()
        }
    }

    /// Read a null-terminated UTF-8 string (terminator consumed, not returned).
    pub fn read_cstr(&mut self) -> Option<&'a str> {
        let rest = self.bytes.get(self.pos..)?;
        let len = rest.iter().position(|&b| b == 0)?;
        let s = std::str::from_utf8(&rest[..len]).ok()?;
        self.pos += len + 1;
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_little_endian() {
        let mut w = LeWriter::new(Vec::new());
        w.write_u16(0x0102).unwrap();
        w.write_u32(6666).unwrap();
        w.write_i16(-1).unwrap();
        let bytes = w.into_inner();
        assert_eq!(&bytes[0..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..6], &6666u32.to_le_bytes());
        assert_eq!(&bytes[6..8], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_cstr_is_null_terminated() {
        let mut w = LeWriter::new(Vec::new());
        w.write_cstr("héllo").unwrap();
        assert_eq!(w.position(), "héllo".len() as u64 + 1);
        let bytes = w.into_inner();
        assert_eq!(*bytes.last().unwrap(), 0);

        let mut r = LeReader::new(&bytes);
        assert_eq!(r.read_cstr(), Some("héllo"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_cstr_rejects_interior_nul() {
        let mut w = LeWriter::new(Vec::new());
        let err = w.write_cstr("a\0b").unwrap_err();
        assert!(matches!(err, WriteError::InteriorNul(_)));
    }

    #[test]
    fn test_narrow_index_overflow() {
        let mut w = LeWriter::new(Vec::new());
        w.write_index(65535, 2).unwrap();
        assert!(w.write_index(65536, 2).is_err());
        w.write_index(65536, 4).unwrap();
        assert_eq!(w.position(), 6);
    }

    #[test]
    fn test_reader_stops_at_end() {
        let bytes = [1u8, 0, 0];
        let mut r = LeReader::new(&bytes);
        assert_eq!(r.read_u16(), Some(1));
        assert_eq!(r.read_u16(), None);
        assert_eq!(r.read_u8(), Some(0));
        assert_eq!(r.read_u8(), None);
    }
}
