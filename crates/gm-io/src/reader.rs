//! Endian-aware binary reader.

use crate::endian::Endian;
use crate::error::{IoError, IoResult};
use bytes::Bytes;

/// Reads primitive values out of a byte buffer in a chosen byte order.
pub struct Reader {
    data: Bytes,
    position: usize,
    endian: Endian,
}

impl Reader {
    pub fn new(data: impl Into<Bytes>, endian: Endian) -> Self {
        Self {
            data: data.into(),
            position: 0,
            endian,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn take(&mut self, len: usize, context: &str) -> IoResult<&[u8]> {
        if self.remaining() < len {
            return Err(IoError::end_of_stream(len - self.remaining(), context));
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> IoResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> IoResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> IoResult<u16> {
        let bytes: [u8; 2] = self.take(2, "u16")?.try_into().expect("length checked above");
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_i16(&mut self) -> IoResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> IoResult<u32> {
        let bytes: [u8; 4] = self.take(4, "u32")?.try_into().expect("length checked above");
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self) -> IoResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> IoResult<u64> {
        let bytes: [u8; 8] = self.take(8, "u64")?.try_into().expect("length checked above");
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }

    pub fn read_f32(&mut self) -> IoResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> IoResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        Ok(self.take(len, "byte block")?.to_vec())
    }

    /// Reads a length-prefixed (u32) UTF-8 string.
    pub fn read_string(&mut self) -> IoResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| IoError::invalid_string("string", e.to_string()))
    }

    /// Reads a NUL-terminated string, as used for the debug source/symbol
    /// tables where a length prefix would waste a field.
    pub fn read_cstring(&mut self) -> IoResult<String> {
        let start = self.position;
        while !self.is_eof() && self.data[self.position] != 0 {
            self.position += 1;
        }
        if self.is_eof() {
            return Err(IoError::end_of_stream(1, "NUL-terminated string"));
        }
        let bytes = self.data[start..self.position].to_vec();
        self.position += 1; // consume the terminator
        String::from_utf8(bytes).map_err(|e| IoError::invalid_string("cstring", e.to_string()))
    }

    pub fn seek(&mut self, position: usize) -> IoResult<()> {
        if position > self.data.len() {
            return Err(IoError::OutOfBounds {
                position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> IoResult<()> {
        if self.remaining() < count {
            return Err(IoError::end_of_stream(count - self.remaining(), "skip"));
        }
        self.position += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let mut r = Reader::new(vec![0x01, 0x00, 0x00, 0x00], Endian::Little);
        assert_eq!(r.read_u32().unwrap(), 1);
    }

    #[test]
    fn reads_big_endian_integers() {
        let mut r = Reader::new(vec![0x00, 0x00, 0x00, 0x01], Endian::Big);
        assert_eq!(r.read_u32().unwrap(), 1);
    }

    #[test]
    fn fails_cleanly_past_the_end() {
        let mut r = Reader::new(vec![0x01], Endian::Little);
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn reads_cstrings_with_terminator() {
        let mut r = Reader::new(b"hello\0world".to_vec(), Endian::Little);
        assert_eq!(r.read_cstring().unwrap(), "hello");
        assert_eq!(r.read_bytes(5).unwrap(), b"world");
    }

    #[test]
    fn roundtrips_floats_through_bit_patterns() {
        let mut r = Reader::new(3.5f32.to_bits().to_le_bytes().to_vec(), Endian::Little);
        assert_eq!(r.read_f32().unwrap(), 3.5);
    }
}
