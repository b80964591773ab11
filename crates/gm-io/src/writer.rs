//! Endian-aware binary writer.

use crate::endian::Endian;
use bytes::{BufMut, BytesMut};

/// Accumulates primitive values into a byte buffer in a chosen byte order.
pub struct Writer {
    buf: BytesMut,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: BytesMut::new(),
            endian,
        }
    }

    pub fn with_capacity(capacity: usize, endian: Endian) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        match self.endian {
            Endian::Little => self.buf.put_u16_le(value),
            Endian::Big => self.buf.put_u16(value),
        }
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_u32(&mut self, value: u32) {
        match self.endian {
            Endian::Little => self.buf.put_u32_le(value),
            Endian::Big => self.buf.put_u32(value),
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_u64(&mut self, value: u64) {
        match self.endian {
            Endian::Little => self.buf.put_u64_le(value),
            Endian::Big => self.buf.put_u64(value),
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes a length-prefixed (u32) UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    /// Writes a NUL-terminated string.
    pub fn write_cstring(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian_integers() {
        let mut w = Writer::new(Endian::Little);
        w.write_u32(1);
        assert_eq!(w.into_bytes(), vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn writes_big_endian_integers() {
        let mut w = Writer::new(Endian::Big);
        w.write_u32(1);
        assert_eq!(w.into_bytes(), vec![0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn round_trips_through_reader() {
        use crate::reader::Reader;
        let mut w = Writer::new(Endian::Little);
        w.write_string("gamemonkey");
        w.write_cstring("main");
        let bytes = w.into_bytes();

        let mut r = Reader::new(bytes, Endian::Little);
        assert_eq!(r.read_string().unwrap(), "gamemonkey");
        assert_eq!(r.read_cstring().unwrap(), "main");
    }
}
