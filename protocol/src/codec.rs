//! Wire primitives: little-endian integers of widths 1/2/3/4/6/8,
//! length-encoded integers, and the four string flavors (fixed,
//! null-terminated, length-prefixed, rest-of-packet).

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};

use mimic_common::err::{ServerError, SqlResult};

fn short_read<E>(_: E) -> ServerError {
    ServerError::malformed("unexpected end of packet")
}

/// Reader over a single packet payload. Every read fails with
/// MALFORMED_PACKET on short input.
#[derive(Debug)]
pub struct PacketReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        PacketReader {
            cursor: Cursor::new(buf),
        }
    }

    fn pos(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.pos()
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Non-consuming look at the next byte. Used to disambiguate
    /// SSLRequest from HandshakeResponse41.
    pub fn peek_u8(&self) -> Option<u8> {
        self.cursor.get_ref().get(self.pos()).copied()
    }

    pub fn read_u8(&mut self) -> SqlResult<u8> {
        self.cursor.read_u8().map_err(short_read)
    }

    pub fn read_i8(&mut self) -> SqlResult<i8> {
        self.cursor.read_i8().map_err(short_read)
    }

    pub fn read_u16(&mut self) -> SqlResult<u16> {
        self.cursor.read_u16::<LittleEndian>().map_err(short_read)
    }

    pub fn read_i16(&mut self) -> SqlResult<i16> {
        self.cursor.read_i16::<LittleEndian>().map_err(short_read)
    }

    pub fn read_u24(&mut self) -> SqlResult<u32> {
        self.cursor.read_u24::<LittleEndian>().map_err(short_read)
    }

    pub fn read_u32(&mut self) -> SqlResult<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(short_read)
    }

    pub fn read_i32(&mut self) -> SqlResult<i32> {
        self.cursor.read_i32::<LittleEndian>().map_err(short_read)
    }

    pub fn read_u48(&mut self) -> SqlResult<u64> {
        self.cursor
            .read_uint::<LittleEndian>(6)
            .map_err(short_read)
    }

    pub fn read_u64(&mut self) -> SqlResult<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(short_read)
    }

    pub fn read_i64(&mut self) -> SqlResult<i64> {
        self.cursor.read_i64::<LittleEndian>().map_err(short_read)
    }

    pub fn read_f32(&mut self) -> SqlResult<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(short_read)
    }

    pub fn read_f64(&mut self) -> SqlResult<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(short_read)
    }

    /// Length-encoded integer.
    ///
    /// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_dt_integers.html
    pub fn read_uint_len(&mut self) -> SqlResult<u64> {
        let first = self.read_u8()?;
        match first {
            0xFC => Ok(self.read_u16()? as u64),
            0xFD => Ok(self.read_u24()? as u64),
            0xFE => self.read_u64(),
            _ => Ok(first as u64),
        }
    }

    fn take(&mut self, n: usize) -> SqlResult<&'a [u8]> {
        let start = self.pos();
        let buf = *self.cursor.get_ref();
        if buf.len() - start < n {
            return Err(ServerError::malformed(format!(
                "expected {} more bytes, {} available",
                n,
                buf.len() - start
            )));
        }
        self.cursor.set_position((start + n) as u64);
        Ok(&buf[start..start + n])
    }

    pub fn read_str_fixed(&mut self, n: usize) -> SqlResult<&'a [u8]> {
        self.take(n)
    }

    pub fn read_str_null(&mut self) -> SqlResult<&'a [u8]> {
        let start = self.pos();
        let buf = *self.cursor.get_ref();
        match buf[start..].iter().position(|&b| b == 0) {
            Some(idx) => {
                self.cursor.set_position((start + idx + 1) as u64);
                Ok(&buf[start..start + idx])
            }
            None => Err(ServerError::malformed("missing null terminator")),
        }
    }

    pub fn read_str_len(&mut self) -> SqlResult<&'a [u8]> {
        let len = self.read_uint_len()? as usize;
        self.take(len)
    }

    pub fn read_str_rest(&mut self) -> SqlResult<&'a [u8]> {
        let start = self.pos();
        let buf = *self.cursor.get_ref();
        self.cursor.set_position(buf.len() as u64);
        Ok(&buf[start..])
    }
}

/// On-the-wire length of a length-encoded integer.
pub fn uint_len_size(v: u64) -> usize {
    if v < 251 {
        1
    } else if v < 1 << 16 {
        3
    } else if v < 1 << 24 {
        4
    } else {
        9
    }
}

pub fn put_uint_len(buf: &mut BytesMut, v: u64) {
    if v < 251 {
        buf.put_u8(v as u8);
    } else if v < 1 << 16 {
        buf.put_u8(0xFC);
        buf.put_u16_le(v as u16);
    } else if v < 1 << 24 {
        buf.put_u8(0xFD);
        buf.put_uint_le(v, 3);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(v);
    }
}

pub fn put_u24(buf: &mut BytesMut, v: u32) {
    buf.put_uint_le(v as u64, 3);
}

pub fn put_u48(buf: &mut BytesMut, v: u64) {
    buf.put_uint_le(v, 6);
}

pub fn put_str_null(buf: &mut BytesMut, s: &[u8]) {
    buf.put_slice(s);
    buf.put_u8(0);
}

pub fn put_str_len(buf: &mut BytesMut, s: &[u8]) {
    put_uint_len(buf, s.len() as u64);
    buf.put_slice(s);
}

/// Fixed-width string, zero padded on the right.
pub fn put_str_fixed(buf: &mut BytesMut, width: usize, s: &[u8]) {
    let n = s.len().min(width);
    buf.put_slice(&s[..n]);
    for _ in n..width {
        buf.put_u8(0);
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn test_fixed_ints() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
        ];
        let mut r = PacketReader::new(&data);
        assert_eq!(0x01, r.read_u8().unwrap());
        assert_eq!(0x0302, r.read_u16().unwrap());
        assert_eq!(0x060504, r.read_u24().unwrap());
        assert_eq!(0x0A090807, r.read_u32().unwrap());
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn test_uint_len_roundtrip() {
        for v in [
            0u64,
            250,
            251,
            0xFFFF,
            0x1_0000,
            0xFF_FFFF,
            0x100_0000,
            u64::MAX,
        ] {
            let mut buf = BytesMut::new();
            put_uint_len(&mut buf, v);
            assert_eq!(uint_len_size(v), buf.len());
            let mut r = PacketReader::new(&buf);
            assert_eq!(v, r.read_uint_len().unwrap());
            assert_eq!(0, r.remaining());
        }
    }

    #[test]
    fn test_str_flavors() {
        let mut buf = BytesMut::new();
        put_str_null(&mut buf, b"abc");
        put_str_len(&mut buf, b"defg");
        put_str_fixed(&mut buf, 6, b"hi");
        buf.extend_from_slice(b"rest");

        let mut r = PacketReader::new(&buf);
        assert_eq!(b"abc", r.read_str_null().unwrap());
        assert_eq!(b"defg", r.read_str_len().unwrap());
        assert_eq!(&[b'h', b'i', 0, 0, 0, 0], r.read_str_fixed(6).unwrap());
        assert_eq!(b"rest", r.read_str_rest().unwrap());
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_missing_null_terminator() {
        let mut r = PacketReader::new(b"abc");
        assert!(r.read_str_null().is_err());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut r = PacketReader::new(&[0x55, 0x66]);
        assert_eq!(Some(0x55), r.peek_u8());
        assert_eq!(0x55, r.read_u8().unwrap());
        assert_eq!(Some(0x66), r.peek_u8());
    }

    #[test]
    fn test_u48() {
        let mut buf = BytesMut::new();
        put_u48(&mut buf, 0x0000_ABCD_EF01_2345);
        let mut r = PacketReader::new(&buf);
        assert_eq!(0x0000_ABCD_EF01_2345, r.read_u48().unwrap());
    }
}
