//! OK, EOF, and ERR packets.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_ok_packet.html

use bytes::{BufMut, BytesMut};

use mimic_common::charset::CharacterSet;
use mimic_common::err::ServerError;

use crate::codec::put_uint_len;
use crate::constants::{CapabilityFlags, ServerStatus};

#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    /// When set, the header byte is 0xFE: an OK packet standing in for a
    /// deprecated EOF at the end of a result set.
    pub eof: bool,
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
    pub status_flags: ServerStatus,
}

impl OkPacket {
    pub fn with_flags(status_flags: ServerStatus) -> Self {
        OkPacket {
            status_flags,
            ..Default::default()
        }
    }

    pub fn serialize(&self, capabilities: CapabilityFlags) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(if self.eof { 0xFE } else { 0x00 });
        put_uint_len(&mut buf, self.affected_rows);
        put_uint_len(&mut buf, self.last_insert_id);

        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            buf.put_u16_le(self.status_flags.bits());
            buf.put_u16_le(self.warnings);
        } else if capabilities.contains(CapabilityFlags::CLIENT_TRANSACTIONS) {
            buf.put_u16_le(self.status_flags.bits());
        }
        buf.to_vec()
    }
}

/// Legacy EOF packet, sent only when CLIENT_DEPRECATE_EOF is unset.
#[derive(Debug, Clone, Default)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: ServerStatus,
}

impl EofPacket {
    pub fn serialize(&self, capabilities: CapabilityFlags) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFE);
        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            buf.put_u16_le(self.warnings);
            buf.put_u16_le(self.status_flags.bits());
        }
        buf.to_vec()
    }
}

#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub code: u16,
    pub sqlstate: &'static [u8; 5],
    pub msg: String,
}

impl ErrPacket {
    pub fn from_error(err: &ServerError) -> Self {
        let (code, sqlstate, msg) = err.err_parts();
        ErrPacket {
            code,
            sqlstate,
            msg,
        }
    }

    pub fn serialize(&self, capabilities: CapabilityFlags, charset: CharacterSet) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(0xFF);
        buf.put_u16_le(self.code);
        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            buf.put_u8(b'#');
            buf.put_slice(self.sqlstate);
        }
        buf.put_slice(&charset.encode(&self.msg));
        buf.to_vec()
    }
}

#[cfg(test)]
mod test {
    use mimic_common::err::ErrorKind;

    use super::*;

    fn caps41() -> CapabilityFlags {
        CapabilityFlags::CLIENT_PROTOCOL_41
    }

    #[test]
    fn test_ok_packet() {
        let ok = OkPacket {
            affected_rows: 3,
            status_flags: ServerStatus::SERVER_STATUS_AUTOCOMMIT,
            ..Default::default()
        };
        let data = ok.serialize(caps41());
        assert_eq!(vec![0x00, 0x03, 0x00, 0x02, 0x00, 0x00, 0x00], data);
    }

    #[test]
    fn test_ok_as_eof() {
        let ok = OkPacket {
            eof: true,
            ..Default::default()
        };
        assert_eq!(0xFE, ok.serialize(caps41())[0]);
    }

    #[test]
    fn test_err_packet() {
        let err = ServerError::mysql(ErrorKind::AccessDeniedError, "nope");
        let data = ErrPacket::from_error(&err).serialize(caps41(), CharacterSet::Utf8mb4);
        assert_eq!(0xFF, data[0]);
        assert_eq!(1045, u16::from_le_bytes([data[1], data[2]]));
        assert_eq!(b'#', data[3]);
        assert_eq!(b"28000", &data[4..9]);
        assert_eq!(b"nope", &data[9..]);
    }
}
