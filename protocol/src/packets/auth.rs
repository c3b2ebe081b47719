//! Authentication exchange packets sent after the initial handshake.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase_packets.html

use bytes::{BufMut, BytesMut};

use mimic_common::charset::CharacterSet;

use crate::codec::put_str_null;

/// 0xFE + plugin name + plugin data. Tells the client to restart the
/// exchange with a different plugin.
pub fn make_auth_switch_request(
    server_charset: CharacterSet,
    plugin_name: &str,
    plugin_data: &[u8],
) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(0xFE);
    put_str_null(&mut buf, &server_charset.encode(plugin_name));
    buf.put_slice(plugin_data);
    buf.to_vec()
}

/// 0x01 + opaque plugin data. Carries an extra challenge round.
pub fn make_auth_more_data(data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(0x01);
    buf.put_slice(data);
    buf.to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_auth_switch_request() {
        let data = make_auth_switch_request(CharacterSet::Utf8mb4, "mysql_clear_password", b"x");
        assert_eq!(0xFE, data[0]);
        assert_eq!(b"mysql_clear_password", &data[1..21]);
        assert_eq!(0, data[21]);
        assert_eq!(b'x', data[22]);
    }

    #[test]
    fn test_auth_more_data() {
        assert_eq!(vec![0x01, 0xAB], make_auth_more_data(&[0xAB]));
    }
}
