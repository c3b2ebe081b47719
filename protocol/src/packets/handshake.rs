//! Initial handshake and the client's response, including the SSLRequest
//! short form.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase.html

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use mimic_common::charset::{CharacterSet, Collation};
use mimic_common::err::SqlResult;

use crate::codec::{put_str_fixed, put_str_null, PacketReader};
use crate::constants::{CapabilityFlags, ServerStatus};

use super::read_connect_attrs;

#[derive(Debug, Clone)]
pub struct HandshakeV10 {
    pub capabilities: CapabilityFlags,
    pub server_charset: CharacterSet,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_data: Vec<u8>,
    pub status_flags: ServerStatus,
    pub auth_plugin_name: String,
}

impl HandshakeV10 {
    pub fn serialize(&self) -> Vec<u8> {
        let plugin_auth = self
            .capabilities
            .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH);
        let auth_data_len = if plugin_auth { self.auth_data.len() } else { 0 };

        let mut buf = BytesMut::new();
        buf.put_u8(10); // protocol version
        put_str_null(&mut buf, &self.server_charset.encode(&self.server_version));
        buf.put_u32_le(self.connection_id);
        let head = &self.auth_data[..self.auth_data.len().min(8)];
        put_str_null(&mut buf, head);
        buf.put_u16_le((self.capabilities.bits() & 0xFFFF) as u16);
        buf.put_u8(u8::from(self.server_charset));
        buf.put_u16_le(self.status_flags.bits());
        buf.put_u16_le((self.capabilities.bits() >> 16) as u16);
        buf.put_u8(auth_data_len as u8);
        put_str_fixed(&mut buf, 10, &[]); // reserved
        let tail = if self.auth_data.len() > 8 {
            &self.auth_data[8..]
        } else {
            &[]
        };
        put_str_fixed(&mut buf, auth_data_len.saturating_sub(8).max(13), tail);
        if plugin_auth {
            put_str_null(&mut buf, &self.server_charset.encode(&self.auth_plugin_name));
        }
        buf.to_vec()
    }
}

/// A client that negotiated CLIENT_SSL sends this truncated response
/// first; the full HandshakeResponse41 follows after the TLS upgrade.
#[derive(Debug, Clone)]
pub struct SslRequest {
    pub max_packet_size: u32,
    pub capabilities: CapabilityFlags,
    pub client_charset: CharacterSet,
}

#[derive(Debug, Clone)]
pub struct HandshakeResponse41 {
    pub max_packet_size: u32,
    /// Already intersected with the server's capabilities.
    pub capabilities: CapabilityFlags,
    pub client_charset: CharacterSet,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub client_plugin: Option<String>,
    pub connect_attrs: HashMap<String, String>,
    pub zstd_compression_level: u8,
}

#[derive(Debug, Clone)]
pub enum HandshakeResponse {
    SslRequest(SslRequest),
    Response41(HandshakeResponse41),
}

pub fn parse_handshake_response(
    server_capabilities: CapabilityFlags,
    data: &[u8],
) -> SqlResult<HandshakeResponse> {
    let mut r = PacketReader::new(data);

    let client_capabilities = CapabilityFlags::from_bits_retain(r.read_u32()?);
    let capabilities = server_capabilities & client_capabilities;

    let max_packet_size = r.read_u32()?;
    let charset_byte = r.read_u8()?;
    let client_charset = Collation::charset_from_collation_byte(charset_byte)
        .unwrap_or(CharacterSet::Utf8mb4);
    r.read_str_fixed(23)?; // reserved

    if !r.has_remaining() {
        return Ok(HandshakeResponse::SslRequest(SslRequest {
            max_packet_size,
            capabilities,
            client_charset,
        }));
    }

    let username = client_charset.decode(r.read_str_null()?)?;

    let auth_response =
        if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            r.read_str_len()?.to_vec()
        } else {
            let len = r.read_u8()? as usize;
            r.read_str_fixed(len)?.to_vec()
        };

    let database = if capabilities.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB) {
        let raw = client_charset.decode(r.read_str_null()?)?;
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    } else {
        None
    };

    let client_plugin = if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
        Some(client_charset.decode(r.read_str_null()?)?)
    } else {
        None
    };

    let connect_attrs = if capabilities.contains(CapabilityFlags::CLIENT_CONNECT_ATTRS) {
        read_connect_attrs(&mut r, client_charset)?
    } else {
        HashMap::new()
    };

    let zstd_compression_level =
        if capabilities.contains(CapabilityFlags::CLIENT_ZSTD_COMPRESSION_ALGORITHM)
            && r.has_remaining()
        {
            r.read_u8()?
        } else {
            0
        };

    Ok(HandshakeResponse::Response41(HandshakeResponse41 {
        max_packet_size,
        capabilities,
        client_charset,
        username,
        auth_response,
        database,
        client_plugin,
        connect_attrs,
        zstd_compression_level,
    }))
}

#[cfg(test)]
mod test {
    use crate::codec::{put_str_len, put_str_null};

    use super::*;

    fn server_caps() -> CapabilityFlags {
        CapabilityFlags::default_server() | CapabilityFlags::CLIENT_SSL
    }

    fn response_prefix(caps: CapabilityFlags) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32_le(caps.bits());
        buf.put_u32_le(1 << 24);
        buf.put_u8(45); // utf8mb4_general_ci
        put_str_fixed(&mut buf, 23, &[]);
        buf
    }

    #[test]
    fn test_ssl_request() {
        let buf = response_prefix(CapabilityFlags::CLIENT_PROTOCOL_41 | CapabilityFlags::CLIENT_SSL);
        match parse_handshake_response(server_caps(), &buf).unwrap() {
            HandshakeResponse::SslRequest(req) => {
                assert!(req.capabilities.contains(CapabilityFlags::CLIENT_SSL));
                assert_eq!(CharacterSet::Utf8mb4, req.client_charset);
            }
            other => panic!("expected ssl request, got {:?}", other),
        }
    }

    #[test]
    fn test_response_41() {
        let caps = CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_PLUGIN_AUTH
            | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
            | CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        let mut buf = response_prefix(caps);
        put_str_null(&mut buf, b"alice");
        put_str_len(&mut buf, &[0xAA; 20]);
        put_str_null(&mut buf, b"db1");
        put_str_null(&mut buf, b"mysql_native_password");

        match parse_handshake_response(server_caps(), &buf).unwrap() {
            HandshakeResponse::Response41(resp) => {
                assert_eq!("alice", resp.username);
                assert_eq!(20, resp.auth_response.len());
                assert_eq!(Some("db1".to_string()), resp.database);
                assert_eq!(
                    Some("mysql_native_password".to_string()),
                    resp.client_plugin
                );
                assert!(!resp.capabilities.contains(CapabilityFlags::CLIENT_SSL));
            }
            other => panic!("expected response41, got {:?}", other),
        }
    }

    #[test]
    fn test_handshake_v10_layout() {
        let handshake = HandshakeV10 {
            capabilities: server_caps(),
            server_charset: CharacterSet::Utf8mb4,
            server_version: "8.0.29".to_string(),
            connection_id: 0x01020304,
            auth_data: vec![0x41; 20],
            status_flags: ServerStatus::SERVER_STATUS_AUTOCOMMIT,
            auth_plugin_name: "mysql_native_password".to_string(),
        };
        let data = handshake.serialize();
        assert_eq!(10, data[0]);
        // version, null, connection id follows
        assert_eq!(b"8.0.29", &data[1..7]);
        assert_eq!(0, data[7]);
        assert_eq!(0x01020304_u32, u32::from_le_bytes([data[8], data[9], data[10], data[11]]));
        // first 8 nonce bytes, null terminated
        assert_eq!(&[0x41; 8], &data[12..20]);
        assert_eq!(0, data[20]);
        // trailing plugin name is null terminated
        assert_eq!(0, *data.last().unwrap());
        let tail = &data[data.len() - 1 - 21..data.len() - 1];
        assert_eq!(b"mysql_native_password", tail);
    }
}
