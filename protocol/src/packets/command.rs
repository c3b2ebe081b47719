//! Command-phase request parsers: COM_QUERY, COM_INIT_DB, COM_FIELD_LIST,
//! COM_CHANGE_USER.

use std::collections::HashMap;

use mimic_common::charset::{CharacterSet, Collation};
use mimic_common::err::SqlResult;

use crate::codec::PacketReader;
use crate::constants::CapabilityFlags;

use super::{read_connect_attrs, read_params};

#[derive(Debug, Clone)]
pub struct ComQuery {
    pub sql: String,
    pub query_attrs: HashMap<String, String>,
}

/// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query.html
pub fn parse_com_query(
    capabilities: CapabilityFlags,
    client_charset: CharacterSet,
    data: &[u8],
) -> SqlResult<ComQuery> {
    let mut r = PacketReader::new(data);

    let mut query_attrs = HashMap::new();
    if capabilities.contains(CapabilityFlags::CLIENT_QUERY_ATTRIBUTES) {
        let parameter_count = r.read_uint_len()? as usize;
        r.read_uint_len()?; // parameter_set_count, always 1
        for (name, value) in read_params(capabilities, client_charset, &mut r, parameter_count, None)?
        {
            if let Some(name) = name {
                query_attrs.insert(name, value.as_text());
            }
        }
    }

    let sql = client_charset.decode(r.read_str_rest()?)?;
    Ok(ComQuery { sql, query_attrs })
}

pub fn parse_com_init_db(client_charset: CharacterSet, data: &[u8]) -> SqlResult<String> {
    client_charset.decode(data)
}

#[derive(Debug, Clone)]
pub struct ComFieldList {
    pub table: String,
    pub wildcard: String,
}

pub fn parse_com_field_list(
    client_charset: CharacterSet,
    data: &[u8],
) -> SqlResult<ComFieldList> {
    let mut r = PacketReader::new(data);
    Ok(ComFieldList {
        table: client_charset.decode(r.read_str_null()?)?,
        wildcard: client_charset.decode(r.read_str_rest()?)?,
    })
}

#[derive(Debug, Clone)]
pub struct ComChangeUser {
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub client_charset: Option<CharacterSet>,
    pub client_plugin: Option<String>,
    pub connect_attrs: HashMap<String, String>,
}

/// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_change_user.html
pub fn parse_com_change_user(
    capabilities: CapabilityFlags,
    client_charset: CharacterSet,
    data: &[u8],
) -> SqlResult<ComChangeUser> {
    let mut r = PacketReader::new(data);

    let username = client_charset.decode(r.read_str_null()?)?;
    let auth_response = if capabilities.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
        let len = r.read_u8()? as usize;
        r.read_str_fixed(len)?.to_vec()
    } else {
        r.read_str_null()?.to_vec()
    };
    let database = {
        let raw = client_charset.decode(r.read_str_null()?)?;
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    };

    let mut out = ComChangeUser {
        username,
        auth_response,
        database,
        client_charset: None,
        client_plugin: None,
        connect_attrs: HashMap::new(),
    };

    if r.has_remaining() {
        let mut charset = client_charset;
        if capabilities.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
            let id = r.read_u16()?;
            if let Some(cs) = Collation::try_from(id)
                .map(|c| c.charset())
                .ok()
                .or_else(|| CharacterSet::try_from(id as u8).ok())
            {
                charset = cs;
                out.client_charset = Some(cs);
            }
        }
        if capabilities.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            out.client_plugin = Some(charset.decode(r.read_str_null()?)?);
        }
        if capabilities.contains(CapabilityFlags::CLIENT_CONNECT_ATTRS) {
            out.connect_attrs = read_connect_attrs(&mut r, charset)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};

    use crate::codec::put_str_null;

    use super::*;

    #[test]
    fn test_plain_query() {
        let query = parse_com_query(
            CapabilityFlags::CLIENT_PROTOCOL_41,
            CharacterSet::Utf8mb4,
            b"SELECT 1",
        )
        .unwrap();
        assert_eq!("SELECT 1", query.sql);
        assert!(query.query_attrs.is_empty());
    }

    #[test]
    fn test_query_without_attrs_section() {
        // parameter_count = 0 means the attribute block collapses to two bytes
        let caps = CapabilityFlags::CLIENT_PROTOCOL_41 | CapabilityFlags::CLIENT_QUERY_ATTRIBUTES;
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u8(1);
        buf.put_slice(b"PING_QUERY");
        let query = parse_com_query(caps, CharacterSet::Utf8mb4, &buf).unwrap();
        assert_eq!("PING_QUERY", query.sql);
    }

    #[test]
    fn test_change_user() {
        let caps = CapabilityFlags::CLIENT_PROTOCOL_41
            | CapabilityFlags::CLIENT_SECURE_CONNECTION
            | CapabilityFlags::CLIENT_PLUGIN_AUTH;
        let mut buf = BytesMut::new();
        put_str_null(&mut buf, b"bob");
        buf.put_u8(3);
        buf.put_slice(&[1, 2, 3]);
        put_str_null(&mut buf, b"shop");
        buf.put_u16_le(45);
        put_str_null(&mut buf, b"mysql_native_password");

        let change = parse_com_change_user(caps, CharacterSet::Utf8mb4, &buf).unwrap();
        assert_eq!("bob", change.username);
        assert_eq!(vec![1, 2, 3], change.auth_response);
        assert_eq!(Some("shop".to_string()), change.database);
        assert_eq!(Some(CharacterSet::Utf8mb4), change.client_charset);
        assert_eq!(
            Some("mysql_native_password".to_string()),
            change.client_plugin
        );
    }

    #[test]
    fn test_field_list() {
        let mut buf = BytesMut::new();
        put_str_null(&mut buf, b"users");
        buf.put_slice(b"%");
        let list = parse_com_field_list(CharacterSet::Utf8mb4, &buf).unwrap();
        assert_eq!("users", list.table);
        assert_eq!("%", list.wildcard);
    }
}
