//! Column count and ColumnDefinition41 packets.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query_response_text_resultset_column_definition.html

use bytes::{BufMut, BytesMut};

use mimic_common::charset::CharacterSet;
use mimic_common::column_type::ColumnType;

use crate::codec::{put_str_len, put_uint_len};
use crate::constants::{CapabilityFlags, ColumnFlags};
use crate::result::ResultColumn;

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: CharacterSet,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
    /// COM_FIELD_LIST responses append a default-value field.
    pub is_field_list: bool,
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        ColumnDefinition {
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: name.into(),
            org_name: String::new(),
            character_set: CharacterSet::Utf8mb4,
            column_length: 256,
            column_type: ColumnType::VarChar,
            flags: ColumnFlags::empty(),
            decimals: 0,
            is_field_list: false,
            default: None,
        }
    }

    pub fn for_column(column: &ResultColumn) -> Self {
        ColumnDefinition {
            character_set: column.character_set,
            column_type: column.column_type,
            ..ColumnDefinition::named(column.name.clone())
        }
    }

    pub fn serialize(&self, server_charset: CharacterSet) -> Vec<u8> {
        let org_table = if self.org_table.is_empty() {
            &self.table
        } else {
            &self.org_table
        };
        let org_name = if self.org_name.is_empty() {
            &self.name
        } else {
            &self.org_name
        };

        let mut buf = BytesMut::new();
        put_str_len(&mut buf, b"def");
        put_str_len(&mut buf, &server_charset.encode(&self.schema));
        put_str_len(&mut buf, &server_charset.encode(&self.table));
        put_str_len(&mut buf, &server_charset.encode(org_table));
        put_str_len(&mut buf, &server_charset.encode(&self.name));
        put_str_len(&mut buf, &server_charset.encode(org_name));
        put_uint_len(&mut buf, 0x0C); // length of the fixed fields
        buf.put_u16_le(u8::from(self.character_set) as u16);
        buf.put_u32_le(self.column_length);
        buf.put_u8(self.column_type.into());
        buf.put_u16_le(self.flags.bits());
        buf.put_u8(self.decimals);
        buf.put_u16_le(0); // filler
        if self.is_field_list {
            match &self.default {
                None => put_uint_len(&mut buf, 0),
                Some(default) => {
                    let bytes = server_charset.encode(default);
                    put_uint_len(&mut buf, bytes.len() as u64);
                    put_str_len(&mut buf, &bytes);
                }
            }
        }
        buf.to_vec()
    }
}

pub fn make_column_count(capabilities: CapabilityFlags, column_count: usize) -> Vec<u8> {
    let mut buf = BytesMut::new();
    if capabilities.contains(CapabilityFlags::CLIENT_OPTIONAL_RESULTSET_METADATA) {
        buf.put_u8(1); // RESULTSET_METADATA_FULL
    }
    put_uint_len(&mut buf, column_count as u64);
    buf.to_vec()
}

#[cfg(test)]
mod test {
    use crate::codec::PacketReader;

    use super::*;

    #[test]
    fn test_layout() {
        let def = ColumnDefinition {
            schema: "db".into(),
            table: "t".into(),
            ..ColumnDefinition::named("col")
        };
        let data = def.serialize(CharacterSet::Utf8mb4);

        let mut r = PacketReader::new(&data);
        assert_eq!(b"def", r.read_str_len().unwrap());
        assert_eq!(b"db", r.read_str_len().unwrap());
        assert_eq!(b"t", r.read_str_len().unwrap());
        assert_eq!(b"t", r.read_str_len().unwrap()); // org_table falls back
        assert_eq!(b"col", r.read_str_len().unwrap());
        assert_eq!(b"col", r.read_str_len().unwrap());
        assert_eq!(0x0C, r.read_uint_len().unwrap());
        assert_eq!(255, r.read_u16().unwrap()); // utf8mb4
        assert_eq!(256, r.read_u32().unwrap());
        assert_eq!(u8::from(ColumnType::VarChar), r.read_u8().unwrap());
    }

    #[test]
    fn test_column_count() {
        assert_eq!(vec![3], make_column_count(CapabilityFlags::empty(), 3));
    }
}
