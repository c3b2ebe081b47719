//! Prepared-statement packets.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_stmt_prepare.html

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use mimic_common::charset::CharacterSet;
use mimic_common::err::{ServerError, SqlResult};

use crate::codec::PacketReader;
use crate::constants::{CapabilityFlags, CursorFlags};
use crate::result::Value;

use super::read_params;

/// First packet of a COM_STMT_PREPARE response.
#[derive(Debug, Clone)]
pub struct ComStmtPrepareOk {
    pub stmt_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl ComStmtPrepareOk {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(0); // OK
        buf.put_u32_le(self.stmt_id);
        buf.put_u16_le(self.num_columns);
        buf.put_u16_le(self.num_params);
        buf.put_u8(0); // filler
        buf.put_u16_le(self.warnings);
        buf.to_vec()
    }
}

#[derive(Debug, Clone)]
pub struct ComStmtExecute {
    pub stmt_id: u32,
    pub use_cursor: bool,
    /// Statement parameters first (unnamed), query attributes after.
    pub params: Vec<(Option<String>, Value)>,
}

/// The statement id leads the payload so the caller can look up the
/// statement before decoding the parameter block.
pub fn peek_stmt_id(data: &[u8]) -> SqlResult<u32> {
    PacketReader::new(data).read_u32()
}

/// ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_stmt_execute.html
pub fn parse_com_stmt_execute(
    capabilities: CapabilityFlags,
    client_charset: CharacterSet,
    data: &[u8],
    num_params: u16,
    buffers: Option<&HashMap<u16, Vec<u8>>>,
) -> SqlResult<ComStmtExecute> {
    let mut r = PacketReader::new(data);
    let stmt_id = r.read_u32()?;

    let flags = CursorFlags::from_bits_retain(r.read_u8()?);
    let use_cursor = if flags.contains(CursorFlags::CURSOR_TYPE_READ_ONLY) {
        true
    } else if flags
        .intersects(CursorFlags::CURSOR_TYPE_FOR_UPDATE | CursorFlags::CURSOR_TYPE_SCROLLABLE)
    {
        return Err(ServerError::not_supported(format!(
            "Unsupported cursor flags: {:?}",
            flags
        )));
    } else {
        false
    };
    let param_count_available = flags.contains(CursorFlags::PARAMETER_COUNT_AVAILABLE);

    r.read_u32()?; // iteration count, always 1

    let query_attributes = capabilities.contains(CapabilityFlags::CLIENT_QUERY_ATTRIBUTES);
    let mut parameter_count = num_params as usize;
    if (num_params > 0 || (query_attributes && param_count_available)) && query_attributes {
        parameter_count = r.read_uint_len()? as usize;
    }

    let params = read_params(capabilities, client_charset, &mut r, parameter_count, buffers)?;

    Ok(ComStmtExecute {
        stmt_id,
        use_cursor,
        params,
    })
}

#[derive(Debug, Clone)]
pub struct ComStmtSendLongData {
    pub stmt_id: u32,
    pub param_id: u16,
    pub data: Vec<u8>,
}

pub fn parse_com_stmt_send_long_data(data: &[u8]) -> SqlResult<ComStmtSendLongData> {
    let mut r = PacketReader::new(data);
    Ok(ComStmtSendLongData {
        stmt_id: r.read_u32()?,
        param_id: r.read_u16()?,
        data: r.read_str_rest()?.to_vec(),
    })
}

#[derive(Debug, Clone)]
pub struct ComStmtFetch {
    pub stmt_id: u32,
    pub num_rows: u32,
}

pub fn parse_com_stmt_fetch(data: &[u8]) -> SqlResult<ComStmtFetch> {
    let mut r = PacketReader::new(data);
    Ok(ComStmtFetch {
        stmt_id: r.read_u32()?,
        num_rows: r.read_u32()?,
    })
}

#[derive(Debug, Clone)]
pub struct ComStmtReset {
    pub stmt_id: u32,
}

pub fn parse_com_stmt_reset(data: &[u8]) -> SqlResult<ComStmtReset> {
    Ok(ComStmtReset {
        stmt_id: PacketReader::new(data).read_u32()?,
    })
}

#[derive(Debug, Clone)]
pub struct ComStmtClose {
    pub stmt_id: u32,
}

pub fn parse_com_stmt_close(data: &[u8]) -> SqlResult<ComStmtClose> {
    Ok(ComStmtClose {
        stmt_id: PacketReader::new(data).read_u32()?,
    })
}

#[cfg(test)]
mod test {
    use mimic_common::column_type::ColumnType;

    use crate::codec::{put_str_len, put_uint_len};
    use crate::result::NullBitmap;

    use super::*;

    fn caps() -> CapabilityFlags {
        CapabilityFlags::CLIENT_PROTOCOL_41 | CapabilityFlags::CLIENT_QUERY_ATTRIBUTES
    }

    fn execute_payload(stmt_id: u32, flags: u8, params: &[(ColumnType, Option<&[u8]>)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(stmt_id);
        buf.put_u8(flags);
        buf.put_u32_le(1); // iteration count
        if !params.is_empty() {
            put_uint_len(&mut buf, params.len() as u64);
            let mut bitmap = NullBitmap::new(params.len(), 0);
            for (i, (_, value)) in params.iter().enumerate() {
                if value.is_none() {
                    bitmap.flip(i);
                }
            }
            buf.put_slice(bitmap.as_bytes());
            buf.put_u8(1); // new-params-bound flag
            for (t, _) in params {
                buf.put_u8(u8::from(*t));
                buf.put_u8(0);
                put_str_len(&mut buf, b""); // unnamed statement parameter
            }
            for (_, value) in params {
                if let Some(v) = value {
                    put_str_len(&mut buf, v);
                }
            }
        }
        buf.to_vec()
    }

    #[test]
    fn test_execute_with_params() {
        let payload = execute_payload(
            7,
            0x00,
            &[
                (ColumnType::VarString, Some(b"abc")),
                (ColumnType::VarString, None),
            ],
        );
        assert_eq!(7, peek_stmt_id(&payload).unwrap());
        let exec =
            parse_com_stmt_execute(caps(), CharacterSet::Utf8mb4, &payload, 2, None).unwrap();
        assert!(!exec.use_cursor);
        assert_eq!(2, exec.params.len());
        assert_eq!(Value::Str("abc".into()), exec.params[0].1);
        assert_eq!(Value::Null, exec.params[1].1);
    }

    #[test]
    fn test_execute_cursor_flag() {
        let payload = execute_payload(3, 0x01, &[]);
        let exec =
            parse_com_stmt_execute(caps(), CharacterSet::Utf8mb4, &payload, 0, None).unwrap();
        assert!(exec.use_cursor);
    }

    #[test]
    fn test_execute_rejects_scrollable() {
        let payload = execute_payload(3, 0x04, &[]);
        assert!(parse_com_stmt_execute(caps(), CharacterSet::Utf8mb4, &payload, 0, None).is_err());
    }

    #[test]
    fn test_long_data_override() {
        let payload = execute_payload(9, 0x00, &[(ColumnType::VarString, Some(b"inline"))]);
        let mut buffers = HashMap::new();
        buffers.insert(0u16, b"accumulated".to_vec());
        let exec =
            parse_com_stmt_execute(caps(), CharacterSet::Utf8mb4, &payload, 1, Some(&buffers))
                .unwrap();
        assert_eq!(Value::Str("accumulated".into()), exec.params[0].1);
    }

    #[test]
    fn test_prepare_ok_layout() {
        let ok = ComStmtPrepareOk {
            stmt_id: 0x0102,
            num_columns: 0,
            num_params: 3,
            warnings: 0,
        };
        let data = ok.serialize();
        assert_eq!(12, data.len());
        assert_eq!(0, data[0]);
        assert_eq!(0x0102, u32::from_le_bytes([data[1], data[2], data[3], data[4]]));
        assert_eq!(3, u16::from_le_bytes([data[7], data[8]]));
    }

    #[test]
    fn test_fetch_parse() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(11);
        buf.put_u32_le(250);
        let fetch = parse_com_stmt_fetch(&buf).unwrap();
        assert_eq!(11, fetch.stmt_id);
        assert_eq!(250, fetch.num_rows);
    }
}
