pub mod auth;
pub mod column;
pub mod command;
pub mod generic;
pub mod handshake;
pub mod stmt;

pub use auth::{make_auth_more_data, make_auth_switch_request};
pub use column::{make_column_count, ColumnDefinition};
pub use command::{
    parse_com_change_user, parse_com_field_list, parse_com_init_db, parse_com_query,
    ComChangeUser, ComFieldList, ComQuery,
};
pub use generic::{EofPacket, ErrPacket, OkPacket};
pub use handshake::{
    parse_handshake_response, HandshakeResponse, HandshakeResponse41, HandshakeV10, SslRequest,
};
pub use stmt::{
    parse_com_stmt_close, parse_com_stmt_execute, parse_com_stmt_fetch, parse_com_stmt_reset,
    parse_com_stmt_send_long_data, peek_stmt_id, ComStmtClose, ComStmtExecute, ComStmtFetch,
    ComStmtPrepareOk, ComStmtReset, ComStmtSendLongData,
};

use std::collections::HashMap;

use mimic_common::charset::CharacterSet;
use mimic_common::column_type::ColumnType;
use mimic_common::err::{ServerError, SqlResult};

use crate::codec::{uint_len_size, PacketReader};
use crate::constants::CapabilityFlags;
use crate::result::{binary, NullBitmap, Value};

/// Read a parameter block, shared by COM_QUERY query attributes and
/// COM_STMT_EXECUTE. Statement parameters come first and carry empty
/// names; query attributes follow with their names.
pub(crate) fn read_params(
    capabilities: CapabilityFlags,
    charset: CharacterSet,
    reader: &mut PacketReader<'_>,
    parameter_count: usize,
    buffers: Option<&HashMap<u16, Vec<u8>>>,
) -> SqlResult<Vec<(Option<String>, Value)>> {
    let mut params = Vec::with_capacity(parameter_count);
    if parameter_count == 0 {
        return Ok(params);
    }

    let null_bitmap = NullBitmap::from_reader(reader, parameter_count, 0)?;
    let new_params_bound = reader.read_u8()?;
    if new_params_bound != 1 {
        return Err(ServerError::not_supported(
            "Server requires the new-params-bound-flag to be set",
        ));
    }

    let mut param_types = Vec::with_capacity(parameter_count);
    for _ in 0..parameter_count {
        let type_byte = reader.read_u8()?;
        let param_type = ColumnType::try_from(type_byte)
            .map_err(|_| ServerError::malformed(format!("unknown parameter type {}", type_byte)))?;
        let unsigned = reader.read_u8()? & 0x80 > 0;

        let name = if capabilities.contains(CapabilityFlags::CLIENT_QUERY_ATTRIBUTES) {
            let raw = reader.read_str_len()?;
            let name = charset.decode(raw)?;
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        } else {
            None
        };
        param_types.push((name, param_type, unsigned));
    }

    for (i, (name, param_type, unsigned)) in param_types.into_iter().enumerate() {
        if null_bitmap.is_flipped(i) {
            params.push((name, Value::Null));
        } else if let Some(buffer) = buffers.and_then(|b| b.get(&(i as u16))) {
            // Long data sent ahead of the execute overrides the inline value.
            params.push((name, Value::Str(charset.decode(buffer)?)));
        } else {
            params.push((
                name,
                binary::read_param_value(reader, param_type, unsigned, charset)?,
            ));
        }
    }

    Ok(params)
}

pub(crate) fn read_connect_attrs(
    reader: &mut PacketReader<'_>,
    charset: CharacterSet,
) -> SqlResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    let mut total = reader.read_uint_len()? as i64;

    while total > 0 {
        let key = reader.read_str_len()?;
        let value = reader.read_str_len()?;
        let item_len = uint_len_size(key.len() as u64)
            + key.len()
            + uint_len_size(value.len() as u64)
            + value.len();
        total -= item_len as i64;
        attrs.insert(charset.decode(key)?, charset.decode(value)?);
    }
    Ok(attrs)
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use crate::codec::{put_str_len, put_uint_len};

    use super::*;

    #[test]
    fn test_connect_attrs() {
        let mut inner = BytesMut::new();
        put_str_len(&mut inner, b"_client_name");
        put_str_len(&mut inner, b"libmysql");
        put_str_len(&mut inner, b"_pid");
        put_str_len(&mut inner, b"121");

        let mut buf = BytesMut::new();
        put_uint_len(&mut buf, inner.len() as u64);
        buf.extend_from_slice(&inner);

        let mut reader = PacketReader::new(&buf);
        let attrs = read_connect_attrs(&mut reader, CharacterSet::Utf8mb4).unwrap();
        assert_eq!(2, attrs.len());
        assert_eq!("libmysql", attrs["_client_name"]);
        assert_eq!("121", attrs["_pid"]);
    }
}
