//! Text protocol value encoding.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query_response_text_resultset_row.html

use bytes::{BufMut, BytesMut};

use mimic_common::column_type::ColumnType;

use super::column::{ResultColumn, TextEncoder};
use super::value::Value;

/// Text encoder for a column type. Most types render through the value's
/// canonical string form; blob types pass bytes through untouched.
pub fn encoder_for(column_type: ColumnType) -> TextEncoder {
    match column_type {
        ColumnType::Blob
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Geometry
        | ColumnType::Bit => encode_bytes,
        _ => encode_default,
    }
}

fn encode_default(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(b) => b.clone(),
        other => other.as_text().into_bytes(),
    }
}

fn encode_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(b) => b.clone(),
        Value::Str(s) => s.clone().into_bytes(),
        other => other.as_text().into_bytes(),
    }
}

/// One text-protocol row packet: NULL is the single byte 0xFB, everything
/// else a length-prefixed string.
pub fn text_row(row: &[Value], columns: &[ResultColumn]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for (value, column) in row.iter().zip(columns.iter()) {
        if value.is_null() {
            buf.put_u8(0xFB);
        } else {
            crate::codec::put_str_len(&mut buf, &column.text_encode(value));
        }
    }
    buf.to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_null_marker() {
        let columns = vec![
            ResultColumn::new("a", ColumnType::String),
            ResultColumn::new("b", ColumnType::LongLong),
        ];
        let row = vec![Value::Null, Value::Int(7)];
        let data = text_row(&row, &columns);
        assert_eq!(vec![0xFB, 0x01, b'7'], data);
    }

    #[test]
    fn test_string_lengths() {
        let columns = vec![ResultColumn::new("a", ColumnType::String)];
        let data = text_row(&[Value::Str("abc".into())], &columns);
        assert_eq!(vec![3, b'a', b'b', b'c'], data);
    }
}
