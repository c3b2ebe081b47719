//! Binary protocol value encoding and the matching parameter decoding.
//!
//! ref: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_binary_resultset.html

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Duration, Timelike};

use mimic_common::charset::CharacterSet;
use mimic_common::column_type::ColumnType;
use mimic_common::err::{ErrorKind, ServerError, SqlResult};

use crate::codec::{put_str_len, PacketReader};

use super::bitmap::NullBitmap;
use super::column::{BinaryEncoder, ResultColumn};
use super::value::Value;

/// Binary encoder keyed by column type.
pub fn encoder_for(column_type: ColumnType) -> BinaryEncoder {
    match column_type {
        ColumnType::Tiny | ColumnType::Bool => encode_tiny,
        ColumnType::Short | ColumnType::Year => encode_short,
        ColumnType::Long | ColumnType::Int24 => encode_long,
        ColumnType::LongLong => encode_longlong,
        ColumnType::Float => encode_float,
        ColumnType::Double => encode_double,
        ColumnType::Date
        | ColumnType::DateTime
        | ColumnType::Timestamp
        | ColumnType::NewDate
        | ColumnType::DateTime2
        | ColumnType::Timestamp2 => encode_datetime,
        ColumnType::Time | ColumnType::Time2 => encode_time,
        _ => encode_lenenc,
    }
}

fn encode_tiny(value: &Value) -> SqlResult<Vec<u8>> {
    Ok(vec![value.as_i64().unwrap_or(0) as u8])
}

fn encode_short(value: &Value) -> SqlResult<Vec<u8>> {
    Ok((value.as_i64().unwrap_or(0) as i16).to_le_bytes().to_vec())
}

fn encode_long(value: &Value) -> SqlResult<Vec<u8>> {
    Ok((value.as_i64().unwrap_or(0) as i32).to_le_bytes().to_vec())
}

fn encode_longlong(value: &Value) -> SqlResult<Vec<u8>> {
    match value {
        Value::UInt(u) => Ok(u.to_le_bytes().to_vec()),
        other => Ok(other.as_i64().unwrap_or(0).to_le_bytes().to_vec()),
    }
}

fn encode_float(value: &Value) -> SqlResult<Vec<u8>> {
    Ok((value.as_f64().unwrap_or(0.0) as f32).to_le_bytes().to_vec())
}

fn encode_double(value: &Value) -> SqlResult<Vec<u8>> {
    Ok(value.as_f64().unwrap_or(0.0).to_le_bytes().to_vec())
}

fn encode_lenenc(value: &Value) -> SqlResult<Vec<u8>> {
    let mut buf = BytesMut::new();
    match value {
        Value::Bytes(b) => put_str_len(&mut buf, b),
        other => put_str_len(&mut buf, other.as_text().as_bytes()),
    }
    Ok(buf.to_vec())
}

/// Variable-length packed DATE/DATETIME/TIMESTAMP.
fn encode_datetime(value: &Value) -> SqlResult<Vec<u8>> {
    let (year, month, day, hour, minute, second, micros) = match value {
        Value::Date(d) => (d.year(), d.month(), d.day(), 0, 0, 0, 0),
        Value::DateTime(dt) => (
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.nanosecond() / 1000,
        ),
        other => {
            return Err(ServerError::mysql(
                ErrorKind::UnknownError,
                format!("cannot binary-encode {:?} as a temporal value", other),
            ))
        }
    };

    let mut buf = BytesMut::new();
    if micros == 0 {
        if hour == 0 && minute == 0 && second == 0 {
            if year == 0 && month == 0 && day == 0 {
                buf.put_u8(0);
            } else {
                buf.put_u8(4);
                buf.put_u16_le(year as u16);
                buf.put_u8(month as u8);
                buf.put_u8(day as u8);
            }
        } else {
            buf.put_u8(7);
            buf.put_u16_le(year as u16);
            buf.put_u8(month as u8);
            buf.put_u8(day as u8);
            buf.put_u8(hour as u8);
            buf.put_u8(minute as u8);
            buf.put_u8(second as u8);
        }
    } else {
        buf.put_u8(11);
        buf.put_u16_le(year as u16);
        buf.put_u8(month as u8);
        buf.put_u8(day as u8);
        buf.put_u8(hour as u8);
        buf.put_u8(minute as u8);
        buf.put_u8(second as u8);
        buf.put_u32_le(micros);
    }
    Ok(buf.to_vec())
}

/// Variable-length packed signed TIME.
fn encode_time(value: &Value) -> SqlResult<Vec<u8>> {
    let duration = match value {
        Value::Time(t) => *t,
        Value::Int(secs) => Duration::seconds(*secs),
        other => {
            return Err(ServerError::mysql(
                ErrorKind::UnknownError,
                format!("cannot binary-encode {:?} as TIME", other),
            ))
        }
    };

    let total_micros = duration
        .num_microseconds()
        .unwrap_or_else(|| duration.num_seconds().saturating_mul(1_000_000));
    let negative = total_micros < 0;
    let total_micros = total_micros.unsigned_abs();
    let micros = (total_micros % 1_000_000) as u32;
    let total_seconds = total_micros / 1_000_000;
    let seconds = (total_seconds % 60) as u8;
    let minutes = ((total_seconds / 60) % 60) as u8;
    let hours = ((total_seconds / 3600) % 24) as u8;
    let days = (total_seconds / 86400) as u32;

    let mut buf = BytesMut::new();
    if micros == 0 {
        if days == 0 && hours == 0 && minutes == 0 && seconds == 0 {
            buf.put_u8(0);
        } else {
            buf.put_u8(8);
            buf.put_u8(negative as u8);
            buf.put_u32_le(days);
            buf.put_u8(hours);
            buf.put_u8(minutes);
            buf.put_u8(seconds);
        }
    } else {
        buf.put_u8(12);
        buf.put_u8(negative as u8);
        buf.put_u32_le(days);
        buf.put_u8(hours);
        buf.put_u8(minutes);
        buf.put_u8(seconds);
        buf.put_u32_le(micros);
    }
    Ok(buf.to_vec())
}

/// One binary-protocol row packet: header byte, null bitmap at offset 2,
/// then the typed values of the non-null columns.
pub fn binary_row(row: &[Value], columns: &[ResultColumn]) -> SqlResult<Vec<u8>> {
    let mut bitmap = NullBitmap::new(row.len(), 2);
    let mut values = BytesMut::new();

    for (i, (value, column)) in row.iter().zip(columns.iter()).enumerate() {
        if value.is_null() {
            bitmap.flip(i);
        } else {
            values.put_slice(&column.binary_encode(value)?);
        }
    }

    let mut buf = BytesMut::new();
    buf.put_u8(0);
    buf.put_slice(bitmap.as_bytes());
    buf.put_slice(&values);
    Ok(buf.to_vec())
}

/// Decode one typed parameter value from a COM_STMT_EXECUTE payload.
pub fn read_param_value(
    reader: &mut PacketReader<'_>,
    param_type: ColumnType,
    unsigned: bool,
    charset: CharacterSet,
) -> SqlResult<Value> {
    match param_type {
        ColumnType::VarChar
        | ColumnType::VarString
        | ColumnType::String
        | ColumnType::Blob
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Decimal
        | ColumnType::NewDecimal
        | ColumnType::Json => {
            let bytes = reader.read_str_len()?;
            Ok(Value::Str(charset.decode(bytes)?))
        }
        ColumnType::Tiny => Ok(if unsigned {
            Value::UInt(reader.read_u8()? as u64)
        } else {
            Value::Int(reader.read_i8()? as i64)
        }),
        ColumnType::Bool => Ok(Value::UInt(reader.read_u8()? as u64)),
        ColumnType::Short | ColumnType::Year => Ok(if unsigned {
            Value::UInt(reader.read_u16()? as u64)
        } else {
            Value::Int(reader.read_i16()? as i64)
        }),
        ColumnType::Long | ColumnType::Int24 => Ok(if unsigned {
            Value::UInt(reader.read_u32()? as u64)
        } else {
            Value::Int(reader.read_i32()? as i64)
        }),
        ColumnType::LongLong => Ok(if unsigned {
            Value::UInt(reader.read_u64()?)
        } else {
            Value::Int(reader.read_i64()?)
        }),
        ColumnType::Float => Ok(Value::Float(reader.read_f32()? as f64)),
        ColumnType::Double => Ok(Value::Float(reader.read_f64()?)),
        ColumnType::Null => Ok(Value::Null),
        other => Err(ServerError::not_supported(format!(
            "unsupported parameter type: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_longlong_roundtrip() {
        let data = encode_longlong(&Value::Int(-42)).unwrap();
        let mut r = PacketReader::new(&data);
        assert_eq!(
            Value::Int(-42),
            read_param_value(&mut r, ColumnType::LongLong, false, CharacterSet::Utf8mb4).unwrap()
        );
    }

    #[test]
    fn test_datetime_lengths() {
        let zero = Value::DateTime(
            NaiveDate::from_ymd_opt(2021, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(5, encode_datetime(&zero).unwrap().len());

        let with_time = Value::DateTime(
            NaiveDate::from_ymd_opt(2021, 6, 1)
                .unwrap()
                .and_hms_opt(10, 20, 30)
                .unwrap(),
        );
        assert_eq!(8, encode_datetime(&with_time).unwrap().len());

        let with_micros = Value::DateTime(
            NaiveDate::from_ymd_opt(2021, 6, 1)
                .unwrap()
                .and_hms_micro_opt(10, 20, 30, 999)
                .unwrap(),
        );
        assert_eq!(12, encode_datetime(&with_micros).unwrap().len());
    }

    #[test]
    fn test_time_sign() {
        let data = encode_time(&Value::Time(Duration::seconds(-5))).unwrap();
        assert_eq!(9, data.len());
        assert_eq!(1, data[1]);
        assert_eq!(5, data[8]);
    }

    #[test]
    fn test_binary_row_nulls() {
        let columns = vec![
            ResultColumn::new("a", ColumnType::LongLong),
            ResultColumn::new("b", ColumnType::String),
        ];
        let row = vec![Value::Null, Value::Str("x".into())];
        let data = binary_row(&row, &columns).unwrap();
        // header, one bitmap byte with bit 2 set, then "x" as lenenc
        assert_eq!(vec![0x00, 0b0000_0100, 0x01, b'x'], data);
    }
}
