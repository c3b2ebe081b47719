use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

/// MYSQL column types as they appear on the wire.
///
/// type def ref: https://dev.mysql.com/doc/dev/mysql-server/latest/field__types_8h.html
#[derive(Debug, Serialize, PartialEq, Eq, Hash, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E, // internal used
    VarChar = 0x0F,
    Bit = 0x10,
    Timestamp2 = 0x11,
    DateTime2 = 0x12,
    Time2 = 0x13,
    TypedArray = 0x14,
    Invalid = 0xF3,
    Bool = 0xF4,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl ColumnType {
    /// Wire types that carry their payload as a length-prefixed string in
    /// the binary protocol.
    pub fn is_string_type(self) -> bool {
        matches!(
            self,
            ColumnType::VarChar
                | ColumnType::VarString
                | ColumnType::String
                | ColumnType::Blob
                | ColumnType::TinyBlob
                | ColumnType::MediumBlob
                | ColumnType::LongBlob
                | ColumnType::Decimal
                | ColumnType::NewDecimal
                | ColumnType::Json
                | ColumnType::Enum
                | ColumnType::Set
                | ColumnType::Bit
                | ColumnType::Geometry
        )
    }
}
