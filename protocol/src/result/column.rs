use mimic_common::charset::CharacterSet;
use mimic_common::column_type::ColumnType;
use mimic_common::err::SqlResult;

use super::{binary, text, value::Value};

pub type TextEncoder = fn(&Value) -> Vec<u8>;
pub type BinaryEncoder = fn(&Value) -> SqlResult<Vec<u8>>;

/// Column metadata for a result set. Encoders default to the table keyed
/// by column type; either can be overridden per column.
#[derive(Debug, Clone)]
pub struct ResultColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub character_set: CharacterSet,
    pub text_encoder: Option<TextEncoder>,
    pub binary_encoder: Option<BinaryEncoder>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let character_set = if column_type.is_string_type() {
            CharacterSet::Utf8mb4
        } else {
            CharacterSet::Binary
        };
        ResultColumn {
            name: name.into(),
            column_type,
            character_set,
            text_encoder: None,
            binary_encoder: None,
        }
    }

    pub fn with_charset(mut self, charset: CharacterSet) -> Self {
        self.character_set = charset;
        self
    }

    pub fn text_encode(&self, value: &Value) -> Vec<u8> {
        match self.text_encoder {
            Some(encoder) => encoder(value),
            None => text::encoder_for(self.column_type)(value),
        }
    }

    pub fn binary_encode(&self, value: &Value) -> SqlResult<Vec<u8>> {
        match self.binary_encoder {
            Some(encoder) => encoder(value),
            None => binary::encoder_for(self.column_type)(value),
        }
    }
}

/// Shorthand for a utf8 string column.
pub fn string_column(name: impl Into<String>) -> ResultColumn {
    ResultColumn::new(name, ColumnType::String)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_charset_defaults() {
        assert_eq!(
            CharacterSet::Utf8mb4,
            ResultColumn::new("a", ColumnType::VarChar).character_set
        );
        assert_eq!(
            CharacterSet::Binary,
            ResultColumn::new("b", ColumnType::LongLong).character_set
        );
    }

    #[test]
    fn test_override_wins() {
        fn shout(_: &Value) -> Vec<u8> {
            b"X".to_vec()
        }
        let mut col = ResultColumn::new("a", ColumnType::String);
        col.text_encoder = Some(shout);
        assert_eq!(b"X".to_vec(), col.text_encode(&Value::Str("hi".into())));
    }
}
