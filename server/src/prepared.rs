//! Per-connection prepared statements and textual parameter
//! interpolation.

use std::collections::HashMap;

use mimic_protocol::result::{ResultSet, Value};

/// A prepared statement. `param_buffers` accumulates
/// COM_STMT_SEND_LONG_DATA chunks between executes; `cursor` holds the
/// open server-side cursor while one exists.
pub struct PreparedStatement {
    pub id: u32,
    pub sql: String,
    pub num_params: u16,
    pub param_buffers: Option<HashMap<u16, Vec<u8>>>,
    pub cursor: Option<ResultSet>,
}

impl PreparedStatement {
    pub fn new(id: u32, sql: String) -> Self {
        let num_params = param_positions(&sql).len() as u16;
        PreparedStatement {
            id,
            sql,
            num_params,
            param_buffers: None,
            cursor: None,
        }
    }

    pub fn append_long_data(&mut self, param_id: u16, data: &[u8]) {
        self.param_buffers
            .get_or_insert_with(HashMap::new)
            .entry(param_id)
            .or_default()
            .extend_from_slice(data);
    }

    /// COM_STMT_RESET contract: drop accumulated long data and close the
    /// cursor.
    pub fn reset(&mut self) {
        self.param_buffers = None;
        self.cursor = None;
    }
}

/// Byte offsets of `?` placeholders that sit outside single-quoted,
/// double-quoted, or backtick-quoted runs.
pub fn param_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    for (idx, ch) in sql.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                '?' => positions.push(idx),
                _ => {}
            },
        }
    }
    positions
}

/// Substitute parameter values left-to-right into the `?` positions.
///
/// Values are rendered as SQL literals; string parameters are quoted
/// without escaping embedded quotes (a documented compatibility
/// limitation of the textual rewrite).
pub fn interpolate_params(sql: &str, values: &[Value]) -> String {
    let positions = param_positions(sql);
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (pos, value) in positions.iter().zip(values.iter()) {
        out.push_str(&sql[last..*pos]);
        out.push_str(&value.to_sql_literal());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counts_placeholders_outside_quotes() {
        assert_eq!(3, param_positions("SELECT ?, ?, ?").len());
        assert_eq!(1, param_positions("SELECT '?', ?").len());
        assert_eq!(0, param_positions("SELECT \"?\", '?'").len());
        assert_eq!(1, param_positions("SELECT `a?b`, ?").len());
    }

    #[test]
    fn test_interpolation() {
        let sql = interpolate_params(
            "SELECT ?, ?, ?",
            &[Value::Str("1".into()), Value::Null, Value::Int(1)],
        );
        assert_eq!("SELECT '1', NULL, 1", sql);
    }

    #[test]
    fn test_interpolation_skips_quoted_marks() {
        let sql = interpolate_params("SELECT '?' , ?", &[Value::Bool(true)]);
        assert_eq!("SELECT '?' , TRUE", sql);
    }

    #[test]
    fn test_long_data_accumulates() {
        let mut stmt = PreparedStatement::new(1, "SELECT ?".into());
        stmt.append_long_data(0, b"hello ");
        stmt.append_long_data(0, b"world");
        assert_eq!(
            b"hello world".to_vec(),
            stmt.param_buffers.as_ref().unwrap()[&0]
        );
        stmt.reset();
        assert!(stmt.param_buffers.is_none());
    }

    #[test]
    fn test_num_params() {
        let stmt = PreparedStatement::new(1, "INSERT INTO t VALUES (?, ?)".into());
        assert_eq!(2, stmt.num_params);
    }
}
