//! Column-type inference for backends that return bare column names.

use std::collections::VecDeque;

use mimic_common::column_type::ColumnType;
use mimic_common::err::SqlResult;

use super::column::ResultColumn;
use super::rows::{Row, RowSource};
use super::value::Value;
use super::ResultSet;

pub fn infer_type(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Null,
        Value::Bool(_) => ColumnType::Tiny,
        Value::DateTime(_) => ColumnType::DateTime,
        Value::Str(_) => ColumnType::String,
        Value::Bytes(_) => ColumnType::Blob,
        Value::Int(_) | Value::UInt(_) => ColumnType::LongLong,
        Value::Float(_) => ColumnType::Double,
        Value::Date(_) => ColumnType::Date,
        Value::Time(_) => ColumnType::Time,
    }
}

/// Infer columns for a bounded row set. Each column takes the type of its
/// first non-null value; columns that never produce one are NULL-typed.
pub fn infer_from_rows(names: Vec<String>, rows: Vec<Row>) -> ResultSet {
    let mut types: Vec<Option<ColumnType>> = vec![None; names.len()];
    for row in &rows {
        if types.iter().all(|t| t.is_some()) {
            break;
        }
        for (i, value) in row.iter().enumerate().take(types.len()) {
            if types[i].is_none() && !value.is_null() {
                types[i] = Some(infer_type(value));
            }
        }
    }
    let columns = build_columns(names, types);
    ResultSet::new(columns, rows)
}

/// Streaming variant: peek ahead in the source until every column has seen
/// a non-null value (or the source ends), then re-yield the peeked rows in
/// front of the remainder so no row is lost.
pub async fn infer_from_source(names: Vec<String>, mut source: RowSource) -> SqlResult<ResultSet> {
    let mut types: Vec<Option<ColumnType>> = vec![None; names.len()];
    let mut peeked: VecDeque<Row> = VecDeque::new();

    while types.iter().any(|t| t.is_none()) {
        match source.next_row().await? {
            Some(row) => {
                for (i, value) in row.iter().enumerate().take(types.len()) {
                    if types[i].is_none() && !value.is_null() {
                        types[i] = Some(infer_type(value));
                    }
                }
                peeked.push_back(row);
            }
            None => break,
        }
    }

    let columns = build_columns(names, types);
    Ok(ResultSet::with_peeked(columns, peeked, source))
}

fn build_columns(names: Vec<String>, types: Vec<Option<ColumnType>>) -> Vec<ResultColumn> {
    names
        .into_iter()
        .zip(types)
        .map(|(name, t)| ResultColumn::new(name, t.unwrap_or(ColumnType::Null)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::super::rows::VecRows;
    use super::*;

    #[test]
    fn test_infer_priorities() {
        assert_eq!(ColumnType::Tiny, infer_type(&Value::Bool(true)));
        assert_eq!(ColumnType::LongLong, infer_type(&Value::Int(1)));
        assert_eq!(ColumnType::Double, infer_type(&Value::Float(0.5)));
        assert_eq!(ColumnType::String, infer_type(&Value::Str("s".into())));
        assert_eq!(ColumnType::Null, infer_type(&Value::Null));
    }

    #[test]
    fn test_skips_leading_nulls() {
        let rows = vec![
            vec![Value::Null, Value::Str("a".into())],
            vec![Value::Int(3), Value::Null],
        ];
        let rs = infer_from_rows(vec!["x".into(), "y".into()], rows);
        assert_eq!(ColumnType::LongLong, rs.columns[0].column_type);
        assert_eq!(ColumnType::String, rs.columns[1].column_type);
    }

    #[test]
    fn test_all_null_column() {
        let rows = vec![vec![Value::Null], vec![Value::Null]];
        let rs = infer_from_rows(vec!["x".into()], rows);
        assert_eq!(ColumnType::Null, rs.columns[0].column_type);
    }

    #[tokio::test]
    async fn test_streaming_reyields_peeked_rows() {
        let rows = vec![
            vec![Value::Null],
            vec![Value::Null],
            vec![Value::Int(5)],
            vec![Value::Int(6)],
        ];
        let source = RowSource::Stream(Box::new(VecRows::new(rows)));
        let mut rs = infer_from_source(vec!["x".into()], source).await.unwrap();
        assert_eq!(ColumnType::LongLong, rs.columns[0].column_type);

        let mut seen = Vec::new();
        while let Some(row) = rs.next_row().await.unwrap() {
            seen.push(row);
        }
        assert_eq!(4, seen.len());
        assert_eq!(vec![Value::Int(6)], seen[3]);
    }
}
