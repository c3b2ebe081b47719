pub mod binary;
pub mod bitmap;
pub mod column;
pub mod infer;
pub mod rows;
pub mod text;
pub mod value;

use std::collections::VecDeque;

pub use bitmap::NullBitmap;
pub use column::ResultColumn;
pub use rows::{Row, RowSource, Rows, VecRows};
pub use value::Value;

use mimic_common::err::SqlResult;

/// A result set: column metadata plus a bounded or streaming row source.
/// An instance without columns stands for "no result" and is answered with
/// a plain OK packet.
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    /// Rows pulled off the source during type inference, re-yielded ahead
    /// of the remaining stream so no row is lost.
    peeked: VecDeque<Row>,
    source: RowSource,
}

impl ResultSet {
    pub fn new(columns: Vec<ResultColumn>, rows: Vec<Row>) -> Self {
        ResultSet {
            columns,
            peeked: VecDeque::new(),
            source: RowSource::from_vec(rows),
        }
    }

    pub fn streaming(columns: Vec<ResultColumn>, rows: Box<dyn Rows>) -> Self {
        ResultSet {
            columns,
            peeked: VecDeque::new(),
            source: RowSource::Stream(rows),
        }
    }

    pub(crate) fn with_peeked(
        columns: Vec<ResultColumn>,
        peeked: VecDeque<Row>,
        source: RowSource,
    ) -> Self {
        ResultSet {
            columns,
            peeked,
            source,
        }
    }

    /// Empty result: no columns, no rows.
    pub fn empty() -> Self {
        ResultSet::new(Vec::new(), Vec::new())
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub async fn next_row(&mut self) -> SqlResult<Option<Row>> {
        if let Some(row) = self.peeked.pop_front() {
            return Ok(Some(row));
        }
        self.source.next_row().await
    }

    /// Hand a row back so the next [`ResultSet::next_row`] returns it
    /// again. Used when a reader peeks past what it consumes.
    pub fn push_front(&mut self, row: Row) {
        self.peeked.push_front(row);
    }

    /// Drain every remaining row. Only sensible for bounded sources.
    pub async fn collect_rows(&mut self) -> SqlResult<Vec<Row>> {
        let mut out = Vec::new();
        while let Some(row) = self.next_row().await? {
            out.push(row);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .field("peeked", &self.peeked.len())
            .finish()
    }
}
