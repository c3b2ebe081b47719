use async_trait::async_trait;

use mimic_common::err::SqlResult;

use super::value::Value;

pub type Row = Vec<Value>;

/// Pull-style row iterator. Implementations may be unbounded; the
/// serializer applies backpressure by only pulling when the transport is
/// ready for more.
#[async_trait]
pub trait Rows: Send + Sync {
    async fn next_row(&mut self) -> SqlResult<Option<Row>>;
}

/// Bounded, vector-backed row source.
pub struct VecRows {
    iter: std::vec::IntoIter<Row>,
}

impl VecRows {
    pub fn new(rows: Vec<Row>) -> Self {
        VecRows {
            iter: rows.into_iter(),
        }
    }
}

#[async_trait]
impl Rows for VecRows {
    async fn next_row(&mut self) -> SqlResult<Option<Row>> {
        Ok(self.iter.next())
    }
}

/// Either a bounded vector or a boxed stream.
pub enum RowSource {
    Vec(VecRows),
    Stream(Box<dyn Rows>),
}

impl RowSource {
    pub fn from_vec(rows: Vec<Row>) -> Self {
        RowSource::Vec(VecRows::new(rows))
    }

    pub async fn next_row(&mut self) -> SqlResult<Option<Row>> {
        match self {
            RowSource::Vec(v) => v.next_row().await,
            RowSource::Stream(s) => s.next_row().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_vec_rows() {
        let mut rows = VecRows::new(vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        assert_eq!(Some(vec![Value::Int(1)]), rows.next_row().await.unwrap());
        assert_eq!(Some(vec![Value::Int(2)]), rows.next_row().await.unwrap());
        assert_eq!(None, rows.next_row().await.unwrap());
    }
}
