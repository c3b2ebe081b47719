//! The backend contract. Applications implement [`Session`] to receive
//! statements that the interceptor chain did not handle internally.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlparser::ast::Statement;

use mimic_common::err::SqlResult;
use mimic_protocol::result::{infer, ResultSet, Row, RowSource, Rows};

use crate::vars::SystemVariables;

/// Nested mapping `db -> table -> column -> SQL type string` used to
/// materialize the synthetic INFORMATION_SCHEMA tables. The catalog level
/// is fixed to `def`.
pub type SchemaMapping = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// What a backend may return from [`Session::query`].
pub enum QueryResponse {
    /// No result set; the client receives an OK packet.
    None,
    /// Fully-typed result set, possibly streaming.
    ResultSet(ResultSet),
    /// Bounded rows with bare column names; types are inferred from the
    /// first non-null value per column.
    Rows(Vec<Row>, Vec<String>),
    /// Streaming rows with bare column names.
    Stream(Box<dyn Rows>, Vec<String>),
}

impl QueryResponse {
    /// Normalize into an optional result set, running type inference for
    /// the bare-name forms.
    pub async fn into_result_set(self) -> SqlResult<Option<ResultSet>> {
        match self {
            QueryResponse::None => Ok(None),
            QueryResponse::ResultSet(rs) => Ok(Some(rs)),
            QueryResponse::Rows(rows, names) => Ok(Some(infer::infer_from_rows(names, rows))),
            QueryResponse::Stream(stream, names) => Ok(Some(
                infer::infer_from_source(names, RowSource::Stream(stream)).await?,
            )),
        }
    }
}

/// Read-only view of connection-scoped state handed to the backend.
#[derive(Debug)]
pub struct SessionContext {
    pub connection_id: u32,
    pub database: Option<String>,
    /// Authenticated identity, as decided by the auth plugin.
    pub username: Option<String>,
    pub connect_attrs: HashMap<String, String>,
    pub vars: SystemVariables,
}

impl SessionContext {
    pub fn new(connection_id: u32) -> Self {
        SessionContext {
            connection_id,
            database: None,
            username: None,
            connect_attrs: HashMap::new(),
            vars: SystemVariables::new(),
        }
    }

    /// Reset on COM_CHANGE_USER and COM_RESET_CONNECTION.
    pub fn reset(&mut self) {
        let connection_id = self.connection_id;
        *self = SessionContext::new(connection_id);
    }
}

/// Abstract client session. Implemented by applications; every method has
/// a default so trivial backends stay trivial.
#[async_trait]
pub trait Session: Send {
    /// Process a statement the middleware chain passed through.
    ///
    /// `stmt` is the parsed statement after information-function and
    /// session-variable substitution; `sql` is its rendered text; `attrs`
    /// are the query attributes sent by the client.
    async fn query(
        &mut self,
        stmt: &Statement,
        sql: &str,
        attrs: &HashMap<String, String>,
    ) -> SqlResult<QueryResponse> {
        let _ = (stmt, sql, attrs);
        Ok(QueryResponse::None)
    }

    /// Schema used to answer INFORMATION_SCHEMA and SHOW queries.
    async fn schema(&mut self) -> SqlResult<SchemaMapping> {
        Ok(SchemaMapping::new())
    }

    /// Called when the connection phase completes, and again after a
    /// COM_CHANGE_USER completes.
    async fn init(&mut self, ctx: &SessionContext) -> SqlResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called when the client disconnects.
    async fn close(&mut self) {}

    /// Called on COM_RESET_CONNECTION and COM_CHANGE_USER.
    async fn reset(&mut self) -> SqlResult<()> {
        Ok(())
    }

    /// Called when the client selects a database via USE or COM_INIT_DB.
    async fn use_db(&mut self, db: &str) -> SqlResult<()> {
        let _ = db;
        Ok(())
    }
}

/// A do-nothing session; handy as a default and in tests.
pub struct NullSession;

#[async_trait]
impl Session for NullSession {}

#[cfg(test)]
mod test {
    use mimic_protocol::result::Value;

    use super::*;

    #[tokio::test]
    async fn test_rows_response_infers_types() {
        let response = QueryResponse::Rows(
            vec![vec![Value::Int(1), Value::Str("x".into())]],
            vec!["a".into(), "b".into()],
        );
        let rs = response.into_result_set().await.unwrap().unwrap();
        assert_eq!(2, rs.columns.len());
        assert_eq!("a", rs.columns[0].name);
    }

    #[tokio::test]
    async fn test_none_response() {
        assert!(QueryResponse::None.into_result_set().await.unwrap().is_none());
    }
}
