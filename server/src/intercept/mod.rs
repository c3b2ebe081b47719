//! The statement interceptor chain. Incoming SQL is split into
//! statements; each statement passes through an ordered pipeline (SET_VAR
//! hints, admin statements, information-function substitution, static
//! SELECT, INFORMATION_SCHEMA routing) before falling through to the
//! backend.

pub mod admin;
pub mod funcs;
pub mod hints;

use std::collections::HashMap;
use std::ops::ControlFlow;

use chrono::{DateTime, FixedOffset, Utc};
use sqlparser::ast::{visit_relations, ObjectName, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use mimic_common::err::{ErrorKind, ServerError, SqlResult};
use mimic_protocol::result::ResultSet;

use crate::control::Control;
use crate::eval;
use crate::schema::InfoSchema;
use crate::session::{Session, SessionContext};

/// Shared context threaded through the pipeline for one client command.
pub struct QueryContext<'a> {
    pub ctx: &'a mut SessionContext,
    pub session: &'a mut dyn Session,
    pub control: &'a Control,
    pub attrs: &'a HashMap<String, String>,
    /// The "current time", latched once per statement so repeated NOW()
    /// calls inside one statement agree.
    pub now: DateTime<FixedOffset>,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        ctx: &'a mut SessionContext,
        session: &'a mut dyn Session,
        control: &'a Control,
        attrs: &'a HashMap<String, String>,
    ) -> Self {
        let tz = ctx.vars.time_zone();
        QueryContext {
            ctx,
            session,
            control,
            attrs,
            now: Utc::now().with_timezone(&tz),
        }
    }

    fn latch_now(&mut self) {
        let tz = self.ctx.vars.time_zone();
        self.now = Utc::now().with_timezone(&tz);
    }
}

/// Entry point for COM_QUERY and COM_STMT_EXECUTE. Returns the result of
/// the last statement; `None` and column-less results are answered with a
/// plain OK.
pub async fn handle_query(
    qc: &mut QueryContext<'_>,
    sql: &str,
) -> SqlResult<Option<ResultSet>> {
    let statements = split_statements(sql);
    if statements.is_empty() {
        return Err(ServerError::mysql(ErrorKind::EmptyQuery, "Query was empty"));
    }

    let mut last = None;
    for stmt_sql in statements {
        last = handle_statement(qc, stmt_sql).await?;
    }
    Ok(last)
}

async fn handle_statement(
    qc: &mut QueryContext<'_>,
    sql: &str,
) -> SqlResult<Option<ResultSet>> {
    qc.latch_now();

    let hints = hints::extract(sql)?;
    let saved = hints::apply(&mut qc.ctx.vars, &hints)?;
    let result = dispatch_statement(qc, sql).await;
    hints::restore(&mut qc.ctx.vars, saved);
    result
}

async fn dispatch_statement(
    qc: &mut QueryContext<'_>,
    sql: &str,
) -> SqlResult<Option<ResultSet>> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(ServerError::mysql(ErrorKind::EmptyQuery, "Query was empty"));
    }

    // Admin statements are recognized textually, before the full parse.
    if let Some(result) = admin::intercept(qc, trimmed).await? {
        return Ok(Some(result));
    }

    let mut statement = parse_one(trimmed)?;
    funcs::substitute(&mut statement, qc)?;

    if let Statement::Query(query) = &statement {
        if let Some(result) = eval::eval_static_select(query)? {
            return Ok(Some(result));
        }
    }

    let relations = table_relations(&statement);
    if !relations.is_empty() && all_internal(&relations, qc.ctx.database.as_deref()) {
        return Ok(Some(query_info_schema(qc, &statement).await?));
    }

    let rewritten = statement.to_string();
    let response = qc.session.query(&statement, &rewritten, qc.attrs).await?;
    response.into_result_set().await
}

pub(crate) fn parse_one(sql: &str) -> SqlResult<Statement> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)
        .map_err(|e| ServerError::parse(e.to_string()))?;
    if statements.len() != 1 {
        return Err(ServerError::parse(format!(
            "expected a single statement, found {}",
            statements.len()
        )));
    }
    Ok(statements.remove(0))
}

fn table_relations(statement: &Statement) -> Vec<ObjectName> {
    let mut relations = Vec::new();
    let _ = visit_relations(statement, |relation| {
        relations.push(relation.clone());
        ControlFlow::<()>::Continue(())
    });
    relations
}

fn all_internal(relations: &[ObjectName], current_db: Option<&str>) -> bool {
    relations.iter().all(|name| {
        let parts = &name.0;
        match parts.len() {
            1 => current_db.map(InfoSchema::is_internal_db).unwrap_or(false),
            2 => InfoSchema::is_internal_db(&parts[0].value),
            _ => false,
        }
    })
}

/// Execute a statement against the synthetic tables built from the
/// backend-supplied schema. The backend `query` is never called for
/// these.
pub(crate) async fn query_info_schema(
    qc: &mut QueryContext<'_>,
    statement: &Statement,
) -> SqlResult<ResultSet> {
    let query = match statement {
        Statement::Query(query) => query,
        _ => {
            return Err(ServerError::not_supported(
                "only SELECT is supported against system tables",
            ))
        }
    };
    let mapping = qc.session.schema().await?;
    let schema = InfoSchema::from_mapping(&mapping);
    eval::eval_query_on_schema(query, &schema, qc.ctx.database.as_deref())
}

/// Evaluate internally-generated SQL (SHOW translations) against the
/// synthetic schema.
pub(crate) async fn run_internal_select(
    qc: &mut QueryContext<'_>,
    sql: &str,
) -> SqlResult<ResultSet> {
    let statement = parse_one(sql)?;
    query_info_schema(qc, &statement).await
}

/// Split a query payload into statements on semicolons that sit outside
/// quoted runs and comments.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None => match b {
                b'\'' | b'"' | b'`' => {
                    quote = Some(b);
                    i += 1;
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                b'#' => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i += 2;
                    while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/'))
                    {
                        i += 1;
                    }
                    i = (i + 2).min(bytes.len());
                }
                b';' => {
                    let segment = sql[start..i].trim();
                    if !segment.is_empty() {
                        statements.push(segment);
                    }
                    start = i + 1;
                    i += 1;
                }
                _ => i += 1,
            },
        }
    }

    let tail = sql[start..].trim();
    if !tail.is_empty() {
        statements.push(tail);
    }
    statements
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_statements() {
        assert_eq!(
            vec!["SELECT 1", "SELECT 2"],
            split_statements("SELECT 1; SELECT 2;")
        );
        assert_eq!(
            vec!["SELECT ';'"],
            split_statements("SELECT ';'")
        );
        assert_eq!(
            vec!["SELECT 1 -- ; comment", "SELECT 2"],
            split_statements("SELECT 1 -- ; comment\n; SELECT 2")
        );
        assert!(split_statements("   ").is_empty());
    }

    #[test]
    fn test_all_internal() {
        let rels = vec![ObjectName(vec!["information_schema".into(), "tables".into()])];
        assert!(all_internal(&rels, None));

        let rels = vec![ObjectName(vec!["tables".into()])];
        assert!(all_internal(&rels, Some("information_schema")));
        assert!(!all_internal(&rels, Some("shop")));
        assert!(!all_internal(&rels, None));

        let mixed = vec![
            ObjectName(vec!["mysql".into(), "user".into()]),
            ObjectName(vec!["shop".into(), "orders".into()]),
        ];
        assert!(!all_internal(&mixed, None));
    }
}
