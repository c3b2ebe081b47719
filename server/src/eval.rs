//! A small SELECT evaluator for the synthetic information-schema tables
//! and for table-free "static" SELECTs (driver bootstrap queries).
//!
//! It understands single-table FROM clauses, WHERE with comparison /
//! boolean / LIKE / IN / IS NULL predicates, aliases, ORDER BY, and
//! LIMIT. COLLATE wrappers are stripped since collations are not
//! modeled.

use std::cmp::Ordering;

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, OrderByExpr, Query, Select, SelectItem, SetExpr,
    UnaryOperator, Value as AstValue,
};

use mimic_common::err::{ServerError, SqlResult};
use mimic_protocol::result::{infer, ResultSet, Row, Value};

use crate::schema::{InfoSchema, Table};

struct RowContext<'a> {
    table: &'a Table,
    row: &'a Row,
}

impl RowContext<'_> {
    fn column(&self, name: &str) -> SqlResult<Value> {
        match self.table.column_index(name) {
            Some(idx) => Ok(self.row.get(idx).cloned().unwrap_or(Value::Null)),
            None => Err(ServerError::parse(format!("Unknown column '{}'", name))),
        }
    }
}

fn eval_expr(expr: &Expr, ctx: Option<&RowContext>) -> SqlResult<Value> {
    match expr {
        Expr::Value(value) => eval_literal(value),
        Expr::Identifier(ident) => match ctx {
            Some(ctx) => ctx.column(&ident.value),
            None => Err(ServerError::parse(format!(
                "Unknown column '{}' in field list",
                ident.value
            ))),
        },
        Expr::CompoundIdentifier(parts) => match (ctx, parts.last()) {
            (Some(ctx), Some(last)) => ctx.column(&last.value),
            _ => Err(ServerError::parse("unresolvable column reference")),
        },
        Expr::Nested(inner) => eval_expr(inner, ctx),
        // The embedded evaluator does not implement collations.
        Expr::Collate { expr, .. } => eval_expr(expr, ctx),
        Expr::UnaryOp { op, expr } => {
            let value = eval_expr(expr, ctx)?;
            match op {
                UnaryOperator::Plus => Ok(value),
                UnaryOperator::Minus => match value {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(ServerError::parse(format!("cannot negate {:?}", other))),
                },
                UnaryOperator::Not => Ok(Value::Bool(!truthy(&value))),
                _ => Err(ServerError::not_supported(format!(
                    "unsupported operator: {}",
                    op
                ))),
            }
        }
        Expr::IsNull(inner) => Ok(Value::Bool(eval_expr(inner, ctx)?.is_null())),
        Expr::IsNotNull(inner) => Ok(Value::Bool(!eval_expr(inner, ctx)?.is_null())),
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval_expr(expr, ctx)?;
            let mut found = false;
            for item in list {
                if value_eq(&needle, &eval_expr(item, ctx)?) {
                    found = true;
                    break;
                }
            }
            Ok(Value::Bool(found != *negated))
        }
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let haystack = eval_expr(expr, ctx)?;
            let pattern = eval_expr(pattern, ctx)?;
            if haystack.is_null() || pattern.is_null() {
                return Ok(Value::Bool(false));
            }
            let matched = like_match(&pattern.as_text(), &haystack.as_text());
            Ok(Value::Bool(matched != *negated))
        }
        Expr::BinaryOp { left, op, right } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            eval_binary(&l, op, &r)
        }
        other => Err(ServerError::not_supported(format!(
            "unsupported expression: {}",
            other
        ))),
    }
}

fn eval_literal(value: &AstValue) -> SqlResult<Value> {
    match value {
        AstValue::Number(text, _) => {
            if let Ok(i) = text.parse::<i64>() {
                Ok(Value::Int(i))
            } else {
                text.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ServerError::parse(format!("bad numeric literal: {}", text)))
            }
        }
        AstValue::SingleQuotedString(s) | AstValue::DoubleQuotedString(s) => {
            Ok(Value::Str(s.clone()))
        }
        AstValue::Boolean(b) => Ok(Value::Bool(*b)),
        AstValue::Null => Ok(Value::Null),
        other => Err(ServerError::not_supported(format!(
            "unsupported literal: {}",
            other
        ))),
    }
}

fn eval_binary(l: &Value, op: &BinaryOperator, r: &Value) -> SqlResult<Value> {
    match op {
        BinaryOperator::And => Ok(Value::Bool(truthy(l) && truthy(r))),
        BinaryOperator::Or => Ok(Value::Bool(truthy(l) || truthy(r))),
        BinaryOperator::Eq => Ok(Value::Bool(!l.is_null() && !r.is_null() && value_eq(l, r))),
        BinaryOperator::NotEq => Ok(Value::Bool(!l.is_null() && !r.is_null() && !value_eq(l, r))),
        BinaryOperator::Gt => compare(l, r).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOperator::Lt => compare(l, r).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOperator::GtEq => compare(l, r).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOperator::LtEq => compare(l, r).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => arithmetic(l, op, r),
        other => Err(ServerError::not_supported(format!(
            "unsupported operator: {}",
            other
        ))),
    }
}

fn arithmetic(l: &Value, op: &BinaryOperator, r: &Value) -> SqlResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    match (l.as_i64(), r.as_i64(), op) {
        (Some(a), Some(b), BinaryOperator::Plus) => return Ok(Value::Int(a + b)),
        (Some(a), Some(b), BinaryOperator::Minus) => return Ok(Value::Int(a - b)),
        (Some(a), Some(b), BinaryOperator::Multiply) => return Ok(Value::Int(a * b)),
        _ => {}
    }
    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ServerError::parse(format!(
                "non-numeric operands for {}",
                op
            )))
        }
    };
    let out = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => {
            if b == 0.0 {
                return Ok(Value::Null);
            }
            a / b
        }
        _ => unreachable!(),
    };
    Ok(Value::Float(out))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::UInt(u) => *u != 0,
        Value::Float(f) => *f != 0.0,
        other => other.as_i64().map(|i| i != 0).unwrap_or(false),
    }
}

/// Loose equality: numeric when both sides are numeric, otherwise a
/// case-insensitive string comparison (the utf8 `_ci` default).
fn value_eq(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => l.as_text().eq_ignore_ascii_case(&r.as_text()),
    }
}

fn compare(l: &Value, r: &Value) -> SqlResult<Ordering> {
    if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
        return Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal));
    }
    Ok(l.as_text()
        .to_lowercase()
        .cmp(&r.as_text().to_lowercase()))
}

/// SQL LIKE with `%` and `_`, case-insensitive.
pub fn like_match(pattern: &str, input: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex::Regex::new(&regex)
        .map(|re| re.is_match(input))
        .unwrap_or(false)
}

/// The single plain SELECT inside a query, if that is what it is.
fn plain_select(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(select.as_ref()),
        _ => None,
    }
}

fn has_aggregation(select: &Select) -> bool {
    let grouped = !matches!(&select.group_by, GroupByExpr::Expressions(v) if v.is_empty());
    grouped || select.having.is_some() || select.distinct.is_some()
}

/// Evaluate a table-free SELECT. Returns None when the statement is not
/// in the supported shape so the caller can fall through to the backend.
pub fn eval_static_select(query: &Query) -> SqlResult<Option<ResultSet>> {
    let select = match plain_select(query) {
        Some(select) => select,
        None => return Ok(None),
    };
    if !select.from.is_empty() || select.selection.is_some() || has_aggregation(select) {
        return Ok(None);
    }

    let mut names = Vec::new();
    let mut row = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                match eval_expr(expr, None) {
                    Ok(value) => {
                        names.push(expr.to_string());
                        row.push(value);
                    }
                    // Not evaluable without a backend; let it through.
                    Err(_) => return Ok(None),
                }
            }
            SelectItem::ExprWithAlias { expr, alias } => match eval_expr(expr, None) {
                Ok(value) => {
                    names.push(alias.value.clone());
                    row.push(value);
                }
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        }
    }

    let limit = eval_limit(query)?;
    let rows = if limit == Some(0) { vec![] } else { vec![row] };
    Ok(Some(infer::infer_from_rows(names, rows)))
}

fn eval_limit(query: &Query) -> SqlResult<Option<usize>> {
    match &query.limit {
        Some(expr) => {
            let value = eval_expr(expr, None)?;
            Ok(value.as_i64().map(|i| i.max(0) as usize))
        }
        None => Ok(None),
    }
}

/// Evaluate a SELECT against one synthetic table.
pub fn eval_query_on_table(query: &Query, table: &Table) -> SqlResult<ResultSet> {
    let select = plain_select(query).ok_or_else(|| {
        ServerError::not_supported("only plain SELECT is supported against system tables")
    })?;
    if has_aggregation(select) {
        return Err(ServerError::not_supported(
            "aggregation is not supported against system tables",
        ));
    }

    // Filter.
    let mut kept: Vec<&Row> = Vec::new();
    for row in &table.rows {
        let ctx = RowContext { table, row };
        let keep = match &select.selection {
            Some(predicate) => truthy(&eval_expr(predicate, Some(&ctx))?),
            None => true,
        };
        if keep {
            kept.push(row);
        }
    }

    // Order.
    if !query.order_by.is_empty() {
        let mut keyed: Vec<(Vec<Value>, &Row)> = Vec::with_capacity(kept.len());
        for row in kept {
            let ctx = RowContext { table, row };
            let mut key = Vec::new();
            for OrderByExpr { expr, .. } in &query.order_by {
                key.push(eval_expr(expr, Some(&ctx))?);
            }
            keyed.push((key, row));
        }
        let directions: Vec<bool> = query
            .order_by
            .iter()
            .map(|o| o.asc.unwrap_or(true))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (ka, kb)) in a.iter().zip(b.iter()).enumerate() {
                let ord = order_values(ka, kb);
                if ord != Ordering::Equal {
                    return if directions.get(i).copied().unwrap_or(true) {
                        ord
                    } else {
                        ord.reverse()
                    };
                }
            }
            Ordering::Equal
        });
        kept = keyed.into_iter().map(|(_, row)| row).collect();
    }

    // Project.
    let mut names: Vec<String> = Vec::new();
    let mut first = true;
    let mut rows: Vec<Row> = Vec::new();
    for &row in &kept {
        let ctx = RowContext { table, row };
        let mut out = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) => {
                    if first {
                        names.extend(table.columns.iter().cloned());
                    }
                    out.extend(row.iter().cloned());
                }
                SelectItem::UnnamedExpr(expr) => {
                    if first {
                        names.push(projection_name(expr));
                    }
                    out.push(eval_expr(expr, Some(&ctx))?);
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    if first {
                        names.push(alias.value.clone());
                    }
                    out.push(eval_expr(expr, Some(&ctx))?);
                }
                SelectItem::QualifiedWildcard(..) => {
                    if first {
                        names.extend(table.columns.iter().cloned());
                    }
                    out.extend(row.iter().cloned());
                }
            }
        }
        first = false;
        rows.push(out);
    }
    if first {
        // No rows: the header still needs names.
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {
                    names.extend(table.columns.iter().cloned())
                }
                SelectItem::UnnamedExpr(expr) => names.push(projection_name(expr)),
                SelectItem::ExprWithAlias { alias, .. } => names.push(alias.value.clone()),
            }
        }
    }

    if let Some(limit) = eval_limit(query)? {
        rows.truncate(limit);
    }

    Ok(infer::infer_from_rows(names, rows))
}

fn projection_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|p| p.value.clone())
            .unwrap_or_else(|| expr.to_string()),
        other => other.to_string(),
    }
}

fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Resolve the single table a SELECT reads from, as (db, table) pairs.
pub fn eval_query_on_schema(
    query: &Query,
    schema: &InfoSchema,
    default_db: Option<&str>,
) -> SqlResult<ResultSet> {
    use sqlparser::ast::TableFactor;

    let select = plain_select(query).ok_or_else(|| {
        ServerError::not_supported("only plain SELECT is supported against system tables")
    })?;
    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(ServerError::not_supported(
            "joins are not supported against system tables",
        ));
    }

    let name = match &select.from[0].relation {
        TableFactor::Table { name, .. } => name,
        _ => {
            return Err(ServerError::not_supported(
                "subqueries are not supported against system tables",
            ))
        }
    };
    let parts: Vec<String> = name.0.iter().map(|i| i.value.clone()).collect();
    let (db, table_name) = match parts.as_slice() {
        [table] => (
            default_db
                .map(|d| d.to_string())
                .unwrap_or_else(|| "information_schema".to_string()),
            table.clone(),
        ),
        [db, table] => (db.clone(), table.clone()),
        _ => {
            return Err(ServerError::parse(format!(
                "bad table reference: {}",
                name
            )))
        }
    };

    let table = schema.table(&db, &table_name).ok_or_else(|| {
        ServerError::parse(format!("Table '{}.{}' doesn't exist", db, table_name))
    })?;
    eval_query_on_table(query, table)
}

#[cfg(test)]
mod test {
    use sqlparser::ast::Statement;
    use sqlparser::dialect::MySqlDialect;
    use sqlparser::parser::Parser;

    use super::*;

    fn parse_query(sql: &str) -> Query {
        let mut statements = Parser::parse_sql(&MySqlDialect {}, sql).unwrap();
        match statements.remove(0) {
            Statement::Query(q) => *q,
            other => panic!("not a query: {:?}", other),
        }
    }

    fn sample_table() -> Table {
        Table {
            columns: vec!["name".into(), "score".into()],
            rows: vec![
                vec![Value::Str("alpha".into()), Value::Int(3)],
                vec![Value::Str("beta".into()), Value::Int(1)],
                vec![Value::Str("gamma".into()), Value::Null],
            ],
        }
    }

    #[tokio::test]
    async fn test_static_select() {
        let query = parse_query("SELECT 'mysql-mimic' AS `@@version_comment` LIMIT 1");
        let mut rs = eval_static_select(&query).unwrap().unwrap();
        assert_eq!("@@version_comment", rs.columns[0].name);
        let rows = rs.collect_rows().await.unwrap();
        assert_eq!(vec![vec![Value::Str("mysql-mimic".into())]], rows);
    }

    #[tokio::test]
    async fn test_static_select_arithmetic() {
        let query = parse_query("SELECT 1 + 2");
        let mut rs = eval_static_select(&query).unwrap().unwrap();
        let rows = rs.collect_rows().await.unwrap();
        assert_eq!(vec![vec![Value::Int(3)]], rows);
    }

    #[test]
    fn test_static_select_rejects_tables() {
        let query = parse_query("SELECT a FROM t");
        assert!(eval_static_select(&query).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_where_and_order() {
        let table = sample_table();
        let query = parse_query("SELECT name FROM t WHERE score >= 1 ORDER BY score DESC");
        let mut rs = eval_query_on_table(&query, &table).unwrap();
        let rows = rs.collect_rows().await.unwrap();
        assert_eq!(
            vec![
                vec![Value::Str("alpha".into())],
                vec![Value::Str("beta".into())],
            ],
            rows
        );
    }

    #[tokio::test]
    async fn test_like_and_null_predicates() {
        let table = sample_table();
        let query = parse_query("SELECT name FROM t WHERE name LIKE 'a%' OR score IS NULL");
        let mut rs = eval_query_on_table(&query, &table).unwrap();
        let rows = rs.collect_rows().await.unwrap();
        assert_eq!(2, rows.len());
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("auto%", "autocommit"));
        assert!(like_match("a_to%", "autocommit"));
        assert!(!like_match("auto", "autocommit"));
        assert!(like_match("AUTO%", "autocommit"));
    }

    #[tokio::test]
    async fn test_wildcard_projection() {
        let table = sample_table();
        let query = parse_query("SELECT * FROM t LIMIT 2");
        let mut rs = eval_query_on_table(&query, &table).unwrap();
        assert_eq!(vec!["name".to_string(), "score".to_string()], {
            let names: Vec<String> = rs.columns.iter().map(|c| c.name.clone()).collect();
            names
        });
        assert_eq!(2, rs.collect_rows().await.unwrap().len());
    }

    #[tokio::test]
    async fn test_collate_stripped() {
        let table = sample_table();
        let query = parse_query("SELECT name FROM t WHERE name = 'ALPHA' COLLATE utf8mb4_bin");
        let mut rs = eval_query_on_table(&query, &table).unwrap();
        assert_eq!(1, rs.collect_rows().await.unwrap().len());
    }
}
