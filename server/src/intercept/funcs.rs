//! Information-function and `@@variable` substitution. Replacements
//! happen on the AST; when the replaced expression is a top-level SELECT
//! projection it is wrapped in an alias carrying the original source
//! text, so clients see the column name they asked for.

use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions_mut, Expr, Ident, SelectItem, SetExpr, Statement, Value as AstValue,
};

use mimic_common::err::{ServerError, SqlResult};
use mimic_protocol::result::Value;

use super::QueryContext;

pub fn substitute(statement: &mut Statement, qc: &QueryContext<'_>) -> SqlResult<()> {
    // Alias pass over the top-level projection.
    if let Statement::Query(query) = statement {
        if let SetExpr::Select(select) = query.body.as_mut() {
            for item in select.projection.iter_mut() {
                if let SelectItem::UnnamedExpr(expr) = item {
                    let original = expr.to_string();
                    if substitute_expr(expr, qc)? {
                        let expr = std::mem::replace(expr, Expr::Value(AstValue::Null));
                        *item = SelectItem::ExprWithAlias {
                            expr,
                            alias: Ident::with_quote('`', original),
                        };
                    }
                }
            }
        }
    }

    // Everything else (WHERE clauses, aliased projections, subqueries).
    let mut failure: Option<ServerError> = None;
    let _ = visit_expressions_mut(statement, |expr| {
        match replace_node(expr, qc) {
            Ok(_) => ControlFlow::Continue(()),
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Substitute within one expression tree; reports whether anything
/// changed.
fn substitute_expr(expr: &mut Expr, qc: &QueryContext<'_>) -> SqlResult<bool> {
    let mut changed = false;
    let mut failure: Option<ServerError> = None;
    let _ = visit_expressions_mut(expr, |node| {
        match replace_node(node, qc) {
            Ok(did) => {
                changed |= did;
                ControlFlow::Continue(())
            }
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(changed),
    }
}

fn replace_node(expr: &mut Expr, qc: &QueryContext<'_>) -> SqlResult<bool> {
    let replacement = match expr {
        Expr::Identifier(ident) => {
            if let Some(var) = ident.value.strip_prefix("@@") {
                Some(session_var(qc, var)?)
            } else {
                keyword_function(&ident.value, qc)
            }
        }
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [scope, name] if scope.value.starts_with("@@") => Some(session_var(qc, &name.value)?),
            _ => None,
        },
        Expr::Function(function) => {
            if !function.args.is_empty() {
                None
            } else {
                let name = function
                    .name
                    .0
                    .last()
                    .map(|i| i.value.to_uppercase())
                    .unwrap_or_default();
                info_function(&name, qc)
            }
        }
        _ => None,
    };

    match replacement {
        Some(value) => {
            *expr = value_to_expr(value);
            Ok(true)
        }
        None => Ok(false),
    }
}

fn session_var(qc: &QueryContext<'_>, name: &str) -> SqlResult<Value> {
    qc.ctx.vars.get(name)
}

/// Functions that some parsers surface as bare identifiers because they
/// are callable without parentheses.
fn keyword_function(name: &str, qc: &QueryContext<'_>) -> Option<Value> {
    let upper = name.to_uppercase();
    match upper.as_str() {
        "CURRENT_USER" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME" | "LOCALTIME"
        | "LOCALTIMESTAMP" => info_function(&upper, qc),
        _ => None,
    }
}

fn info_function(name: &str, qc: &QueryContext<'_>) -> Option<Value> {
    match name {
        "CONNECTION_ID" => Some(Value::Int(qc.ctx.connection_id as i64)),
        "USER" | "SESSION_USER" | "SYSTEM_USER" => Some(
            qc.ctx
                .vars
                .external_user()
                .map(Value::Str)
                .unwrap_or(Value::Null),
        ),
        "CURRENT_USER" => Some(
            qc.ctx
                .username
                .clone()
                .map(Value::Str)
                .unwrap_or(Value::Null),
        ),
        "VERSION" => Some(Value::Str(qc.ctx.vars.mysql_version())),
        "DATABASE" | "SCHEMA" => Some(
            qc.ctx
                .database
                .clone()
                .map(Value::Str)
                .unwrap_or(Value::Null),
        ),
        "NOW" | "CURRENT_TIMESTAMP" | "LOCALTIME" | "LOCALTIMESTAMP" => {
            Some(Value::Str(qc.now.format("%Y-%m-%d %H:%M:%S").to_string()))
        }
        "CURDATE" | "CURRENT_DATE" => Some(Value::Str(qc.now.format("%Y-%m-%d").to_string())),
        "CURTIME" | "CURRENT_TIME" => Some(Value::Str(qc.now.format("%H:%M:%S").to_string())),
        _ => None,
    }
}

fn value_to_expr(value: Value) -> Expr {
    match value {
        Value::Null => Expr::Value(AstValue::Null),
        Value::Bool(b) => Expr::Value(AstValue::Boolean(b)),
        Value::Int(i) => Expr::Value(AstValue::Number(i.to_string(), false)),
        Value::UInt(u) => Expr::Value(AstValue::Number(u.to_string(), false)),
        Value::Float(f) => Expr::Value(AstValue::Number(f.to_string(), false)),
        other => Expr::Value(AstValue::SingleQuotedString(other.as_text())),
    }
}
