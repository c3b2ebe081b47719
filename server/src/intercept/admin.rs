//! Textual interception of administrative statements: SET, SHOW, USE,
//! KILL, DESCRIBE, and transaction no-ops. These are recognized before
//! the full parse so that every client dialect quirk ends up in one
//! place.

use once_cell::sync::Lazy;
use regex::Regex;

use mimic_common::charset::CharacterSet;
use mimic_common::column_type::ColumnType;
use mimic_common::err::{ErrorKind, KillKind, ServerError, SqlResult};
use mimic_protocol::result::{ResultColumn, ResultSet, Value};

use crate::eval::like_match;
use crate::schema;

use super::{run_internal_select, QueryContext};

static CMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(SET|SHOW|USE|KILL|DESCRIBE|DESC|BEGIN|START|COMMIT|ROLLBACK)\b\s*(.*)$")
        .unwrap()
});

static START_TRANSACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^TRANSACTION\b").unwrap());

static KILL_ARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:(CONNECTION|QUERY)\s+)?(\d+)$").unwrap());

static DESCRIBE_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^`?(\w+)`?(?:\.`?(\w+)`?)?\s*$").unwrap());

static SET_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^NAMES\s+'?(\w+)'?\s*(?:COLLATE\s+'?(\w+)'?|DEFAULT)?\s*$").unwrap()
});

static SET_CHARACTER_SET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^CHARACTER\s+SET\s+'?(\w+)'?\s*$").unwrap());

static SET_TRANSACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(GLOBAL\s+|SESSION\s+)?TRANSACTION\s+(.+)$").unwrap());

static ISOLATION_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^ISOLATION\s+LEVEL\s+(READ\s+UNCOMMITTED|READ\s+COMMITTED|REPEATABLE\s+READ|SERIALIZABLE)$",
    )
    .unwrap()
});

// Not yet supported: setting a variable to a scalar subquery or to
// another variable.
static SET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?isx)^
        (
            (?P<global>GLOBAL\s+|@@GLOBAL\.)
            |(?P<persist>PERSIST\s+|@@PERSIST\.)
            |(?P<persist_only>PERSIST_ONLY\s+|@@PERSIST_ONLY\.)
            |(?P<session>SESSION\s+|LOCAL\s+|@@SESSION\.|@@LOCAL\.|@@)
            |(?P<user>@)
        )?
        (?P<name>\w+)\s*=\s*(?P<value>.*?)\s*$",
    )
    .unwrap()
});

static SHOW_VARIABLES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:GLOBAL|SESSION)\s+)?VARIABLES\s*(?:LIKE\s+'([^']*)')?\s*$").unwrap()
});

static SHOW_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:GLOBAL|SESSION)\s+)?STATUS\s*(?:LIKE\s+'([^']*)')?\s*$").unwrap()
});

static SHOW_WARNINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:WARNINGS|ERRORS)(?:\s+LIMIT\s+\d+(?:\s*,\s*\d+)?)?\s*$").unwrap()
});

static SHOW_COLUMNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:EXTENDED\s+)?(FULL\s+)?(?:COLUMNS|FIELDS)\s+(?:FROM|IN)\s+(?:`?(\w+)`?\.)?`?(\w+)`?\s*(?:(?:FROM|IN)\s+`?(\w+)`?\s*)?(?:LIKE\s+'([^']*)'\s*)?$",
    )
    .unwrap()
});

static SHOW_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:EXTENDED\s+)?(?:INDEX|INDEXES|KEYS)\s+(?:FROM|IN)\s+(?:`?(\w+)`?\.)?`?(\w+)`?\s*(?:(?:FROM|IN)\s+`?(\w+)`?\s*)?$",
    )
    .unwrap()
});

static SHOW_TABLES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:EXTENDED\s+)?(FULL\s+)?TABLES\s*(?:(?:FROM|IN)\s+`?(\w+)`?\s*)?(?:LIKE\s+'([^']*)'\s*)?$",
    )
    .unwrap()
});

static SHOW_DATABASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:DATABASES|SCHEMAS)\s*(?:LIKE\s+'([^']*)'\s*)?$").unwrap()
});

/// Recognize and execute an admin statement. Returns None when the
/// statement is not one, letting the caller continue down the pipeline.
pub async fn intercept(
    qc: &mut QueryContext<'_>,
    sql: &str,
) -> SqlResult<Option<ResultSet>> {
    let caps = match CMD.captures(sql) {
        Some(caps) => caps,
        None => return Ok(None),
    };
    let cmd = caps[1].to_uppercase();
    let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

    match cmd.as_str() {
        "SET" => set(qc, rest).await.map(Some),
        "SHOW" => show(qc, rest).await.map(Some),
        "USE" => use_db(qc, rest).await.map(Some),
        "KILL" => kill(qc, rest).map(Some),
        "DESCRIBE" | "DESC" => describe(qc, rest).await.map(Some),
        // Transactions are not modeled; acknowledge and move on.
        "BEGIN" | "COMMIT" | "ROLLBACK" => Ok(Some(ResultSet::empty())),
        "START" if START_TRANSACTION.is_match(rest) => Ok(Some(ResultSet::empty())),
        _ => Ok(None),
    }
}

async fn use_db(qc: &mut QueryContext<'_>, rest: &str) -> SqlResult<ResultSet> {
    let db = rest.trim().trim_matches('`');
    if db.is_empty() || db.contains(char::is_whitespace) {
        return Err(ServerError::parse(format!("Invalid USE statement: {}", rest)));
    }
    qc.ctx.database = Some(db.to_string());
    qc.session.use_db(db).await?;
    Ok(ResultSet::empty())
}

fn kill(qc: &mut QueryContext<'_>, rest: &str) -> SqlResult<ResultSet> {
    let caps = KILL_ARG.captures(rest.trim()).ok_or_else(|| {
        ServerError::parse(format!("Invalid KILL argument: {}", rest))
    })?;
    let kind = match caps.get(1) {
        Some(m) if m.as_str().eq_ignore_ascii_case("query") => KillKind::Query,
        _ => KillKind::Connection,
    };
    let connection_id: u32 = caps[2]
        .parse()
        .map_err(|_| ServerError::parse(format!("Invalid KILL argument: {}", rest)))?;
    qc.control.kill(connection_id, kind);
    if connection_id == qc.ctx.connection_id {
        // Killing ourselves takes effect immediately: this command's
        // response is the SESSION_WAS_KILLED error.
        return Err(ServerError::Killed(kind));
    }
    Ok(ResultSet::empty())
}

async fn describe(qc: &mut QueryContext<'_>, rest: &str) -> SqlResult<ResultSet> {
    let caps = DESCRIBE_TARGET.captures(rest).ok_or_else(|| {
        ServerError::parse(format!("Invalid DESCRIBE target: {}", rest))
    })?;
    let (db, table) = match caps.get(2) {
        Some(table) => (Some(caps[1].to_string()), table.as_str().to_string()),
        None => (None, caps[1].to_string()),
    };
    let db = resolve_db(qc, db)?;
    let sql = schema::show_columns_query(&db, &table, None, false);
    run_internal_select(qc, &sql).await
}

fn resolve_db(qc: &QueryContext<'_>, explicit: Option<String>) -> SqlResult<String> {
    explicit
        .or_else(|| qc.ctx.database.clone())
        .ok_or_else(|| {
            ServerError::mysql(ErrorKind::NoDbError, "No database selected")
        })
}

async fn set(qc: &mut QueryContext<'_>, rest: &str) -> SqlResult<ResultSet> {
    if let Some(caps) = SET_NAMES.captures(rest) {
        return set_names(qc, &caps[1], caps.get(2).map(|m| m.as_str()));
    }
    if let Some(caps) = SET_CHARACTER_SET.captures(rest) {
        return set_character_set(qc, &caps[1]);
    }
    if let Some(caps) = SET_TRANSACTION.captures(rest) {
        let scope = caps.get(1).map(|m| m.as_str().trim().to_uppercase());
        if scope.as_deref() == Some("GLOBAL") {
            return Err(ServerError::not_supported(
                "Setting global transaction characteristics not supported",
            ));
        }
        return set_transaction(qc, &caps[2]);
    }

    let mut matched = false;
    for part in split_outside_quotes(rest, ',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(caps) = SET_ASSIGNMENT.captures(part) {
            matched = true;
            apply_assignment(qc, &caps)?;
        }
    }
    if !matched {
        return Err(ServerError::parse("Failed to parse SET command"));
    }
    Ok(ResultSet::empty())
}

fn set_names(
    qc: &mut QueryContext<'_>,
    charset_name: &str,
    collation_name: Option<&str>,
) -> SqlResult<ResultSet> {
    let charset = known_charset(charset_name)?;
    let collation = collation_name
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| charset.default_collation().name().to_string());
    let name = Value::Str(charset.name().to_string());
    let vars = &mut qc.ctx.vars;
    vars.set("character_set_client", name.clone(), false)?;
    vars.set("character_set_connection", name.clone(), false)?;
    vars.set("character_set_results", name, false)?;
    vars.set("collation_connection", Value::Str(collation), false)?;
    Ok(ResultSet::empty())
}

/// SET CHARACTER SET differs from SET NAMES: the connection charset is
/// taken from character_set_database, not from the named charset.
fn set_character_set(qc: &mut QueryContext<'_>, word: &str) -> SqlResult<ResultSet> {
    let vars = &mut qc.ctx.vars;
    let charset = if word.eq_ignore_ascii_case("default") {
        known_charset(&vars.get("character_set_server")?.as_text())?
    } else {
        known_charset(word)?
    };
    let database_charset = vars.get("character_set_database")?;
    let name = Value::Str(charset.name().to_string());
    vars.set("character_set_client", name.clone(), false)?;
    vars.set("character_set_results", name, false)?;
    vars.set("character_set_connection", database_charset, false)?;
    Ok(ResultSet::empty())
}

fn known_charset(name: &str) -> SqlResult<CharacterSet> {
    CharacterSet::from_name(name).ok_or_else(|| {
        ServerError::mysql(
            ErrorKind::WrongValueForVar,
            format!("Unknown character set: '{}'", name),
        )
    })
}

fn set_transaction(qc: &mut QueryContext<'_>, modes: &str) -> SqlResult<ResultSet> {
    for mode in split_outside_quotes(modes, ',') {
        let mode = mode.trim();
        if let Some(caps) = ISOLATION_LEVEL.captures(mode) {
            let level = caps[1].to_uppercase();
            let level = level.split_whitespace().collect::<Vec<_>>().join("-");
            qc.ctx
                .vars
                .set("transaction_isolation", Value::Str(level), false)?;
        } else if mode.eq_ignore_ascii_case("read only") {
            qc.ctx
                .vars
                .set("transaction_read_only", Value::Bool(true), false)?;
        } else if mode.eq_ignore_ascii_case("read write") {
            qc.ctx
                .vars
                .set("transaction_read_only", Value::Bool(false), false)?;
        } else {
            return Err(ServerError::parse(format!(
                "Invalid transaction characteristic: {}",
                mode
            )));
        }
    }
    Ok(ResultSet::empty())
}

fn apply_assignment(qc: &mut QueryContext<'_>, caps: &regex::Captures<'_>) -> SqlResult<()> {
    for forbidden in ["global", "persist", "persist_only", "user"] {
        if caps.name(forbidden).is_some() {
            return Err(ServerError::not_supported(format!(
                "Setting {} variables not supported",
                forbidden
            )));
        }
    }
    let name = &caps["name"];
    let value = parse_set_value(qc, name, &caps["value"])?;
    qc.ctx.vars.set(name, value, false)
}

fn parse_set_value(qc: &QueryContext<'_>, name: &str, raw: &str) -> SqlResult<Value> {
    let lower = raw.to_ascii_lowercase();
    match lower.as_str() {
        "true" | "on" => return Ok(Value::Bool(true)),
        "false" | "off" => return Ok(Value::Bool(false)),
        "null" | "default" => return qc.ctx.vars.default_of(name),
        _ => {}
    }
    if raw.len() >= 2 {
        let first = raw.as_bytes()[0];
        let last = raw.as_bytes()[raw.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return Ok(Value::Str(raw[1..raw.len() - 1].to_string()));
        }
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    Err(ServerError::mysql(
        ErrorKind::WrongValueForVar,
        format!("Unexpected variable value: {}", raw),
    ))
}

async fn show(qc: &mut QueryContext<'_>, rest: &str) -> SqlResult<ResultSet> {
    if let Some(caps) = SHOW_VARIABLES.captures(rest) {
        return show_variables(qc, caps.get(1).map(|m| m.as_str()));
    }
    if SHOW_STATUS.is_match(rest) {
        return Ok(ResultSet::new(
            vec![
                ResultColumn::new("Variable_name", ColumnType::String),
                ResultColumn::new("Value", ColumnType::String),
            ],
            Vec::new(),
        ));
    }
    if SHOW_WARNINGS.is_match(rest) {
        return Ok(ResultSet::new(
            vec![
                ResultColumn::new("Level", ColumnType::String),
                ResultColumn::new("Code", ColumnType::LongLong),
                ResultColumn::new("Message", ColumnType::String),
            ],
            Vec::new(),
        ));
    }
    if let Some(caps) = SHOW_COLUMNS.captures(rest) {
        let full = caps.get(1).is_some();
        let db = caps.get(2).map(|m| m.as_str().to_string());
        let table = caps[3].to_string();
        let expl_db = caps.get(4).map(|m| m.as_str().to_string());
        let like = caps.get(5).map(|m| m.as_str().to_string());
        let db = resolve_db(qc, expl_db.or(db))?;
        let sql = schema::show_columns_query(&db, &table, like.as_deref(), full);
        return run_internal_select(qc, &sql).await;
    }
    if let Some(caps) = SHOW_INDEX.captures(rest) {
        let db = caps.get(1).map(|m| m.as_str().to_string());
        let table = caps[2].to_string();
        let expl_db = caps.get(3).map(|m| m.as_str().to_string());
        let db = resolve_db(qc, expl_db.or(db))?;
        let sql = schema::show_index_query(&db, &table);
        return run_internal_select(qc, &sql).await;
    }
    if let Some(caps) = SHOW_TABLES.captures(rest) {
        let full = caps.get(1).is_some();
        let db = caps.get(2).map(|m| m.as_str().to_string());
        let like = caps.get(3).map(|m| m.as_str().to_string());
        let db = resolve_db(qc, db)?;
        let sql = schema::show_tables_query(&db, like.as_deref(), full);
        return run_internal_select(qc, &sql).await;
    }
    if let Some(caps) = SHOW_DATABASES.captures(rest) {
        let like = caps.get(1).map(|m| m.as_str().to_string());
        let sql = schema::show_databases_query(like.as_deref());
        return run_internal_select(qc, &sql).await;
    }

    Err(ServerError::not_supported(format!(
        "Unsupported SHOW command: {}",
        rest
    )))
}

fn show_variables(qc: &QueryContext<'_>, like: Option<&str>) -> SqlResult<ResultSet> {
    let rows = qc
        .ctx
        .vars
        .list()
        .into_iter()
        .filter(|(name, _)| like.map(|pat| like_match(pat, name)).unwrap_or(true))
        .map(|(name, value)| {
            let rendered = match value {
                Value::Null => Value::Null,
                Value::Bool(true) => Value::Str("ON".into()),
                Value::Bool(false) => Value::Str("OFF".into()),
                other => Value::Str(other.as_text()),
            };
            vec![Value::Str(name), rendered]
        })
        .collect();

    Ok(ResultSet::new(
        vec![
            ResultColumn::new("Variable_name", ColumnType::String),
            ResultColumn::new("Value", ColumnType::String),
        ],
        rows,
    ))
}

/// Split on a separator, ignoring occurrences inside quoted runs.
fn split_outside_quotes(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' || ch == '`' {
                    quote = Some(ch);
                } else if ch == separator {
                    parts.push(&input[start..idx]);
                    start = idx + ch.len_utf8();
                }
            }
        }
    }
    parts.push(&input[start..]);
    parts
}

#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, HashMap};

    use async_trait::async_trait;

    use crate::control::Control;
    use crate::session::{SchemaMapping, Session, SessionContext};

    use super::*;

    struct SchemaSession;

    #[async_trait]
    impl Session for SchemaSession {
        async fn schema(&mut self) -> SqlResult<SchemaMapping> {
            let mut columns = BTreeMap::new();
            columns.insert("a".to_string(), "TEXT".to_string());
            columns.insert("b".to_string(), "TEXT".to_string());
            let mut tables = BTreeMap::new();
            tables.insert("x".to_string(), columns);
            let mut dbs = BTreeMap::new();
            dbs.insert("db".to_string(), tables);
            Ok(dbs)
        }
    }

    async fn run(sql: &str, ctx: &mut SessionContext) -> SqlResult<Option<ResultSet>> {
        let mut session = SchemaSession;
        let control = Control::new(Some(1));
        let attrs = HashMap::new();
        let mut qc = QueryContext::new(ctx, &mut session, &control, &attrs);
        intercept(&mut qc, sql).await
    }

    #[tokio::test]
    async fn test_set_and_select_roundtrip() {
        let mut ctx = SessionContext::new(1);
        let result = run("SET autocommit = OFF", &mut ctx).await.unwrap().unwrap();
        assert!(!result.has_columns());
        assert_eq!(Value::Bool(false), ctx.vars.get("autocommit").unwrap());
    }

    #[tokio::test]
    async fn test_set_multiple_assignments() {
        let mut ctx = SessionContext::new(1);
        run("SET @@wait_timeout = 60, sql_mode = 'STRICT_ALL_TABLES'", &mut ctx)
            .await
            .unwrap();
        assert_eq!(Value::Int(60), ctx.vars.get("wait_timeout").unwrap());
        assert_eq!(
            Value::Str("STRICT_ALL_TABLES".into()),
            ctx.vars.get("sql_mode").unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_global_rejected() {
        let mut ctx = SessionContext::new(1);
        let err = run("SET GLOBAL autocommit = ON", &mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Mysql {
                kind: ErrorKind::NotSupportedYet,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_set_user_variable_rejected() {
        let mut ctx = SessionContext::new(1);
        assert!(run("SET @foo = 1", &mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_set_names() {
        let mut ctx = SessionContext::new(1);
        run("SET NAMES latin1", &mut ctx).await.unwrap();
        assert_eq!(
            Value::Str("latin1".into()),
            ctx.vars.get("character_set_client").unwrap()
        );
        assert_eq!(
            Value::Str("latin1".into()),
            ctx.vars.get("character_set_connection").unwrap()
        );
        assert_eq!(
            Value::Str("latin1_swedish_ci".into()),
            ctx.vars.get("collation_connection").unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_character_set_uses_database_charset() {
        let mut ctx = SessionContext::new(1);
        ctx.vars
            .set("character_set_database", Value::Str("latin1".into()), false)
            .unwrap();
        run("SET CHARACTER SET utf8mb4", &mut ctx).await.unwrap();
        assert_eq!(
            Value::Str("utf8mb4".into()),
            ctx.vars.get("character_set_client").unwrap()
        );
        // asymmetric with SET NAMES: connection charset tracks the database
        assert_eq!(
            Value::Str("latin1".into()),
            ctx.vars.get("character_set_connection").unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_transaction() {
        let mut ctx = SessionContext::new(1);
        run("SET SESSION TRANSACTION ISOLATION LEVEL READ COMMITTED, READ ONLY", &mut ctx)
            .await
            .unwrap();
        assert_eq!(
            Value::Str("READ-COMMITTED".into()),
            ctx.vars.get("transaction_isolation").unwrap()
        );
        assert_eq!(
            Value::Bool(true),
            ctx.vars.get("transaction_read_only").unwrap()
        );
    }

    #[tokio::test]
    async fn test_show_variables_like() {
        let mut ctx = SessionContext::new(1);
        let mut result = run("SHOW VARIABLES LIKE 'auto%'", &mut ctx)
            .await
            .unwrap()
            .unwrap();
        let rows = result.collect_rows().await.unwrap();
        assert_eq!(1, rows.len());
        assert_eq!(Value::Str("autocommit".into()), rows[0][0]);
        assert_eq!(Value::Str("ON".into()), rows[0][1]);
    }

    #[tokio::test]
    async fn test_show_columns() {
        let mut ctx = SessionContext::new(1);
        ctx.database = Some("db".into());
        let mut result = run("SHOW COLUMNS FROM x", &mut ctx).await.unwrap().unwrap();
        assert_eq!("Field", result.columns[0].name);
        let rows = result.collect_rows().await.unwrap();
        assert_eq!(2, rows.len());
        let fields: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
        assert!(fields.contains(&&Value::Str("a".into())));
        assert!(fields.contains(&&Value::Str("b".into())));
        assert_eq!(Value::Str("TEXT".into()), rows[0][1]);
        assert_eq!(Value::Str("YES".into()), rows[0][2]);
        assert_eq!(Value::Null, rows[0][3]);
    }

    #[tokio::test]
    async fn test_show_columns_needs_database() {
        let mut ctx = SessionContext::new(1);
        let err = run("SHOW COLUMNS FROM x", &mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Mysql {
                kind: ErrorKind::NoDbError,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_show_tables_and_databases() {
        let mut ctx = SessionContext::new(1);
        ctx.database = Some("db".into());
        let mut result = run("SHOW TABLES", &mut ctx).await.unwrap().unwrap();
        assert_eq!("Tables_in_db", result.columns[0].name);
        let rows = result.collect_rows().await.unwrap();
        assert!(rows.iter().any(|r| r[0] == Value::Str("x".into())));

        let mut result = run("SHOW DATABASES", &mut ctx).await.unwrap().unwrap();
        let rows = result.collect_rows().await.unwrap();
        assert!(rows.iter().any(|r| r[0] == Value::Str("db".into())));
        assert!(rows.iter().any(|r| r[0] == Value::Str("mysql".into())));
    }

    #[tokio::test]
    async fn test_show_index_empty() {
        let mut ctx = SessionContext::new(1);
        ctx.database = Some("db".into());
        let mut result = run("SHOW INDEX FROM x", &mut ctx).await.unwrap().unwrap();
        assert_eq!(15, result.columns.len());
        assert!(result.collect_rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_use_statement() {
        let mut ctx = SessionContext::new(1);
        run("USE `shop`", &mut ctx).await.unwrap();
        assert_eq!(Some("shop".to_string()), ctx.database);
    }

    #[tokio::test]
    async fn test_kill_parse_errors() {
        let mut ctx = SessionContext::new(1);
        assert!(run("KILL abc", &mut ctx).await.is_err());
        assert!(run("KILL QUERY 12", &mut ctx).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transactions_are_noops() {
        let mut ctx = SessionContext::new(1);
        for sql in ["BEGIN", "COMMIT", "ROLLBACK", "START TRANSACTION"] {
            let result = run(sql, &mut ctx).await.unwrap().unwrap();
            assert!(!result.has_columns());
        }
    }

    #[tokio::test]
    async fn test_non_admin_passes_through() {
        let mut ctx = SessionContext::new(1);
        assert!(run("SELECT 1", &mut ctx).await.unwrap().is_none());
    }

    #[test]
    fn test_split_outside_quotes() {
        assert_eq!(
            vec!["a = 'x,y'", " b = 2"],
            split_outside_quotes("a = 'x,y', b = 2", ',')
        );
    }
}
