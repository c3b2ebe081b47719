//! Typed store of system variables with session scope.

use std::collections::HashMap;

use chrono::FixedOffset;
use once_cell::sync::Lazy;

use mimic_common::charset::CharacterSet;
use mimic_common::err::{ErrorKind, ServerError, SqlResult};
use mimic_protocol::result::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Bool,
    Int,
    Float,
    Str,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub kind: VarKind,
    pub default: Value,
    /// Non-dynamic variables refuse SET unless forced internally.
    pub dynamic: bool,
}

impl VarDef {
    fn new(kind: VarKind, default: Value, dynamic: bool) -> Self {
        VarDef {
            kind,
            default,
            dynamic,
        }
    }
}

static SCHEMA: Lazy<HashMap<&'static str, VarDef>> = Lazy::new(|| {
    use VarKind::*;
    let mut m = HashMap::new();
    m.insert("autocommit", VarDef::new(Bool, Value::Bool(true), true));
    m.insert(
        "character_set_client",
        VarDef::new(Str, Value::Str("utf8mb4".into()), true),
    );
    m.insert(
        "character_set_connection",
        VarDef::new(Str, Value::Str("utf8mb4".into()), true),
    );
    m.insert(
        "character_set_database",
        VarDef::new(Str, Value::Str("utf8mb4".into()), true),
    );
    m.insert(
        "character_set_results",
        VarDef::new(Str, Value::Str("utf8mb4".into()), true),
    );
    m.insert(
        "character_set_server",
        VarDef::new(Str, Value::Str("utf8mb4".into()), true),
    );
    m.insert(
        "collation_connection",
        VarDef::new(Str, Value::Str("utf8mb4_general_ci".into()), true),
    );
    m.insert(
        "collation_database",
        VarDef::new(Str, Value::Str("utf8mb4_general_ci".into()), true),
    );
    m.insert(
        "collation_server",
        VarDef::new(Str, Value::Str("utf8mb4_general_ci".into()), true),
    );
    m.insert(
        "default_storage_engine",
        VarDef::new(Str, Value::Str("InnoDB".into()), true),
    );
    m.insert("external_user", VarDef::new(Str, Value::Null, false));
    m.insert("init_connect", VarDef::new(Str, Value::Str(String::new()), true));
    m.insert(
        "interactive_timeout",
        VarDef::new(Int, Value::Int(28800), true),
    );
    m.insert(
        "lower_case_table_names",
        VarDef::new(Int, Value::Int(0), false),
    );
    m.insert(
        "max_allowed_packet",
        VarDef::new(Int, Value::Int(67108864), true),
    );
    m.insert("max_execution_time", VarDef::new(Int, Value::Int(0), true));
    m.insert(
        "net_buffer_length",
        VarDef::new(Int, Value::Int(16384), true),
    );
    m.insert("sql_auto_is_null", VarDef::new(Bool, Value::Bool(false), true));
    m.insert(
        "sql_mode",
        VarDef::new(
            Str,
            Value::Str(
                "ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,\
                 ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION"
                    .into(),
            ),
            true,
        ),
    );
    m.insert("sql_select_limit", VarDef::new(Int, Value::Null, true));
    m.insert("time_zone", VarDef::new(Str, Value::Str("UTC".into()), true));
    m.insert(
        "transaction_isolation",
        VarDef::new(Str, Value::Str("REPEATABLE-READ".into()), true),
    );
    m.insert(
        "transaction_read_only",
        VarDef::new(Bool, Value::Bool(false), true),
    );
    m.insert("version", VarDef::new(Str, Value::Str("8.0.29".into()), false));
    m.insert(
        "version_comment",
        VarDef::new(Str, Value::Str("mysql-mimic".into()), false),
    );
    m.insert("wait_timeout", VarDef::new(Int, Value::Int(28800), true));
    m
});

/// Session variable store. `get` falls back to the schema default; names
/// are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct SystemVariables {
    values: HashMap<String, Value>,
}

impl SystemVariables {
    pub fn new() -> Self {
        SystemVariables::default()
    }

    pub fn contains(name: &str) -> bool {
        SCHEMA.contains_key(name.to_ascii_lowercase().as_str())
    }

    fn def(name: &str) -> SqlResult<&'static VarDef> {
        SCHEMA.get(name).ok_or_else(|| {
            ServerError::mysql(
                ErrorKind::UnknownSystemVariable,
                format!("Unknown system variable '{}'", name),
            )
        })
    }

    pub fn get(&self, name: &str) -> SqlResult<Value> {
        let name = name.to_ascii_lowercase();
        let def = Self::def(&name)?;
        Ok(self.values.get(&name).cloned().unwrap_or_else(|| def.default.clone()))
    }

    pub fn default_of(&self, name: &str) -> SqlResult<Value> {
        Ok(Self::def(&name.to_ascii_lowercase())?.default.clone())
    }

    pub fn set(&mut self, name: &str, value: Value, force: bool) -> SqlResult<()> {
        let name = name.to_ascii_lowercase();
        let def = Self::def(&name)?;
        if !def.dynamic && !force {
            return Err(ServerError::mysql(
                ErrorKind::WrongValueForVar,
                format!("Variable '{}' is read only", name),
            ));
        }
        let coerced = coerce(def.kind, value).map_err(|v| {
            ServerError::mysql(
                ErrorKind::WrongValueForVar,
                format!("Unexpected value for variable '{}': {:?}", name, v),
            )
        })?;
        self.values.insert(name, coerced);
        Ok(())
    }

    /// All variables in name order, resolved to their current values.
    pub fn list(&self) -> Vec<(String, Value)> {
        let mut names: Vec<&&str> = SCHEMA.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let value = self
                    .values
                    .get(*name)
                    .cloned()
                    .unwrap_or_else(|| SCHEMA[*name].default.clone());
                (name.to_string(), value)
            })
            .collect()
    }

    pub fn mysql_version(&self) -> String {
        self.get("version").map(|v| v.as_text()).unwrap_or_default()
    }

    pub fn client_charset(&self) -> CharacterSet {
        self.charset_var("character_set_client")
    }

    pub fn server_charset(&self) -> CharacterSet {
        self.charset_var("character_set_server")
    }

    fn charset_var(&self, name: &str) -> CharacterSet {
        self.get(name)
            .ok()
            .and_then(|v| CharacterSet::from_name(&v.as_text()))
            .unwrap_or(CharacterSet::Utf8mb4)
    }

    pub fn external_user(&self) -> Option<String> {
        match self.get("external_user") {
            Ok(Value::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Offset used to latch NOW()/CURDATE()/CURTIME(). Named zones other
    /// than UTC/SYSTEM fall back to UTC.
    pub fn time_zone(&self) -> FixedOffset {
        let raw = self
            .get("time_zone")
            .map(|v| v.as_text())
            .unwrap_or_else(|_| "UTC".to_string());
        parse_time_zone(&raw).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

fn parse_time_zone(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("system") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1i32, &raw[1..]),
        b'-' => (-1i32, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Table-driven coercion of a raw value into the variable's kind. The
/// rejected value is handed back for the error message.
fn coerce(kind: VarKind, value: Value) -> Result<Value, Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match kind {
        VarKind::Bool => match &value {
            Value::Bool(_) => Ok(value),
            Value::Int(0) | Value::UInt(0) => Ok(Value::Bool(false)),
            Value::Int(1) | Value::UInt(1) => Ok(Value::Bool(true)),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Ok(Value::Bool(true)),
                "off" | "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(value),
            },
            _ => Err(value),
        },
        VarKind::Int => match &value {
            Value::Int(_) => Ok(value),
            Value::UInt(u) => Ok(Value::Int(*u as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
            Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| value),
            _ => Err(value),
        },
        VarKind::Float => value.as_f64().map(Value::Float).ok_or(value),
        VarKind::Str => match value {
            Value::Str(_) => Ok(value),
            other => Ok(Value::Str(other.as_text())),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let vars = SystemVariables::new();
        assert_eq!(Value::Bool(true), vars.get("autocommit").unwrap());
        assert_eq!(
            Value::Str("mysql-mimic".into()),
            vars.get("VERSION_COMMENT").unwrap()
        );
    }

    #[test]
    fn test_unknown_variable() {
        let vars = SystemVariables::new();
        let err = vars.get("no_such_var").unwrap_err();
        assert!(matches!(
            err,
            ServerError::Mysql {
                kind: ErrorKind::UnknownSystemVariable,
                ..
            }
        ));
    }

    #[test]
    fn test_bool_coercion() {
        let mut vars = SystemVariables::new();
        vars.set("autocommit", Value::Str("OFF".into()), false).unwrap();
        assert_eq!(Value::Bool(false), vars.get("autocommit").unwrap());
        vars.set("autocommit", Value::Int(1), false).unwrap();
        assert_eq!(Value::Bool(true), vars.get("autocommit").unwrap());
        assert!(vars.set("autocommit", Value::Str("banana".into()), false).is_err());
    }

    #[test]
    fn test_read_only_refused_unless_forced() {
        let mut vars = SystemVariables::new();
        assert!(vars
            .set("external_user", Value::Str("joe".into()), false)
            .is_err());
        vars.set("external_user", Value::Str("joe".into()), true).unwrap();
        assert_eq!(Some("joe".to_string()), vars.external_user());
    }

    #[test]
    fn test_int_coercion() {
        let mut vars = SystemVariables::new();
        vars.set("wait_timeout", Value::Str("60".into()), false).unwrap();
        assert_eq!(Value::Int(60), vars.get("wait_timeout").unwrap());
    }

    #[test]
    fn test_time_zone_offsets() {
        let mut vars = SystemVariables::new();
        assert_eq!(0, vars.time_zone().local_minus_utc());
        vars.set("time_zone", Value::Str("+05:30".into()), false).unwrap();
        assert_eq!(5 * 3600 + 1800, vars.time_zone().local_minus_utc());
        vars.set("time_zone", Value::Str("-01:00".into()), false).unwrap();
        assert_eq!(-3600, vars.time_zone().local_minus_utc());
    }

    #[test]
    fn test_list_is_sorted() {
        let vars = SystemVariables::new();
        let listed = vars.list();
        let names: Vec<&String> = listed.iter().map(|(n, _)| n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
        assert!(listed.iter().any(|(n, _)| n == "autocommit"));
    }
}
