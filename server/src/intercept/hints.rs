//! `/*+ SET_VAR(name=value) */` optimizer hints. Assignments are scoped
//! to the hinted statement: previous values are saved before execution
//! and restored afterwards.

use once_cell::sync::Lazy;
use regex::Regex;

use mimic_common::err::SqlResult;
use mimic_protocol::result::Value;

use crate::vars::SystemVariables;

static HINT_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*\+([\s\S]*?)\*/").unwrap());
static SET_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SET_VAR\(\s*(\w+)\s*=\s*([^)]+?)\s*\)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct HintAssignment {
    pub name: String,
    pub value: Value,
}

/// Save slots for the variables a hint touched, restored when the
/// statement finishes.
pub struct SaveSlots(Vec<(String, Value)>);

/// All SET_VAR assignments in the statement, in source order (outer
/// query hints come first, subquery hints after).
pub fn extract(sql: &str) -> SqlResult<Vec<HintAssignment>> {
    let mut out = Vec::new();
    for comment in HINT_COMMENT.captures_iter(sql) {
        for assignment in SET_VAR.captures_iter(&comment[1]) {
            out.push(HintAssignment {
                name: assignment[1].to_lowercase(),
                value: parse_hint_value(&assignment[2]),
            });
        }
    }
    Ok(out)
}

fn parse_hint_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.len() >= 2 {
        let first = raw.as_bytes()[0];
        let last = raw.as_bytes()[raw.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return Value::Str(raw[1..raw.len() - 1].to_string());
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" => return Value::Bool(true),
        "off" | "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(raw.to_string())
}

/// Apply assignments innermost-first so outer hints override inner ones,
/// saving the previous value of each touched variable exactly once.
pub fn apply(vars: &mut SystemVariables, hints: &[HintAssignment]) -> SqlResult<SaveSlots> {
    let mut slots: Vec<(String, Value)> = Vec::new();
    for hint in hints.iter().rev() {
        let result = (|| {
            let previous = vars.get(&hint.name)?;
            vars.set(&hint.name, hint.value.clone(), false)?;
            Ok::<Value, mimic_common::err::ServerError>(previous)
        })();
        match result {
            Ok(previous) => {
                if !slots.iter().any(|(name, _)| name == &hint.name) {
                    slots.push((hint.name.clone(), previous));
                }
            }
            Err(e) => {
                restore(vars, SaveSlots(slots));
                return Err(e);
            }
        }
    }
    Ok(SaveSlots(slots))
}

pub fn restore(vars: &mut SystemVariables, slots: SaveSlots) {
    for (name, value) in slots.0 {
        // force: restoration must succeed even for read-only variables
        let _ = vars.set(&name, value, true);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_extract() {
        let hints = extract("SELECT /*+ SET_VAR(sql_select_limit=100) SET_VAR(autocommit=OFF) */ 1")
            .unwrap();
        assert_eq!(2, hints.len());
        assert_eq!("sql_select_limit", hints[0].name);
        assert_eq!(Value::Int(100), hints[0].value);
        assert_eq!(Value::Bool(false), hints[1].value);
    }

    #[test]
    fn test_extract_quoted() {
        let hints = extract("SELECT /*+ SET_VAR(time_zone='+01:00') */ NOW()").unwrap();
        assert_eq!(Value::Str("+01:00".into()), hints[0].value);
    }

    #[test]
    fn test_plain_comments_ignored() {
        assert!(extract("SELECT /* SET_VAR(a=1) no plus */ 1").unwrap().is_empty());
    }

    #[test]
    fn test_scoped_application() {
        let mut vars = SystemVariables::new();
        let hints = extract("SELECT /*+ SET_VAR(sql_select_limit=5) */ 1").unwrap();
        let saved = apply(&mut vars, &hints).unwrap();
        assert_eq!(Value::Int(5), vars.get("sql_select_limit").unwrap());
        restore(&mut vars, saved);
        assert_eq!(Value::Null, vars.get("sql_select_limit").unwrap());
    }

    #[test]
    fn test_outer_overrides_inner() {
        let mut vars = SystemVariables::new();
        // outer hint first in source order
        let hints = extract(
            "SELECT /*+ SET_VAR(sql_select_limit=1) */ a FROM (SELECT /*+ SET_VAR(sql_select_limit=2) */ b) t",
        )
        .unwrap();
        let saved = apply(&mut vars, &hints).unwrap();
        assert_eq!(Value::Int(1), vars.get("sql_select_limit").unwrap());
        restore(&mut vars, saved);
    }

    #[test]
    fn test_unknown_variable_rolls_back() {
        let mut vars = SystemVariables::new();
        let hints = extract(
            "SELECT /*+ SET_VAR(bogus_var=1) SET_VAR(sql_select_limit=5) */ 1",
        )
        .unwrap();
        assert!(apply(&mut vars, &hints).is_err());
        // the successful assignment was rolled back
        assert_eq!(Value::Null, vars.get("sql_select_limit").unwrap());
    }
}
