use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

/// A typed scalar produced by a backend or an internal handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// A time-of-day or interval. MySQL TIME is signed and may exceed 24h.
    Time(Duration),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Float(f) => Some(*f as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String form as rendered by the text protocol.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => format_datetime(dt),
            Value::Time(t) => format_time(t),
        }
    }

    /// SQL literal used when substituting prepared-statement parameters.
    ///
    /// Embedded quotes in string parameters are not escaped, mirroring the
    /// textual interpolation this protocol front-end is compatible with.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("'{}'", s),
            Value::Bytes(b) => format!("'{}'", String::from_utf8_lossy(b)),
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => {
                format!("'{}'", self.as_text())
            }
        }
    }
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

pub(crate) fn format_time(t: &Duration) -> String {
    let negative = t.num_seconds() < 0 || t.num_microseconds().unwrap_or(0) < 0;
    let total_micros = t.num_microseconds().unwrap_or(t.num_seconds() * 1_000_000).abs();
    let micros = total_micros % 1_000_000;
    let total_seconds = total_micros / 1_000_000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    let sign = if negative { "-" } else { "" };
    if micros == 0 {
        format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds)
    } else {
        format!(
            "{}{:02}:{:02}:{:02}.{:06}",
            sign, hours, minutes, seconds, micros
        )
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_sql_literals() {
        assert_eq!("NULL", Value::Null.to_sql_literal());
        assert_eq!("TRUE", Value::Bool(true).to_sql_literal());
        assert_eq!("'1'", Value::Str("1".into()).to_sql_literal());
        assert_eq!("1", Value::Int(1).to_sql_literal());
        assert_eq!("1.5", Value::Float(1.5).to_sql_literal());
    }

    #[test]
    fn test_text_rendering() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!("2024-03-09", Value::Date(d).as_text());
        let dt = d.and_hms_opt(13, 5, 22).unwrap();
        assert_eq!("2024-03-09 13:05:22", Value::DateTime(dt).as_text());
        assert_eq!("1", Value::Bool(true).as_text());
    }

    #[test]
    fn test_time_rendering() {
        assert_eq!("00:00:05", Value::Time(Duration::seconds(5)).as_text());
        assert_eq!("-01:00:01", Value::Time(Duration::seconds(-3601)).as_text());
        assert_eq!(
            "26:00:00",
            Value::Time(Duration::hours(26)).as_text()
        );
    }
}
