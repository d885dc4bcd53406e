//! Coercion of assigned values into primitive column types.
//!
//! Strings are parsed leniently: integers and floats take the longest numeric
//! prefix (so `"12abc"` is `12` and `"abc"` is `0`), booleans accept
//! `1`, `t`, `T`, `true` and `TRUE` as true, and datetimes accept the common
//! SQL and ISO 8601 layouts. Datetimes and times are truncated to whole
//! seconds, matching their encoded form. Values that cannot be interpreted as
//! a date or time become `Null`.

use std::str::FromStr;
use std::sync::LazyLock;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use regex::Regex;

use super::column::ColumnType;
use crate::types::Value;

static INTEGER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[+-]?\d+").expect("integer pattern"));

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+(\.\d+)?|\.\d+)([eE][+-]?\d+)?").expect("float pattern")
});

const TRUE_STRINGS: [&str; 5] = ["1", "t", "T", "true", "TRUE"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub(crate) fn cast(ty: &ColumnType, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match ty {
        ColumnType::String | ColumnType::Text => to_text(value),
        ColumnType::Integer => to_integer(value),
        ColumnType::Float => to_float(value),
        ColumnType::Decimal => to_decimal(value),
        ColumnType::DateTime | ColumnType::Timestamp => to_datetime(value),
        ColumnType::Time => to_time(value),
        ColumnType::Date => to_date(value),
        ColumnType::Binary => to_binary(value),
        ColumnType::Boolean => to_boolean(value),
        ColumnType::Custom(_) => value.clone(),
    }
}

fn to_text(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::List(_) | Value::Map(_) | Value::Object(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn to_integer(value: &Value) -> Value {
    match value {
        Value::Integer(_) => value.clone(),
        Value::Bool(b) => Value::Integer(i64::from(*b)),
        Value::Float(f) => Value::Integer(f.trunc() as i64),
        Value::Decimal(d) => d.to_i64().map(Value::Integer).unwrap_or(Value::Null),
        Value::String(s) => Value::Integer(
            INTEGER_PREFIX
                .find(s)
                .and_then(|m| m.as_str().trim().parse().ok())
                .unwrap_or(0),
        ),
        other => other.clone(),
    }
}

fn parse_float(s: &str) -> f64 {
    FLOAT_PREFIX
        .find(s)
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(0.0)
}

fn to_float(value: &Value) -> Value {
    match value {
        Value::Float(_) => value.clone(),
        Value::Integer(i) => Value::Float(*i as f64),
        Value::Bool(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::Decimal(d) => d.to_f64().map(Value::Float).unwrap_or(Value::Null),
        Value::String(s) => Value::Float(parse_float(s)),
        other => other.clone(),
    }
}

fn to_decimal(value: &Value) -> Value {
    match value {
        Value::Decimal(_) => value.clone(),
        Value::Integer(i) => Value::Decimal(BigDecimal::from(*i)),
        Value::Float(f) => BigDecimal::from_f64(*f)
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        Value::String(s) => {
            let prefix = FLOAT_PREFIX.find(s).map(|m| m.as_str().trim()).unwrap_or("0");
            BigDecimal::from_str(prefix)
                .map(Value::Decimal)
                .unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(|ndt| ndt.and_utc())
}

fn whole_seconds<T: Timelike + Copy>(t: T) -> T {
    t.with_nanosecond(0).unwrap_or(t)
}

fn to_datetime(value: &Value) -> Value {
    let dt = match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN).and_utc()),
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        Value::String(s) => parse_datetime(s),
        _ => None,
    };
    dt.map(|dt| Value::DateTime(whole_seconds(dt)))
        .unwrap_or(Value::Null)
}

fn to_time(value: &Value) -> Value {
    let time = match value {
        Value::Time(t) => Some(*t),
        Value::DateTime(dt) => Some(dt.time()),
        Value::String(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
                .or_else(|| parse_datetime(s).map(|dt| dt.time()))
        }
        _ => None,
    };
    time.map(|t| Value::Time(whole_seconds(t)))
        .unwrap_or(Value::Null)
}

fn to_date(value: &Value) -> Value {
    match value {
        Value::Date(_) => value.clone(),
        Value::DateTime(dt) => Value::Date(dt.date_naive()),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_binary(value: &Value) -> Value {
    match value {
        Value::Binary(_) => value.clone(),
        Value::String(s) => Value::Binary(s.as_bytes().to_vec()),
        other => other.clone(),
    }
}

fn to_boolean(value: &Value) -> Value {
    Value::Bool(match value {
        Value::Bool(b) => *b,
        Value::Integer(i) => *i == 1,
        Value::String(s) => TRUE_STRINGS.contains(&s.as_str()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_integer_from_strings() {
        assert_eq!(cast(&ColumnType::Integer, &"34".into()), Value::Integer(34));
        assert_eq!(cast(&ColumnType::Integer, &" -7 years".into()), Value::Integer(-7));
        assert_eq!(cast(&ColumnType::Integer, &"abc".into()), Value::Integer(0));
        assert_eq!(cast(&ColumnType::Integer, &Value::Float(3.9)), Value::Integer(3));
    }

    #[test]
    fn test_float_from_strings() {
        assert_eq!(cast(&ColumnType::Float, &"72.5kg".into()), Value::Float(72.5));
        assert_eq!(cast(&ColumnType::Float, &"1e3".into()), Value::Float(1000.0));
        assert_eq!(cast(&ColumnType::Float, &Value::Integer(30)), Value::Float(30.0));
    }

    #[test]
    fn test_decimal_keeps_precision() {
        let value = cast(&ColumnType::Decimal, &"1234.5678".into());
        assert_eq!(value, Value::Decimal(BigDecimal::from_str("1234.5678").unwrap()));
    }

    #[test]
    fn test_boolean() {
        for truthy in ["1", "t", "T", "true", "TRUE"] {
            assert_eq!(cast(&ColumnType::Boolean, &truthy.into()), Value::Bool(true));
        }
        assert_eq!(cast(&ColumnType::Boolean, &"yes".into()), Value::Bool(false));
        assert_eq!(cast(&ColumnType::Boolean, &Value::Integer(1)), Value::Bool(true));
        assert_eq!(cast(&ColumnType::Boolean, &Value::Integer(0)), Value::Bool(false));
    }

    #[test]
    fn test_datetime_layouts() {
        let expected = Utc.with_ymd_and_hms(2010, 2, 10, 21, 21, 0).unwrap();
        for text in [
            "2010-02-10 21:21:00",
            "2010-02-10T21:21:00",
            "2010-02-10T21:21:00Z",
            "2010-02-10 21:21",
        ] {
            assert_eq!(
                cast(&ColumnType::DateTime, &text.into()),
                Value::DateTime(expected),
                "{text}"
            );
        }
        assert_eq!(cast(&ColumnType::DateTime, &"soon".into()), Value::Null);
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let expected = Utc.with_ymd_and_hms(2010, 2, 10, 21, 21, 0).unwrap();
        let precise = Utc.timestamp_opt(1_265_836_860, 500_000_000).unwrap();
        assert_eq!(
            cast(&ColumnType::DateTime, &Value::DateTime(precise)),
            Value::DateTime(expected)
        );
        assert_eq!(
            cast(&ColumnType::DateTime, &"2010-02-10 21:21:00.250".into()),
            Value::DateTime(expected)
        );

        let Value::Time(time) = cast(&ColumnType::Time, &"21:21:07.75".into()) else {
            panic!("expected a time");
        };
        assert_eq!((time.hour(), time.minute(), time.second()), (21, 21, 7));
        assert_eq!(time.nanosecond(), 0);

        let Value::Time(time) = cast(&ColumnType::Time, &Value::DateTime(precise)) else {
            panic!("expected a time");
        };
        assert_eq!(time.nanosecond(), 0);
    }

    #[test]
    fn test_date_and_time() {
        let Value::Date(date) = cast(&ColumnType::Date, &"2010-02-10 21:21:00".into()) else {
            panic!("expected a date");
        };
        assert_eq!((date.year(), date.month(), date.day()), (2010, 2, 10));

        let Value::Time(time) = cast(&ColumnType::Time, &"21:21".into()) else {
            panic!("expected a time");
        };
        assert_eq!((time.hour(), time.minute()), (21, 21));
    }

    #[test]
    fn test_cast_is_idempotent() {
        let samples: [(ColumnType, Value); 6] = [
            (ColumnType::Integer, "42".into()),
            (ColumnType::Float, "4.2".into()),
            (ColumnType::Decimal, "4.20".into()),
            (ColumnType::DateTime, "2010-02-10 21:21:00".into()),
            (ColumnType::Boolean, "t".into()),
            (ColumnType::Text, Value::Integer(12)),
        ];
        for (ty, value) in samples {
            let once = cast(&ty, &value);
            assert_eq!(cast(&ty, &once), once);
        }
    }
}
