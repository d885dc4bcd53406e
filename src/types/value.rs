use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde_json::json;

/// Key/value map stored in a record's property bag.
pub type PropMap = BTreeMap<String, Value>;

/// Tag marking a non-native value in the encoded form. A plain map that
/// holds this key itself is wrapped in a `Hash` tag when encoded.
pub const JSON_CLASS: &str = "json_class";

/// Datetimes are encoded in UTC without sub-second precision.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Map(PropMap),
    Object(Object),
}

/// An instance of a custom property class.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub class: String,
    pub fields: PropMap,
}

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: PropMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, whitespace-only strings and empty containers are blank.
    /// `false` and `0` are data, not blanks.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Binary(b) => b.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the value's type as reported in validation messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::Binary(_) => "Binary",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Object(o) => &o.class,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Integer(i) => json!(i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => tagged("BigDecimal", json!(d.to_string())),
            Value::String(s) => json!(s),
            Value::DateTime(dt) => tagged("Time", json!(dt.format(TIME_FORMAT).to_string())),
            Value::Date(d) => tagged("Date", json!(d.format(DATE_FORMAT).to_string())),
            Value::Time(t) => tagged("TimeOfDay", json!(t.format(TIME_OF_DAY_FORMAT).to_string())),
            Value::Binary(b) => tagged("Binary", json!(STANDARD.encode(b))),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                let object = serde_json::Value::Object(
                    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                );
                if map.contains_key(JSON_CLASS) {
                    tagged("Hash", object)
                } else {
                    object
                }
            }
            Value::Object(obj) => tagged(
                &obj.class,
                serde_json::Value::Object(
                    obj.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                ),
            ),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(mut map) => match map.remove(JSON_CLASS) {
                Some(serde_json::Value::String(class)) => {
                    let data = map.remove("data").unwrap_or(serde_json::Value::Object(map));
                    untag(class, data)
                }
                Some(other) => {
                    map.insert(JSON_CLASS.to_string(), other);
                    Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
                }
                None => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect()),
            },
        }
    }

    /// The value as SQLite stores it. Index diffs compare in this domain so
    /// that a stored `TEXT` datetime equals its in-memory counterpart.
    pub fn to_sql_value(&self) -> rusqlite::types::Value {
        use rusqlite::types::Value as Sql;
        match self {
            Value::Null => Sql::Null,
            Value::Bool(b) => Sql::Integer(i64::from(*b)),
            Value::Integer(i) => Sql::Integer(*i),
            Value::Float(f) => Sql::Real(*f),
            Value::String(s) => Sql::Text(s.clone()),
            Value::Binary(b) => Sql::Blob(b.clone()),
            other => Sql::Text(other.to_string()),
        }
    }
}

fn tagged(class: &str, data: serde_json::Value) -> serde_json::Value {
    json!({ JSON_CLASS: class, "data": data })
}

fn untag(class: String, data: serde_json::Value) -> Value {
    let text = data.as_str();
    match class.as_str() {
        "Time" => text
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok())
            .map(|ndt| Value::DateTime(ndt.and_utc()))
            .unwrap_or(Value::Null),
        "Date" => text
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
            .map(Value::Date)
            .unwrap_or(Value::Null),
        "TimeOfDay" => text
            .and_then(|s| NaiveTime::parse_from_str(s, TIME_OF_DAY_FORMAT).ok())
            .map(Value::Time)
            .unwrap_or(Value::Null),
        "BigDecimal" => text
            .and_then(|s| BigDecimal::from_str(s).ok())
            .map(Value::Decimal)
            .unwrap_or(Value::Null),
        "Binary" => text
            .and_then(|s| STANDARD.decode(s).ok())
            .map(Value::Binary)
            .unwrap_or(Value::Null),
        "Hash" => match data {
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
            _ => Value::Null,
        },
        _ => {
            let fields = match data {
                serde_json::Value::Object(map) => {
                    map.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect()
                }
                other => PropMap::from([("data".to_string(), Value::from_json(other))]),
            };
            Value::Object(Object { class, fields })
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(TIME_FORMAT)),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format(TIME_OF_DAY_FORMAT)),
            Value::Binary(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::List(_) | Value::Map(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Binary(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            other => ToSqlOutput::Owned(other.to_sql_value()),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Binary(b.to_vec()),
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<PropMap> for Value {
    fn from(value: PropMap) -> Self {
        Value::Map(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value as Sql;
        match value {
            Sql::Null => Value::Null,
            Sql::Integer(i) => Value::Integer(i),
            Sql::Real(f) => Value::Float(f),
            Sql::Text(s) => Value::String(s),
            Sql::Blob(b) => Value::Binary(b),
        }
    }
}

/// Typed extraction used by generated accessors.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        (!value.is_null()).then(|| value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for PropMap {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_map().cloned()
    }
}
