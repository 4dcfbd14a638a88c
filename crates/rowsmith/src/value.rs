//! Runtime values for record payloads and keys.

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use rowsmith_schema::PgType;
use std::fmt;

/// A runtime SQL value.
///
/// Used for payloads, keys and returned rows. Maps to Postgres types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL
    Null,

    /// Boolean
    Bool(bool),

    /// 16-bit signed integer (SMALLINT)
    I16(i16),

    /// 32-bit signed integer (INTEGER)
    I32(i32),

    /// 64-bit signed integer (BIGINT)
    I64(i64),

    /// 32-bit float (REAL)
    F32(f32),

    /// 64-bit float (DOUBLE PRECISION)
    F64(f64),

    /// Text (TEXT, VARCHAR)
    String(String),

    /// JSONB document
    Json(serde_json::Value),

    /// TIMESTAMP (without time zone)
    Timestamp(NaiveDateTime),

    /// TIMESTAMPTZ
    TimestampTz(DateTime<Utc>),
}

/// A record: column name to value, in column order.
pub type Record = IndexMap<String, Value>;

/// Build a [`Record`] from name/value pairs.
///
/// ```
/// use rowsmith::{Value, record};
///
/// let payload = record([("title", Value::from("hello")), ("score", Value::from(1.5))]);
/// assert_eq!(payload.get("title"), Some(&Value::from("hello")));
/// ```
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

impl Value {
    /// Returns true if this is a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Json(_) => "json",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer variant, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer variant that fits in an `i32`.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    /// Any numeric variant, as a double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Timestamp without time zone; a `TimestampTz` is read as UTC.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            Value::TimestampTz(v) => Some(v.naive_utc()),
            _ => None,
        }
    }

    /// Convert to the representation a column of type `pg_type` stores.
    ///
    /// Integers widen and narrow (range-checked), integers become floats,
    /// and timestamps move between the zoned and unzoned forms as UTC.
    /// NULL passes through. Anything else returns `Err` with this value's
    /// type name.
    pub fn coerce(self, pg_type: PgType) -> Result<Value, &'static str> {
        let actual = self.type_name();
        if self.is_null() {
            return Ok(Value::Null);
        }

        let coerced = match pg_type {
            PgType::SmallInt => self
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Value::I16),
            PgType::Integer => self
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::I32),
            PgType::BigInt => self.as_i64().map(Value::I64),
            PgType::Real => match self {
                Value::F32(v) => Some(Value::F32(v)),
                other => other.as_f64().map(|v| Value::F32(v as f32)),
            },
            PgType::DoublePrecision => self.as_f64().map(Value::F64),
            PgType::Boolean => self.as_bool().map(Value::Bool),
            PgType::Varchar(_) | PgType::Text => match self {
                Value::String(v) => Some(Value::String(v)),
                _ => None,
            },
            PgType::Jsonb => match self {
                Value::Json(v) => Some(Value::Json(v)),
                _ => None,
            },
            PgType::Timestamp => self.as_timestamp().map(Value::Timestamp),
            PgType::Timestamptz => match self {
                Value::TimestampTz(v) => Some(Value::TimestampTz(v)),
                Value::Timestamp(v) => Some(Value::TimestampTz(v.and_utc())),
                _ => None,
            },
        };

        coerced.ok_or(actual)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

// Convenient From impls
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::TimestampTz(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Primary key values, in the entity's key column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Key(pub Vec<Value>);

impl Key {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl From<Vec<Value>> for Key {
    fn from(v: Vec<Value>) -> Self {
        Key(v)
    }
}

impl From<Value> for Key {
    fn from(v: Value) -> Self {
        Key(vec![v])
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key(vec![Value::I32(v)])
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key(vec![Value::I64(v)])
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key(vec![Value::from(v)])
    }
}


#[cfg(test)]
mod proptests {
    use proptest::{prop_assert_eq, proptest};

    use super::*;

    proptest! {
        #[test]
        fn proptest_integer_coercion_preserves_value(v: i32) {
            prop_assert_eq!(Value::I32(v).coerce(PgType::BigInt), Ok(Value::I64(i64::from(v))));
            prop_assert_eq!(Value::I64(i64::from(v)).coerce(PgType::Integer), Ok(Value::I32(v)));
        }

        #[test]
        fn proptest_smallint_range_is_checked(v: i64) {
            let coerced = Value::I64(v).coerce(PgType::SmallInt);
            prop_assert_eq!(coerced.is_ok(), i16::try_from(v).is_ok());
        }
    }
}
