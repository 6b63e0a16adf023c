//! Query bindings and their normalization from SeaORM values.

use std::fmt;

use sea_orm::sea_query::{QueryBuilder, SqliteQueryBuilder};
use sea_orm::Value;

/// Identifies which placeholder a binding belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// Zero-based position, filled by `?` (or `$n` on PostgreSQL).
    Position(usize),
    /// Name of a `:name` placeholder, without the colon.
    Name(String),
}

impl BindingKey {
    /// Build a named key, dropping a leading `:` if the caller included one.
    pub fn name(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.strip_prefix(':') {
            Some(stripped) => BindingKey::Name(stripped.to_string()),
            None => BindingKey::Name(name),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKey::Position(index) => write!(f, "#{}", index),
            BindingKey::Name(name) => write!(f, ":{}", name),
        }
    }
}

/// A raw binding as handed to the database driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBinding {
    pub key: BindingKey,
    pub value: Value,
}

impl RawBinding {
    pub fn positional(index: usize, value: impl Into<Value>) -> Self {
        Self {
            key: BindingKey::Position(index),
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: BindingKey::name(name),
            value: value.into(),
        }
    }

    /// Key a list of statement values by their position.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Vec<Self> {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Self::positional(index, value))
            .collect()
    }
}

/// A binding value after driver-level normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl BindingValue {
    /// Normalize a SeaORM value.
    ///
    /// Booleans become `1`/`0`, bytes are decoded lossily, and variants without
    /// a direct mapping are formatted by the query builder and kept as text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(Some(b)) => BindingValue::Int(i64::from(*b)),
            Value::TinyInt(Some(n)) => BindingValue::Int(i64::from(*n)),
            Value::SmallInt(Some(n)) => BindingValue::Int(i64::from(*n)),
            Value::Int(Some(n)) => BindingValue::Int(i64::from(*n)),
            Value::BigInt(Some(n)) => BindingValue::Int(*n),
            Value::TinyUnsigned(Some(n)) => BindingValue::UInt(u64::from(*n)),
            Value::SmallUnsigned(Some(n)) => BindingValue::UInt(u64::from(*n)),
            Value::Unsigned(Some(n)) => BindingValue::UInt(u64::from(*n)),
            Value::BigUnsigned(Some(n)) => BindingValue::UInt(*n),
            Value::Float(Some(f)) => BindingValue::Float(widen_f32(*f)),
            Value::Double(Some(f)) => BindingValue::Float(*f),
            Value::String(Some(s)) => BindingValue::Text(s.to_string()),
            Value::Char(Some(c)) => BindingValue::Text(c.to_string()),
            Value::Bytes(Some(bytes)) => {
                BindingValue::Text(String::from_utf8_lossy(bytes.as_slice()).into_owned())
            }
            Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None) => BindingValue::Null,
            #[allow(unreachable_patterns)]
            other => literal_to_text(SqliteQueryBuilder.value_to_string(other)),
        }
    }
}

/// Widen an `f32` to the `f64` with the same shortest decimal text, so
/// `0.1f32` stays `0.1` rather than `0.10000000149011612`.
fn widen_f32(f: f32) -> f64 {
    f.to_string().parse().unwrap_or_else(|_| f64::from(f))
}

/// Turn a SQLite literal back into the text it denotes.
fn literal_to_text(literal: String) -> BindingValue {
    if literal.eq_ignore_ascii_case("null") {
        return BindingValue::Null;
    }
    match literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => BindingValue::Text(inner.replace("''", "'")),
        None => BindingValue::Text(literal),
    }
}

/// A binding ready for substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub key: BindingKey,
    pub value: BindingValue,
}

impl Binding {
    pub fn positional(index: usize, value: BindingValue) -> Self {
        Self {
            key: BindingKey::Position(index),
            value,
        }
    }

    pub fn named(name: impl Into<String>, value: BindingValue) -> Self {
        Self {
            key: BindingKey::name(name),
            value,
        }
    }
}

/// Normalize raw bindings, keeping their order and keys.
pub fn prepare_bindings(raw: &[RawBinding]) -> Vec<Binding> {
    raw.iter()
        .map(|binding| Binding {
            key: binding.key.clone(),
            value: BindingValue::from_value(&binding.value),
        })
        .collect()
}
