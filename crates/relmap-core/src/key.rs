//! Hashable relation keys.

use crate::value::Value;

/// A key value normalized for grouping parents and children.
///
/// Integers of every width collapse into one variant so an `INTEGER` parent
/// key matches a `BIGINT` child column. NULL and floating-point values have
/// no key and never match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl RelationKey {
    /// Normalize a value, `None` when it cannot act as a key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Float(_) | Value::Double(_) | Value::Json(_) => None,
            Value::Text(s) | Value::Decimal(s) => Some(RelationKey::Text(s.clone())),
            Value::Bytes(b) => Some(RelationKey::Bytes(b.clone())),
            other => other.as_i64().map(RelationKey::Int),
        }
    }

    /// Back to a bindable parameter.
    pub fn to_value(&self) -> Value {
        match self {
            RelationKey::Int(v) => Value::BigInt(*v),
            RelationKey::Text(s) => Value::Text(s.clone()),
            RelationKey::Bytes(b) => Value::Bytes(b.clone()),
        }
    }
}
