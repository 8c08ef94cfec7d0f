use std::fmt;
use std::sync::Arc;

use crate::error::DriverError;
use crate::graph::NodeId;
use crate::large_object::LargeObject;

/// Primitive value, as seen by the validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    /// May be non-finite. NaN and ±Infinity never survive validation.
    Float(f64),
    Text(String),
    /// Driver numeric carried as text (NUMBER/DECIMAL beyond f64 precision).
    /// Not a plain primitive, passed through as-is.
    Decimal(String),
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
            Scalar::Decimal(_) => "decimal",
        }
    }

    /// Plain JSON form. A non-finite float has no JSON representation and
    /// becomes `null`.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(b),
            Scalar::Int(i) => serde_json::Value::from(i),
            Scalar::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::Text(s) | Scalar::Decimal(s) => serde_json::Value::String(s),
        }
    }
}

/// A raw value handed over by the driver, classified once at construction.
///
/// Compound values (`Array`, `Object`) live in a [`RawGraph`](crate::RawGraph)
/// and are referenced by [`NodeId`], so a record may point back at itself or
/// at any of its ancestors.
#[derive(Clone)]
pub enum RawValue {
    Scalar(Scalar),
    /// Accessor container holding one value (`{ value: v }`).
    Wrapped(Box<RawValue>),
    /// Out-of-line content behind an async fetch.
    LargeObject(Arc<dyn LargeObject>),
    Array(NodeId),
    Object(NodeId),
    /// Milliseconds since the Unix epoch. Values outside the representable
    /// calendar range are invalid dates.
    Timestamp(i64),
    /// Function-valued member (driver method). Never part of the output.
    Callable,
    /// Unknown driver object, with its text rendering if it has one.
    Opaque(Option<String>),
    /// A member whose read failed in the driver.
    Unreadable(DriverError),
}

impl RawValue {
    pub fn null() -> Self {
        RawValue::Scalar(Scalar::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        RawValue::Scalar(Scalar::Text(s.into()))
    }

    pub fn wrapped(inner: RawValue) -> Self {
        RawValue::Wrapped(Box::new(inner))
    }

    pub fn large_object(handle: impl LargeObject + 'static) -> Self {
        RawValue::LargeObject(Arc::new(handle))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Scalar(s) => s.kind(),
            RawValue::Wrapped(_) => "wrapped",
            RawValue::LargeObject(_) => "large_object",
            RawValue::Array(_) => "array",
            RawValue::Object(_) => "object",
            RawValue::Timestamp(_) => "timestamp",
            RawValue::Callable => "callable",
            RawValue::Opaque(_) => "opaque",
            RawValue::Unreadable(_) => "unreadable",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Scalar(Scalar::Null))
    }

    /// Arena node backing this value, for compound values.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            RawValue::Array(id) | RawValue::Object(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Scalar(s) => write!(f, "{s:?}"),
            RawValue::Wrapped(inner) => f.debug_tuple("Wrapped").field(inner).finish(),
            RawValue::LargeObject(_) => f.write_str("LargeObject(..)"),
            RawValue::Array(id) => write!(f, "Array({})", id.index()),
            RawValue::Object(id) => write!(f, "Object({})", id.index()),
            RawValue::Timestamp(ms) => write!(f, "Timestamp({ms})"),
            RawValue::Callable => f.write_str("Callable"),
            RawValue::Opaque(text) => f.debug_tuple("Opaque").field(text).finish(),
            RawValue::Unreadable(e) => f.debug_tuple("Unreadable").field(e).finish(),
        }
    }
}

impl From<Scalar> for RawValue {
    fn from(s: Scalar) -> Self {
        RawValue::Scalar(s)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::text(s)
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::text(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Scalar(Scalar::Int(i))
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Scalar(Scalar::Float(f))
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Scalar(Scalar::Bool(b))
    }
}
