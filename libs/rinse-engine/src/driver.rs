//! JSON result-set adapter.
//!
//! Builds a [`RawGraph`] from a JSON document. Plain JSON maps structurally;
//! single-key objects with a `$` tag stand for driver values JSON cannot
//! express directly:
//!
//! | tag            | value                        | raw value                   |
//! |----------------|------------------------------|-----------------------------|
//! | `$value`       | any                          | wrapped scalar              |
//! | `$lob`         | string or `null`             | large-object handle         |
//! | `$blob`        | array of bytes               | binary large object (UTF-8) |
//! | `$date`        | epoch millis or RFC 3339     | timestamp                   |
//! | `$decimal`     | string or number             | driver decimal              |
//! | `$opaque`      | string or `null`             | unknown driver object       |
//! | `$callable`    | any                          | function-valued member      |
//! | `$unreadable`  | error message                | member whose read fails     |

use chrono::DateTime;
use serde_json::{Map, Number, Value};

use rinse_api::error::DriverError;
use rinse_api::graph::RawGraph;
use rinse_api::large_object::{BytesLargeObject, InlineLargeObject};
use rinse_api::value::{RawValue, Scalar};

use crate::error::EngineError;

/// A decoded result set: the arena plus its root value.
#[derive(Debug)]
pub struct ResultSet {
    pub graph: RawGraph,
    pub root: RawValue,
}

impl ResultSet {
    pub fn from_json(value: &Value) -> Self {
        let mut graph = RawGraph::new();
        let root = convert(&mut graph, value);
        Self { graph, root }
    }

    pub fn parse_str(input: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(input).map_err(|e| DriverError::from(e).with_context("result set"))?;
        Ok(Self::from_json(&value))
    }

    pub fn into_parts(self) -> (RawGraph, RawValue) {
        (self.graph, self.root)
    }
}

fn convert(graph: &mut RawGraph, value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::null(),
        Value::Bool(b) => RawValue::from(*b),
        Value::Number(n) => RawValue::Scalar(number(n)),
        Value::String(s) => RawValue::text(s.clone()),
        Value::Array(items) => {
            let items: Vec<RawValue> = items.iter().map(|v| convert(graph, v)).collect();
            graph.array(items)
        }
        Value::Object(map) => match tagged(graph, map) {
            Some(raw) => raw,
            None => {
                let members: Vec<(String, RawValue)> =
                    map.iter().map(|(k, v)| (k.clone(), convert(graph, v))).collect();
                graph.object(members)
            }
        },
    }
}

fn number(n: &Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else if n.is_u64() {
        // Beyond i64: keep the exact digits.
        Scalar::Decimal(n.to_string())
    } else {
        n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null)
    }
}

fn tagged(graph: &mut RawGraph, map: &Map<String, Value>) -> Option<RawValue> {
    if map.len() != 1 {
        return None;
    }
    let (tag, value) = map.iter().next()?;
    let raw = match tag.as_str() {
        "$value" => RawValue::wrapped(convert(graph, value)),
        "$lob" => match value {
            Value::Null => RawValue::large_object(InlineLargeObject::empty()),
            Value::String(s) => RawValue::large_object(InlineLargeObject::new(s.clone())),
            other => RawValue::large_object(InlineLargeObject::new(other.to_string())),
        },
        "$blob" => RawValue::large_object(BytesLargeObject::new(blob_bytes(value))),
        "$date" => RawValue::Timestamp(date_millis(value)),
        "$decimal" => RawValue::Scalar(Scalar::Decimal(text_of(value))),
        "$opaque" => RawValue::Opaque(value.as_str().map(str::to_string)),
        "$callable" => RawValue::Callable,
        "$unreadable" => RawValue::Unreadable(DriverError::access(text_of(value))),
        _ => return None,
    };
    Some(raw)
}

/// Epoch milliseconds of a `$date` payload. Unparseable dates map to
/// `i64::MIN`, which lies outside the calendar range and extracts as `null`.
fn date_millis(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(i64::MIN),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(i64::MIN),
        _ => i64::MIN,
    }
}

/// Bytes of a `$blob` payload. Entries that are not bytes are dropped.
fn blob_bytes(value: &Value) -> Vec<u8> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect()
        })
        .unwrap_or_default()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
