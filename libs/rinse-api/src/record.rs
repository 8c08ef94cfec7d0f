use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved field set to `true` on degraded records.
pub const FALLBACK_FLAG: &str = "_is_fallback";
/// Reserved field carrying the [`FallbackReason`] of a degraded record.
pub const FALLBACK_REASON: &str = "_fallback_reason";

/// Whether `name` is one of the degraded-record marker fields. Such names
/// are never valid output fields.
pub fn is_marker_field(name: &str) -> bool {
    name == FALLBACK_FLAG || name == FALLBACK_REASON
}

/// Why a record was degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Input was not a named-field structure.
    NotARecord,
    /// Input referenced data the result set does not contain.
    InvalidInput,
    /// The batch holding the record failed as a whole.
    BatchFailed,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NotARecord => "not_a_record",
            FallbackReason::InvalidInput => "invalid_input",
            FallbackReason::BatchFailed => "batch_failed",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully materialized output record: output field name → plain value.
///
/// Holds only plain JSON values, so it is acyclic by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SanitizedRecord {
    fields: Map<String, Value>,
}

impl SanitizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Set the degraded-record marker.
    pub fn mark_fallback(&mut self, reason: FallbackReason) {
        self.fields.insert(FALLBACK_FLAG.to_string(), Value::Bool(true));
        self.fields
            .insert(FALLBACK_REASON.to_string(), Value::String(reason.as_str().to_string()));
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.fields.get(FALLBACK_FLAG), Some(Value::Bool(true)))
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fields.get(FALLBACK_REASON).and_then(Value::as_str)
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trips_through_json() {
        let mut rec = SanitizedRecord::new();
        rec.insert("id", Value::Null);
        rec.mark_fallback(FallbackReason::BatchFailed);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": null, "_is_fallback": true, "_fallback_reason": "batch_failed"})
        );

        let back: SanitizedRecord = serde_json::from_value(json).unwrap();
        assert!(back.is_fallback());
        assert_eq!(back.fallback_reason(), Some("batch_failed"));
    }

    #[test]
    fn plain_record_is_not_fallback() {
        let mut rec = SanitizedRecord::new();
        rec.insert("title", Value::String("A".into()));
        assert!(!rec.is_fallback());
        assert_eq!(rec.fallback_reason(), None);
    }
}
