use serde_json::Value;

use rinse_api::mapping::FieldMapping;
use rinse_api::record::{FallbackReason, SanitizedRecord};

/// Degraded record: every mapped output field `null`, plus the marker.
///
/// Without a mapping (or with an empty one) only the two marker fields are
/// present.
pub fn build_fallback(mapping: Option<&FieldMapping>, reason: FallbackReason) -> SanitizedRecord {
    let mut record = SanitizedRecord::new();
    if let Some(mapping) = mapping {
        for field in mapping {
            record.insert(field.target.clone(), Value::Null);
        }
    }
    record.mark_fallback(reason);
    record
}

/// `count` identical fallbacks, one per record of a failed unit.
pub fn fallback_batch(mapping: Option<&FieldMapping>, reason: FallbackReason, count: usize) -> Vec<SanitizedRecord> {
    let template = build_fallback(mapping, reason);
    vec![template; count]
}
