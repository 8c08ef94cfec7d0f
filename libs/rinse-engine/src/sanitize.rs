use std::time::Instant;

use serde_json::Value;

use rinse_api::graph::{NodeId, RawNode};
use rinse_api::mapping::FieldMapping;
use rinse_api::record::{FallbackReason, SanitizedRecord};
use rinse_api::value::RawValue;

use crate::error::EngineError;
use crate::extract::{Extractor, VisitPath};
use crate::fallback::build_fallback;
use crate::metrics::{Counter, Operation};

/// Apply `mapping` to one raw record.
///
/// Never fails: input that is not a named-field structure yields a fallback
/// record, and a field that cannot be extracted is set to `null` without
/// affecting its siblings. Fields the record does not have are omitted.
pub fn sanitize_record(extractor: &Extractor<'_>, raw: &RawValue, mapping: &FieldMapping) -> SanitizedRecord {
    let started = Instant::now();
    let record = match record_node(extractor, raw) {
        Ok(id) => sanitize_fields(extractor, id, mapping),
        Err(e) => {
            let reason = match e {
                EngineError::DanglingNode(_) => FallbackReason::InvalidInput,
                _ => FallbackReason::NotARecord,
            };
            tracing::warn!(operation = "sanitize_record", error = %e, reason = %reason, "returning fallback record");
            extractor.metrics().incr(Counter::FallbackRecords);
            build_fallback(Some(mapping), reason)
        }
    };
    extractor.metrics().incr(Counter::RecordsSanitized);
    extractor.metrics().record(Operation::SanitizeRecord, started.elapsed());
    record
}

/// Resolve `raw` to a structure node of the extractor's graph.
pub(crate) fn record_node(extractor: &Extractor<'_>, raw: &RawValue) -> Result<NodeId, EngineError> {
    let RawValue::Object(id) = raw else {
        return Err(EngineError::NotARecord(raw.kind()));
    };
    match extractor.graph().node(*id) {
        Some(RawNode::Object(_)) => Ok(*id),
        Some(RawNode::Array(_)) => Err(EngineError::NotARecord("array")),
        None => Err(EngineError::DanglingNode(id.index())),
    }
}

fn sanitize_fields(extractor: &Extractor<'_>, id: NodeId, mapping: &FieldMapping) -> SanitizedRecord {
    let graph = extractor.graph();
    let metrics = extractor.metrics();
    let mut record = SanitizedRecord::new();
    // The record itself is on the path, so a member pointing back at it
    // resolves to null.
    let mut path = VisitPath::rooted(id);

    for field in mapping {
        let Some(value) = graph.member(id, &field.source) else {
            continue;
        };
        match extractor.extract_in(value, &mut path) {
            Ok(v) => {
                metrics.incr(Counter::FieldsExtracted);
                record.insert(field.target.clone(), v);
            }
            Err(e) => {
                tracing::warn!(field = %field.source, error = %e, "field extraction failed, using null");
                metrics.incr(Counter::FieldFailures);
                record.insert(field.target.clone(), Value::Null);
            }
        }
    }
    record
}
