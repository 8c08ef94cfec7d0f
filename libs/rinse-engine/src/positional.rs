use serde_json::Value;

use rinse_api::graph::RawNode;
use rinse_api::mapping::FieldMapping;
use rinse_api::record::SanitizedRecord;
use rinse_api::value::RawValue;

use crate::extract::{Extractor, VisitPath};
use crate::metrics::Counter;

/// Turn rows of positional values into named records.
///
/// Cell `i` is named after `fields[i]`, renamed through `mapping` when it has
/// an entry and lowercased otherwise. Short rows omit the trailing fields,
/// extra cells are ignored, and a row that is not an array becomes an empty
/// record. Input that is not an array of rows yields no records.
pub fn positional_to_records(
    extractor: &Extractor<'_>,
    rows: &RawValue,
    fields: &[String],
    mapping: &FieldMapping,
) -> Vec<SanitizedRecord> {
    let graph = extractor.graph();
    let Some(RawNode::Array(rows)) = rows.node_id().and_then(|id| graph.node(id)) else {
        tracing::debug!(kind = rows.kind(), "positional input is not a row set");
        return Vec::new();
    };

    let names: Vec<String> = fields
        .iter()
        .map(|f| {
            mapping
                .target_of(f)
                .map(str::to_string)
                .unwrap_or_else(|| f.to_lowercase())
        })
        .collect();

    rows.iter()
        .enumerate()
        .map(|(i, row)| positional_row(extractor, i, row, &names))
        .collect()
}

fn positional_row(extractor: &Extractor<'_>, index: usize, row: &RawValue, names: &[String]) -> SanitizedRecord {
    let mut record = SanitizedRecord::new();
    let Some(RawNode::Array(cells)) = row.node_id().and_then(|id| extractor.graph().node(id)) else {
        tracing::warn!(row = index, kind = row.kind(), "positional row is not an array, using empty record");
        return record;
    };
    let mut path = row.node_id().map(VisitPath::rooted).unwrap_or_default();

    for (name, cell) in names.iter().zip(cells) {
        match extractor.extract_in(cell, &mut path) {
            Ok(v) => {
                extractor.metrics().incr(Counter::FieldsExtracted);
                record.insert(name.clone(), v);
            }
            Err(e) => {
                tracing::warn!(row = index, field = %name, error = %e, "cell extraction failed, using null");
                extractor.metrics().incr(Counter::FieldFailures);
                record.insert(name.clone(), Value::Null);
            }
        }
    }
    record
}
