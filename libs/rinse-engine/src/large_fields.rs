use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::join_all;

use rinse_api::graph::{NodeId, RawGraph, RawNode};
use rinse_api::value::{RawValue, Scalar};

use crate::metrics::{Counter, Metrics, Operation};

/// Resolve the content of each named large-object field of one record.
///
/// Every requested name is present in the result; anything that yields no
/// content maps to `""`. Input that is not a structure yields an empty map.
/// Fetches run concurrently.
pub async fn extract_large_fields(
    graph: &RawGraph,
    raw: &RawValue,
    fields: &[String],
    metrics: &Metrics,
) -> BTreeMap<String, String> {
    let Some(id) = structure(graph, raw) else {
        tracing::debug!(kind = raw.kind(), "large field extraction on non-record input");
        return BTreeMap::new();
    };

    let started = Instant::now();
    let resolved = join_all(fields.iter().map(|name| async move {
        let content = match graph.member(id, name) {
            Some(value) => resolve(name, value, metrics).await,
            None => String::new(),
        };
        (name.clone(), content)
    }))
    .await;
    metrics.record(Operation::ExtractLargeFields, started.elapsed());

    resolved.into_iter().collect()
}

fn structure(graph: &RawGraph, raw: &RawValue) -> Option<NodeId> {
    match raw {
        RawValue::Object(id) => match graph.node(*id)? {
            RawNode::Object(_) => Some(*id),
            RawNode::Array(_) => None,
        },
        _ => None,
    }
}

async fn resolve(name: &str, value: &RawValue, metrics: &Metrics) -> String {
    match value {
        RawValue::LargeObject(handle) => {
            metrics.incr(Counter::LargeObjectFetches);
            match handle.fetch().await {
                Ok(content) => content.unwrap_or_default(),
                Err(e) => {
                    metrics.incr(Counter::LargeObjectFailures);
                    tracing::warn!(field = %name, error = %e, "large object fetch failed");
                    String::new()
                }
            }
        }
        RawValue::Wrapped(inner) => render(inner).unwrap_or_default(),
        RawValue::Scalar(Scalar::Text(s)) => s.clone(),
        RawValue::Scalar(Scalar::Null) => String::new(),
        other => {
            tracing::warn!(field = %name, kind = other.kind(), "unexpected large field value, using empty content");
            String::new()
        }
    }
}

/// Text rendering of a wrapped value.
fn render(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Scalar(Scalar::Null) => None,
        RawValue::Scalar(Scalar::Bool(b)) => Some(b.to_string()),
        RawValue::Scalar(Scalar::Int(i)) => Some(i.to_string()),
        RawValue::Scalar(Scalar::Float(f)) => f.is_finite().then(|| f.to_string()),
        RawValue::Scalar(Scalar::Text(s)) | RawValue::Scalar(Scalar::Decimal(s)) => Some(s.clone()),
        RawValue::Wrapped(inner) => render(inner),
        RawValue::Opaque(text) => text.clone(),
        _ => None,
    }
}
