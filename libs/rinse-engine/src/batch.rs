use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tokio::runtime::Handle;

use rinse_api::graph::{RawGraph, RawNode};
use rinse_api::mapping::FieldMapping;
use rinse_api::record::{FallbackReason, SanitizedRecord};
use rinse_api::value::RawValue;

use crate::config::{BatchConfig, ExtractConfig};
use crate::error::EngineError;
use crate::extract::Extractor;
use crate::fallback::fallback_batch;
use crate::large_fields::extract_large_fields;
use crate::metrics::{Counter, Metrics, Operation};
use crate::sanitize::sanitize_record;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-call overrides for [`sanitize_collection`]. `None` means "use the
/// configured default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub batch_size: Option<usize>,
    pub parallel: Option<bool>,
}

impl CollectionOptions {
    pub fn sequential(batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            parallel: Some(false),
        }
    }

    pub fn parallel(batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            parallel: Some(true),
        }
    }

    /// Read options from a loosely typed object (request parameters).
    ///
    /// `batch_size` (or `batchSize`) must be a positive integer and
    /// `parallel` a boolean; anything else is ignored.
    pub fn from_loose(value: &Value) -> Self {
        let batch_size = value
            .get("batch_size")
            .or_else(|| value.get("batchSize"))
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok());
        let parallel = value.get("parallel").and_then(Value::as_bool);
        Self {
            batch_size,
            parallel,
        }
    }
}

/// Batch size actually used for a collection of `len` records.
///
/// Large collections get `len / 20` clamped to the configured bounds, but
/// never less than what was requested.
pub fn effective_batch_size(len: usize, requested: Option<usize>, config: &BatchConfig) -> usize {
    let requested = requested.filter(|n| *n > 0).unwrap_or(config.batch_size).max(1);
    if len > config.auto_scale_threshold {
        let scaled = (len / 20).clamp(config.min_batch_size, config.max_batch_size);
        requested.max(scaled)
    } else {
        requested
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Contiguous slice of the input collection.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    /// Position of the batch in the input collection.
    pub range: Range<usize>,
    pub records: Arc<[RawValue]>,
}

impl Batch {
    fn len(&self) -> usize {
        self.records.len()
    }
}

pub fn partition(records: &[RawValue], size: usize) -> Vec<Batch> {
    let size = size.max(1);
    records
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| {
            let start = index * size;
            Batch {
                index,
                range: start..start + chunk.len(),
                records: chunk.into(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Everything one collection run needs, in a form that can be moved into
/// spawned tasks.
#[derive(Clone)]
pub struct CollectionJob {
    graph: Arc<RawGraph>,
    mapping: Arc<FieldMapping>,
    large_fields: Arc<[String]>,
    metrics: Arc<Metrics>,
    extract: Arc<ExtractConfig>,
}

impl CollectionJob {
    pub fn new(
        graph: Arc<RawGraph>,
        mapping: Arc<FieldMapping>,
        large_fields: Arc<[String]>,
        metrics: Arc<Metrics>,
        extract: Arc<ExtractConfig>,
    ) -> Self {
        Self {
            graph,
            mapping,
            large_fields,
            metrics,
            extract,
        }
    }

    /// Sanitize one record, then merge in its large-object content if it
    /// carries any large field.
    pub async fn process_record(&self, raw: &RawValue) -> SanitizedRecord {
        let mut record = {
            let extractor = Extractor::new(&self.graph, &self.metrics, &self.extract);
            sanitize_record(&extractor, raw, &self.mapping)
        };
        if record.is_fallback() || !self.has_large_field(raw) {
            return record;
        }
        let contents = extract_large_fields(&self.graph, raw, &self.large_fields, &self.metrics).await;
        merge_large_fields(&mut record, &self.mapping, contents);
        record
    }

    pub async fn process_batch(&self, batch: &Batch) -> Vec<SanitizedRecord> {
        let started = Instant::now();
        let records = join_all(batch.records.iter().map(|raw| self.process_record(raw))).await;
        self.metrics.record(Operation::Batch, started.elapsed());
        tracing::debug!(batch = batch.index, start = batch.range.start, end = batch.range.end, "batch done");
        records
    }

    fn has_large_field(&self, raw: &RawValue) -> bool {
        let RawValue::Object(id) = raw else {
            return false;
        };
        self.large_fields
            .iter()
            .any(|name| self.graph.member(*id, name).is_some())
    }

    fn batch_failed(&self, batch: &Batch, error: &dyn std::fmt::Display) -> Vec<SanitizedRecord> {
        tracing::error!(
            operation = "sanitize_collection",
            batch = batch.index,
            start = batch.range.start,
            end = batch.range.end,
            error = %error,
            "batch failed, returning fallback records"
        );
        self.metrics.incr(Counter::BatchFailures);
        self.metrics.add(Counter::FallbackRecords, batch.len() as u64);
        fallback_batch(Some(&self.mapping), FallbackReason::BatchFailed, batch.len())
    }
}

/// Merge fetched large-object content into a sanitized record: non-empty
/// content replaces the mapped field, empty content removes it. Fields the
/// mapping does not name are skipped.
pub fn merge_large_fields(record: &mut SanitizedRecord, mapping: &FieldMapping, contents: BTreeMap<String, String>) {
    for (source, content) in contents {
        let Some(target) = mapping.target_of(&source) else {
            continue;
        };
        if content.is_empty() {
            record.remove(target);
        } else {
            record.insert(target, Value::String(content));
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Sanitize every record of the collection `raw`, in input order.
///
/// Never fails. Input that is not an array yields an empty result; a batch
/// that fails as a whole is replaced by fallbacks; a parallel run that
/// cannot be dispatched is redone sequentially.
pub async fn sanitize_collection(
    job: &CollectionJob,
    raw: &RawValue,
    options: CollectionOptions,
    config: &BatchConfig,
) -> Vec<SanitizedRecord> {
    let records: Vec<RawValue> = match raw {
        RawValue::Array(id) => match job.graph.node(*id) {
            Some(RawNode::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    if records.is_empty() {
        tracing::debug!(kind = raw.kind(), "nothing to sanitize");
        return Vec::new();
    }

    let size = effective_batch_size(records.len(), options.batch_size, config);
    let batches = partition(&records, size);
    let parallel = options.parallel.unwrap_or(config.parallel);
    tracing::debug!(records = records.len(), batch_size = size, batches = batches.len(), parallel, "sanitizing collection");

    if !parallel {
        return run_sequential(job, &batches, records.len()).await;
    }
    match run_parallel(job, &batches, records.len()).await {
        Ok(out) => out,
        Err(e) => {
            tracing::error!(operation = "sanitize_collection", error = %e, "retrying whole collection sequentially");
            job.metrics.incr(Counter::ParallelRetries);
            run_sequential(job, &batches, records.len()).await
        }
    }
}

async fn run_sequential(job: &CollectionJob, batches: &[Batch], total: usize) -> Vec<SanitizedRecord> {
    let mut out = Vec::with_capacity(total);
    for batch in batches {
        match AssertUnwindSafe(job.process_batch(batch)).catch_unwind().await {
            Ok(records) => out.extend(records),
            Err(panic) => out.extend(job.batch_failed(batch, &panic_message(panic.as_ref()))),
        }
    }
    out
}

async fn run_parallel(
    job: &CollectionJob,
    batches: &[Batch],
    total: usize,
) -> Result<Vec<SanitizedRecord>, EngineError> {
    let handle = Handle::try_current().map_err(|e| EngineError::Dispatch(e.to_string()))?;

    let tasks: Vec<_> = batches
        .iter()
        .map(|batch| {
            let job = job.clone();
            let batch = batch.clone();
            handle.spawn(async move { job.process_batch(&batch).await })
        })
        .collect();

    let mut out = Vec::with_capacity(total);
    for (batch, result) in batches.iter().zip(join_all(tasks).await) {
        match result {
            Ok(records) => out.extend(records),
            Err(e) => out.extend(job.batch_failed(batch, &e)),
        }
    }
    Ok(out)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
