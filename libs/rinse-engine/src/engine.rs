use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rinse_api::graph::RawGraph;
use rinse_api::mapping::FieldMapping;
use rinse_api::record::{FallbackReason, SanitizedRecord};
use rinse_api::value::RawValue;

use crate::batch::{self, CollectionJob, CollectionOptions};
use crate::config::{ExtractConfig, RinseConfig};
use crate::error::EngineError;
use crate::extract::Extractor;
use crate::fallback;
use crate::large_fields;
use crate::metrics::{Metrics, MetricsSnapshot, Operation};
use crate::positional;
use crate::sanitize;

/// The sanitization engine: configuration resolved once, plus the metrics
/// every call reports into.
///
/// Calls are independent and may run concurrently; the only state they share
/// is the metrics.
pub struct Engine {
    config: RinseConfig,
    mapping: Arc<FieldMapping>,
    large_fields: Arc<[String]>,
    positional_fields: Vec<String>,
    extract: Arc<ExtractConfig>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mapping", &self.mapping)
            .field("large_fields", &self.large_fields)
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    pub fn new(config: RinseConfig) -> Result<Self, EngineError> {
        Self::with_metrics(config, Arc::new(Metrics::new()))
    }

    /// Build an engine reporting into an existing metrics sink.
    pub fn with_metrics(config: RinseConfig, metrics: Arc<Metrics>) -> Result<Self, EngineError> {
        config.validate()?;

        let mapping = Arc::new(config.mapping());
        let large_fields: Arc<[String]> = config.large_fields().into();
        let positional_fields = config.positional_fields();
        let extract = Arc::new(config.extract.clone());

        tracing::info!(
            fields = mapping.len(),
            large_fields = large_fields.len(),
            batch_size = config.batch.batch_size,
            parallel = config.batch.parallel,
            "sanitization engine ready"
        );

        Ok(Self {
            config,
            mapping,
            large_fields,
            positional_fields,
            extract,
            metrics,
        })
    }

    pub fn config(&self) -> &RinseConfig {
        &self.config
    }

    /// The default field mapping.
    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn large_fields(&self) -> &[String] {
        &self.large_fields
    }

    /// Sanitize one record. `mapping` defaults to the configured mapping.
    pub fn sanitize_record(
        &self,
        graph: &RawGraph,
        raw: &RawValue,
        mapping: Option<&FieldMapping>,
    ) -> SanitizedRecord {
        let extractor = Extractor::new(graph, &self.metrics, &self.extract);
        sanitize::sanitize_record(&extractor, raw, mapping.unwrap_or(self.mapping.as_ref()))
    }

    /// Sanitize a collection of records, merging in large-object content.
    /// Output order matches input order; never fails.
    pub async fn sanitize_collection(
        &self,
        graph: Arc<RawGraph>,
        raw: &RawValue,
        mapping: Option<Arc<FieldMapping>>,
        options: CollectionOptions,
    ) -> Vec<SanitizedRecord> {
        let started = Instant::now();
        let job = CollectionJob::new(
            graph,
            mapping.unwrap_or_else(|| self.mapping.clone()),
            self.large_fields.clone(),
            self.metrics.clone(),
            self.extract.clone(),
        );
        let records = batch::sanitize_collection(&job, raw, options, &self.config.batch).await;
        self.metrics.record(Operation::SanitizeCollection, started.elapsed());
        records
    }

    /// Fetch large-object content for one record. `fields` defaults to the
    /// configured large fields.
    pub async fn extract_large_fields(
        &self,
        graph: &RawGraph,
        raw: &RawValue,
        fields: Option<&[String]>,
    ) -> BTreeMap<String, String> {
        let fields = fields.unwrap_or(&self.large_fields[..]);
        large_fields::extract_large_fields(graph, raw, fields, &self.metrics).await
    }

    /// Name positional rows. `fields` defaults to the configured field order.
    pub fn positional_to_records(
        &self,
        graph: &RawGraph,
        rows: &RawValue,
        fields: Option<&[String]>,
    ) -> Vec<SanitizedRecord> {
        let extractor = Extractor::new(graph, &self.metrics, &self.extract);
        let fields = fields.unwrap_or(self.positional_fields.as_slice());
        positional::positional_to_records(&extractor, rows, fields, &self.mapping)
    }

    /// Degraded record for `mapping` (minimal marker when `None`).
    pub fn fallback(&self, mapping: Option<&FieldMapping>, reason: FallbackReason) -> SanitizedRecord {
        fallback::build_fallback(mapping, reason)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}
