use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

use rinse_api::graph::{NodeId, RawGraph, RawNode};
use rinse_api::value::RawValue;

use crate::config::ExtractConfig;
use crate::error::EngineError;
use crate::metrics::{Counter, Metrics};
use crate::validate;

/// Compound nodes on the current recursion path.
///
/// Entered on the way down, left on the way up, so only back-edges (a node
/// reaching one of its own ancestors) are detected. A node shared by two
/// sibling branches is visited once per branch.
#[derive(Debug, Default)]
pub struct VisitPath {
    ids: Vec<NodeId>,
}

impl VisitPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path that already contains `root` (the record being sanitized).
    pub fn rooted(root: NodeId) -> Self {
        Self { ids: vec![root] }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn depth(&self) -> usize {
        self.ids.len()
    }

    fn enter(&mut self, id: NodeId) {
        self.ids.push(id);
    }

    fn leave(&mut self) {
        self.ids.pop();
    }
}

/// Reduces raw driver values to plain JSON values.
///
/// Synchronous: large-object handles are left for the large-object
/// extractor and come out as a `null` placeholder.
#[derive(Clone, Copy)]
pub struct Extractor<'a> {
    graph: &'a RawGraph,
    metrics: &'a Metrics,
    config: &'a ExtractConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(graph: &'a RawGraph, metrics: &'a Metrics, config: &'a ExtractConfig) -> Self {
        Self {
            graph,
            metrics,
            config,
        }
    }

    pub fn graph(&self) -> &'a RawGraph {
        self.graph
    }

    pub fn metrics(&self) -> &'a Metrics {
        self.metrics
    }

    /// Extract a standalone value with a fresh path.
    pub fn extract(&self, value: &RawValue) -> Result<Value, EngineError> {
        let mut path = VisitPath::new();
        self.extract_in(value, &mut path)
    }

    /// Extract `value` below the nodes already on `path`.
    ///
    /// Errors only when `value` itself cannot be read. Failures further down
    /// are absorbed: a bad array element becomes `null`, a bad structure
    /// member is dropped.
    pub fn extract_in(&self, value: &RawValue, path: &mut VisitPath) -> Result<Value, EngineError> {
        match value {
            RawValue::Scalar(s) => Ok(validate::validate_counted(s.clone(), self.metrics).into_json()),
            RawValue::Wrapped(inner) => match self.extract_in(inner, path) {
                Ok(v) => Ok(v),
                Err(e) => {
                    tracing::warn!(error = %e, "wrapped value accessor failed, using null");
                    Ok(Value::Null)
                }
            },
            RawValue::LargeObject(_) => {
                tracing::debug!("large object deferred to content fetch");
                Ok(Value::Null)
            }
            RawValue::Array(id) | RawValue::Object(id) => self.extract_node(*id, path),
            RawValue::Timestamp(ms) => Ok(iso_timestamp(*ms).map(Value::String).unwrap_or(Value::Null)),
            RawValue::Callable => Ok(Value::Null),
            RawValue::Opaque(text) => Ok(text
                .as_deref()
                .map(|t| Value::String(validate::clean_text(t)))
                .unwrap_or(Value::Null)),
            RawValue::Unreadable(e) => Err(EngineError::Driver(e.clone())),
        }
    }

    fn extract_node(&self, id: NodeId, path: &mut VisitPath) -> Result<Value, EngineError> {
        let node = self
            .graph
            .node(id)
            .ok_or(EngineError::DanglingNode(id.index()))?;

        if path.contains(id) {
            self.metrics.incr(Counter::CircularReferences);
            tracing::warn!(node = id.index(), "circular reference, using null");
            return Ok(Value::Null);
        }
        if path.depth() >= self.config.max_depth {
            self.metrics.incr(Counter::DepthLimitHits);
            tracing::warn!(node = id.index(), max_depth = self.config.max_depth, "nesting too deep, using null");
            return Ok(Value::Null);
        }

        path.enter(id);
        let value = match node {
            RawNode::Array(items) => Value::Array(self.extract_items(items, path)),
            RawNode::Object(members) => Value::Object(self.extract_members(members, path)),
        };
        path.leave();
        Ok(value)
    }

    fn extract_items(&self, items: &[RawValue], path: &mut VisitPath) -> Vec<Value> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.extract_in(item, path) {
                Ok(v) => out.push(v),
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "array element extraction failed, using null");
                    out.push(Value::Null);
                }
            }
        }
        out
    }

    fn extract_members(&self, members: &[(String, RawValue)], path: &mut VisitPath) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, value) in members {
            if self.is_private(name) || matches!(value, RawValue::Callable) {
                continue;
            }
            match self.extract_in(value, path) {
                Ok(v) => {
                    out.insert(name.clone(), v);
                }
                Err(e) => {
                    tracing::warn!(member = %name, error = %e, "member extraction failed, omitting");
                }
            }
        }
        out
    }

    fn is_private(&self, name: &str) -> bool {
        !self.config.private_prefix.is_empty() && name.starts_with(&self.config.private_prefix)
    }
}

/// ISO-8601 UTC with millisecond precision (`2024-03-01T12:00:00.000Z`).
/// `None` for instants outside the calendar range.
pub fn iso_timestamp(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
