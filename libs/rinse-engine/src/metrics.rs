use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Event counters kept by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    RecordsSanitized,
    FieldsExtracted,
    FieldFailures,
    FallbackRecords,
    BatchFailures,
    CircularReferences,
    DepthLimitHits,
    LargeObjectFetches,
    LargeObjectFailures,
    ValidationPassthroughs,
    ParallelRetries,
}

const COUNTERS: usize = 11;

impl Counter {
    fn slot(self) -> usize {
        self as usize
    }
}

/// Timed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SanitizeRecord,
    SanitizeCollection,
    ExtractLargeFields,
    Batch,
}

const OPERATIONS: [Operation; 4] = [
    Operation::SanitizeRecord,
    Operation::SanitizeCollection,
    Operation::ExtractLargeFields,
    Operation::Batch,
];

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::SanitizeRecord => "sanitize_record",
            Operation::SanitizeCollection => "sanitize_collection",
            Operation::ExtractLargeFields => "extract_large_fields",
            Operation::Batch => "batch",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct Timing {
    count: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
}

/// Engine instrumentation: lock-free counters and timing aggregates.
///
/// Owned by an [`Engine`](crate::Engine) and shared with its batch tasks via
/// `Arc`. Never consulted for output decisions.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: [AtomicU64; COUNTERS],
    timings: [Timing; OPERATIONS.len()],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter.slot()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn record(&self, op: Operation, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let timing = &self.timings[op.slot()];
        timing.count.fetch_add(1, Ordering::Relaxed);
        timing.total_micros.fetch_add(micros, Ordering::Relaxed);
        timing.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
        for t in &self.timings {
            t.count.store(0, Ordering::Relaxed);
            t.total_micros.store(0, Ordering::Relaxed);
            t.max_micros.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timings = OPERATIONS
            .iter()
            .map(|op| {
                let t = &self.timings[op.slot()];
                (
                    op.as_str(),
                    TimingSnapshot {
                        count: t.count.load(Ordering::Relaxed),
                        total_micros: t.total_micros.load(Ordering::Relaxed),
                        max_micros: t.max_micros.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            records_sanitized: self.get(Counter::RecordsSanitized),
            fields_extracted: self.get(Counter::FieldsExtracted),
            field_failures: self.get(Counter::FieldFailures),
            fallback_records: self.get(Counter::FallbackRecords),
            batch_failures: self.get(Counter::BatchFailures),
            circular_references: self.get(Counter::CircularReferences),
            depth_limit_hits: self.get(Counter::DepthLimitHits),
            large_object_fetches: self.get(Counter::LargeObjectFetches),
            large_object_failures: self.get(Counter::LargeObjectFailures),
            validation_passthroughs: self.get(Counter::ValidationPassthroughs),
            parallel_retries: self.get(Counter::ParallelRetries),
            timings,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingSnapshot {
    pub count: u64,
    pub total_micros: u64,
    pub max_micros: u64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_sanitized: u64,
    pub fields_extracted: u64,
    pub field_failures: u64,
    pub fallback_records: u64,
    pub batch_failures: u64,
    pub circular_references: u64,
    pub depth_limit_hits: u64,
    pub large_object_fetches: u64,
    pub large_object_failures: u64,
    pub validation_passthroughs: u64,
    pub parallel_retries: u64,
    pub timings: BTreeMap<&'static str, TimingSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_and_reset() {
        let m = Metrics::new();
        m.incr(Counter::FieldFailures);
        m.add(Counter::FallbackRecords, 3);
        m.record(Operation::Batch, Duration::from_micros(40));
        m.record(Operation::Batch, Duration::from_micros(10));

        let snap = m.snapshot();
        assert_eq!(snap.field_failures, 1);
        assert_eq!(snap.fallback_records, 3);
        assert_eq!(
            snap.timings["batch"],
            TimingSnapshot { count: 2, total_micros: 50, max_micros: 40 }
        );

        m.reset();
        let snap = m.snapshot();
        assert_eq!(snap.field_failures, 0);
        assert_eq!(snap.fallback_records, 0);
        assert_eq!(snap.timings["batch"], TimingSnapshot::default());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let m = std::sync::Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        m.incr(Counter::RecordsSanitized);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.get(Counter::RecordsSanitized), 8000);
    }
}
