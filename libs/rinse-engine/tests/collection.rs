use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};

use rinse_api::error::DriverError;
use rinse_api::graph::RawGraph;
use rinse_api::large_object::{InlineLargeObject, LargeObject};
use rinse_api::mapping::FieldMapping;
use rinse_api::record::SanitizedRecord;
use rinse_api::value::RawValue;
use rinse_engine::driver::ResultSet;
use rinse_engine::{CollectionOptions, Engine, RinseConfig};

/// Large object whose driver blows up mid-fetch.
struct PanickingLob;

impl LargeObject for PanickingLob {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriverError>> + Send + '_>> {
        Box::pin(async { explode() })
    }
}

fn explode() -> Result<Option<String>, DriverError> {
    panic!("driver crashed while streaming large object")
}

/// Large object whose fetch reports a driver error.
struct FailingLob;

impl LargeObject for FailingLob {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<String>, DriverError>> + Send + '_>> {
        Box::pin(async { Err(DriverError::io("lob locator expired")) })
    }
}

fn engine() -> Engine {
    Engine::new(RinseConfig::default()).unwrap()
}

fn to_json(records: Vec<SanitizedRecord>) -> Value {
    Value::Array(records.into_iter().map(SanitizedRecord::into_json).collect())
}

fn articles(graph: &mut RawGraph, n: i64) -> RawValue {
    let rows: Vec<RawValue> = (0..n)
        .map(|i| {
            graph.object([
                ("ID", RawValue::from(i)),
                ("TITLE", RawValue::text(format!(" Article {i} "))),
            ])
        })
        .collect();
    graph.array(rows)
}

#[test]
fn self_reference_terminates_with_other_fields_populated() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let rec = graph.object([("ID", RawValue::from(1_i64)), ("TITLE", RawValue::text("Loop"))]);
    let id = rec.node_id().unwrap();
    graph.insert(id, "SELF", rec.clone()).unwrap();

    let mapping = FieldMapping::from_names(["ID", "TITLE", "SELF"]);
    let out = engine.sanitize_record(&graph, &rec, Some(&mapping));
    assert_eq!(out.into_json(), json!({"id": 1, "title": "Loop", "self": null}));
    assert_eq!(engine.metrics().circular_references, 1);
}

#[test]
fn wrapped_fields_unwrap() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!({
        "ID": {"$value": 42},
        "TITLE": {"$value": "  Wrapped\n"},
        "STATUS": {"$value": "published"},
    }));
    let out = engine.sanitize_record(&rs.graph, &rs.root, None);
    assert_eq!(out.into_json(), json!({"id": 42, "title": "Wrapped", "status": "published"}));
}

#[test]
fn positional_rows_become_records() {
    let engine = engine();
    let fields: Vec<String> = ["ID", "TITLE", "SLUG"].iter().map(|s| s.to_string()).collect();

    let rs = ResultSet::from_json(&json!([[1, "A", "a"]]));
    let out = engine.positional_to_records(&rs.graph, &rs.root, Some(fields.as_slice()));
    assert_eq!(to_json(out), json!([{"id": 1, "title": "A", "slug": "a"}]));

    let rs = ResultSet::from_json(&json!([[1, "A"]]));
    let out = engine.positional_to_records(&rs.graph, &rs.root, Some(fields.as_slice()));
    assert_eq!(to_json(out), json!([{"id": 1, "title": "A"}]));
}

#[tokio::test]
async fn null_large_field_is_empty_string() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!({"CONTENT": null}));
    let out = engine.extract_large_fields(&rs.graph, &rs.root, None).await;
    assert_eq!(out.len(), 2);
    assert_eq!(out["CONTENT"], "");
    assert_eq!(out["SOURCES"], "");
}

#[tokio::test]
async fn sequential_batches_keep_order() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let raw = articles(&mut graph, 150);

    let out = engine
        .sanitize_collection(Arc::new(graph), &raw, None, CollectionOptions::sequential(50))
        .await;
    assert_eq!(out.len(), 150);
    assert_eq!(out[0].get("id"), Some(&json!(0)));
    assert_eq!(out[0].get("title"), Some(&json!("Article 0")));
    assert_eq!(out[149].get("id"), Some(&json!(149)));
    assert!(out.iter().all(|r| !r.is_fallback()));
    assert_eq!(engine.metrics().timings["batch"].count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_batches_keep_order() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let raw = articles(&mut graph, 230);

    let out = engine
        .sanitize_collection(Arc::new(graph), &raw, None, CollectionOptions::parallel(20))
        .await;
    let ids: Vec<i64> = out.iter().map(|r| r.get("id").and_then(Value::as_i64).unwrap()).collect();
    assert_eq!(ids, (0..230).collect::<Vec<_>>());
    assert_eq!(engine.metrics().parallel_retries, 0);
}

#[tokio::test]
async fn failing_field_does_not_degrade_siblings() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!([
        {"ID": 1, "TITLE": "ok"},
        {"ID": 2, "TITLE": {"$unreadable": "ORA-01555 snapshot too old"}},
        {"ID": 3, "TITLE": "fine"},
    ]));
    let (graph, root) = rs.into_parts();

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::default())
        .await;
    assert_eq!(
        to_json(out),
        json!([
            {"id": 1, "title": "ok"},
            {"id": 2, "title": null},
            {"id": 3, "title": "fine"},
        ])
    );
    let metrics = engine.metrics();
    assert_eq!(metrics.field_failures, 1);
    assert_eq!(metrics.fallback_records, 0);
}

#[tokio::test]
async fn non_collections_yield_nothing() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!(null));
    let (graph, root) = rs.into_parts();
    let graph = Arc::new(graph);
    assert!(engine
        .sanitize_collection(graph.clone(), &root, None, CollectionOptions::default())
        .await
        .is_empty());

    assert!(engine
        .sanitize_collection(graph, &RawValue::text("not a collection"), None, CollectionOptions::default())
        .await
        .is_empty());

    let rs = ResultSet::from_json(&json!({"ID": 1}));
    let (graph, root) = rs.into_parts();
    assert!(engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::default())
        .await
        .is_empty());
}

#[tokio::test]
async fn large_objects_merge_into_records() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!([
        {"ID": 1, "CONTENT": {"$lob": "<p>body</p>"}, "SOURCES": {"$lob": null}},
        {"ID": 2, "TITLE": "no large fields"},
    ]));
    let (graph, root) = rs.into_parts();

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::default())
        .await;
    assert_eq!(
        to_json(out),
        json!([
            {"id": 1, "content": "<p>body</p>"},
            {"id": 2, "title": "no large fields"},
        ])
    );
    assert_eq!(engine.metrics().large_object_fetches, 2);
}

fn with_panicking_record(n: i64, bad: i64) -> (RawGraph, RawValue) {
    let mut graph = RawGraph::new();
    let rows: Vec<RawValue> = (0..n)
        .map(|i| {
            let content = if i == bad {
                RawValue::large_object(PanickingLob)
            } else {
                RawValue::large_object(InlineLargeObject::new(format!("body {i}")))
            };
            graph.object([("ID", RawValue::from(i)), ("CONTENT", content)])
        })
        .collect();
    let root = graph.array(rows);
    (graph, root)
}

#[tokio::test]
async fn failed_batch_becomes_fallbacks_sequential() {
    let engine = engine();
    let (graph, root) = with_panicking_record(30, 12);

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::sequential(10))
        .await;
    assert_eq!(out.len(), 30);
    for (i, rec) in out.iter().enumerate() {
        if (10..20).contains(&i) {
            assert!(rec.is_fallback(), "record {i} should be a fallback");
            assert_eq!(rec.fallback_reason(), Some("batch_failed"));
            assert_eq!(rec.get("id"), Some(&Value::Null));
        } else {
            assert_eq!(rec.get("content"), Some(&json!(format!("body {i}"))));
        }
    }
    let metrics = engine.metrics();
    assert_eq!(metrics.batch_failures, 1);
    assert_eq!(metrics.fallback_records, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_batch_becomes_fallbacks_parallel() {
    let engine = engine();
    let (graph, root) = with_panicking_record(30, 25);

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::parallel(10))
        .await;
    assert_eq!(out.len(), 30);
    assert!(out[..20].iter().all(|r| !r.is_fallback()));
    assert!(out[20..].iter().all(SanitizedRecord::is_fallback));
    assert_eq!(out[5].get("id"), Some(&json!(5)));
    assert_eq!(engine.metrics().batch_failures, 1);
}

#[test]
fn parallel_without_runtime_retries_sequentially() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let raw = articles(&mut graph, 25);

    let out = futures::executor::block_on(engine.sanitize_collection(
        Arc::new(graph),
        &raw,
        None,
        CollectionOptions::parallel(10),
    ));
    assert_eq!(out.len(), 25);
    assert_eq!(out[24].get("id"), Some(&json!(24)));
    assert_eq!(engine.metrics().parallel_retries, 1);
}

#[tokio::test]
async fn large_collections_auto_scale_batch_size() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let raw = articles(&mut graph, 3000);

    let out = engine
        .sanitize_collection(Arc::new(graph), &raw, None, CollectionOptions::default())
        .await;
    assert_eq!(out.len(), 3000);
    // 3000 / 20 = 150 per batch.
    assert_eq!(engine.metrics().timings["batch"].count, 20);
}

#[tokio::test]
async fn loose_options_fall_back_to_defaults() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let raw = articles(&mut graph, 5);

    let options = CollectionOptions::from_loose(&json!({"batchSize": "lots", "parallel": 1}));
    let out = engine.sanitize_collection(Arc::new(graph), &raw, None, options).await;
    assert_eq!(out.len(), 5);
    assert_eq!(engine.metrics().timings["batch"].count, 1);
}

#[tokio::test]
async fn failed_fetch_drops_the_field() {
    let engine = engine();
    let mut graph = RawGraph::new();
    let rec = graph.object([
        ("ID", RawValue::from(1_i64)),
        ("CONTENT", RawValue::large_object(FailingLob)),
        ("SOURCES", RawValue::large_object(InlineLargeObject::new("[\"a\"]"))),
    ]);
    let root = graph.array([rec]);

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::default())
        .await;
    assert_eq!(to_json(out), json!([{"id": 1, "sources": "[\"a\"]"}]));
    let metrics = engine.metrics();
    assert_eq!(metrics.large_object_failures, 1);
    assert_eq!(metrics.fallback_records, 0);
}

#[tokio::test]
async fn non_record_items_become_fallbacks() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!([1, "row", {"ID": 2}, [3]]));
    let (graph, root) = rs.into_parts();

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, None, CollectionOptions::default())
        .await;
    assert_eq!(out.len(), 4);
    for i in [0, 1, 3] {
        assert!(out[i].is_fallback(), "item {i} should be a fallback");
        assert_eq!(out[i].fallback_reason(), Some("not_a_record"));
        assert_eq!(out[i].get("title"), Some(&Value::Null));
    }
    assert_eq!(out[2].clone().into_json(), json!({"id": 2}));
    assert_eq!(engine.metrics().fallback_records, 3);
}

#[tokio::test]
async fn marker_named_target_cannot_fake_a_fallback() {
    let engine = engine();
    let rs = ResultSet::from_json(&json!([
        {"ID": 1, "FLAG": true, "CONTENT": {"$lob": "body"}},
    ]));
    let (graph, root) = rs.into_parts();
    let mapping = FieldMapping::new([("ID", "id"), ("FLAG", "_is_fallback"), ("CONTENT", "content")]);

    let out = engine
        .sanitize_collection(Arc::new(graph), &root, Some(Arc::new(mapping)), CollectionOptions::default())
        .await;
    assert!(!out[0].is_fallback());
    assert_eq!(to_json(out), json!([{"id": 1, "content": "body"}]));
}
