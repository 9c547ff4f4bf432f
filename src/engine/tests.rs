//! Tests for engine module

use super::*;
use crate::catalog::load_catalog_from_str;
use crate::config::CatalogConfig;
use crate::http::HttpClientConfig;
use crate::types::{BackoffType, LogLevel};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG: &str = r#"
base_url: http://unused/
streams:
  - name: customer
    path: v2/customer
    record_key: CustomerList
    primary_key: ID
    pagination: {type: page_cursor, page_size: 100}
  - name: sale_invoice
    path: v2/sale/invoice
    record_key: Invoices
    primary_key: TaskID
    params: {SaleID: "{{ parent.SaleID }}"}
    parent: {stream: sale, key: SaleID}
    on_error: emit_empty
  - name: sale
    path: v2/saleList
    record_key: SaleList
    primary_key: SaleID
    pagination: {type: page_cursor, page_size: 100}
    incremental: {cursor_field: Updated, request_param: UpdatedSince}
"#;

fn catalog() -> CatalogConfig {
    load_catalog_from_str(CATALOG).unwrap()
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn engine(server: &MockServer, state: StateManager) -> SyncEngine {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(Some(1))
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(5),
            Duration::from_millis(50),
        )
        .no_rate_limit()
        .build();
    SyncEngine::new(Arc::new(HttpClient::with_config(config).unwrap()), state)
}

async fn run(engine: &SyncEngine, plan: &ExtractionPlan) -> (SyncReport, Vec<Message>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let report = engine.run(plan, tx).await.unwrap();

    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    (report, messages)
}

fn records_of<'a>(messages: &'a [Message], stream: &str) -> Vec<&'a crate::types::Record> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { record } if record.stream == stream => Some(&record.data),
            _ => None,
        })
        .collect()
}

async fn mount_sales(server: &MockServer, sales: serde_json::Value) {
    let total = sales.as_array().map_or(0, Vec::len);
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Page": 1, "Total": total, "SaleList": sales
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_message_kinds() {
    let msg = Message::record("sale", serde_json::Map::new());
    assert!(msg.is_record());
    assert!(!msg.is_state());

    let msg = Message::state(json!({}));
    assert!(msg.is_state());

    assert!(Message::info("x").is_log());
    assert!(Message::warn("x").is_log());
    assert!(Message::error("x").is_log());
}

#[test]
fn test_message_wire_format() {
    let mut data = serde_json::Map::new();
    data.insert("SaleID".to_string(), json!("a"));
    let msg = Message::record("sale", data);

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["type"], "RECORD");
    assert_eq!(value["record"]["stream"], "sale");
    assert_eq!(value["record"]["data"], json!({"SaleID": "a"}));
    assert!(value["record"]["emitted_at"].is_i64());

    let value = serde_json::to_value(Message::state(json!({"sale": {"Updated": "x"}}))).unwrap();
    assert_eq!(value, json!({"type": "STATE", "state": {"sale": {"Updated": "x"}}}));

    let value = serde_json::to_value(Message::warn("slow")).unwrap();
    assert_eq!(value, json!({"type": "LOG", "log": {"level": "WARN", "message": "slow"}}));

    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, Message::log(LogLevel::Warn, "slow"));
}

#[test]
fn test_sync_config() {
    let config = SyncConfig::default();
    assert_eq!(config.max_concurrent_streams, 1);
    assert!(config.initial_watermark.is_none());

    let config = SyncConfig::new().with_max_concurrent_streams(0);
    assert_eq!(config.max_concurrent_streams, 1);
}

// ============================================================================
// ExtractionPlan Tests
// ============================================================================

#[test]
fn test_plan_all_streams_parent_first() {
    let plan = ExtractionPlan::build(&catalog(), None).unwrap();
    assert_eq!(plan.names(), vec!["customer", "sale", "sale_invoice"]);

    let invoice = &plan.streams()[2];
    assert_eq!(
        invoice.kind,
        StreamKind::Dependent {
            parent: "sale".to_string()
        }
    );
    assert_eq!(invoice.dependencies, vec!["sale".to_string()]);
    assert_eq!(
        invoice.parent_config.as_ref().map(|c| c.name.as_str()),
        Some("sale")
    );

    assert_eq!(
        plan.streams()[1].kind,
        StreamKind::Incremental {
            cursor_field: "Updated".to_string()
        }
    );
    assert_eq!(plan.streams()[0].kind, StreamKind::FullRefresh);
}

#[test]
fn test_plan_dependent_without_parent_selected() {
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale_invoice"]))).unwrap();
    assert_eq!(plan.names(), vec!["sale_invoice"]);
    assert!(plan.streams()[0].parent_config.is_some());
}

#[test]
fn test_plan_selection_keeps_catalog_order() {
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale", "customer"]))).unwrap();
    assert_eq!(plan.names(), vec!["customer", "sale"]);
}

#[test]
fn test_plan_unknown_stream() {
    let err = ExtractionPlan::build(&catalog(), Some(&names(&["nope"]))).unwrap_err();
    assert!(matches!(err, Error::StreamNotFound { stream } if stream == "nope"));
}

#[test]
fn test_plan_missing_parent() {
    let yaml = r"
base_url: http://x/
streams:
  - {name: child, path: c, record_key: C, primary_key: ID, parent: {stream: ghost, key: ID}}
";
    let err = ExtractionPlan::build(&load_catalog_from_str(yaml).unwrap(), None).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn test_plan_nested_dependent_rejected() {
    let yaml = r"
base_url: http://x/
streams:
  - {name: a, path: a, record_key: A, primary_key: ID}
  - {name: b, path: b, record_key: B, primary_key: ID, parent: {stream: a, key: ID}}
  - {name: c, path: c, record_key: C, primary_key: ID, parent: {stream: b, key: ID}}
";
    let catalog = load_catalog_from_str(yaml).unwrap();
    let err = ExtractionPlan::build(&catalog, None).unwrap_err();
    assert!(err.to_string().contains("itself a dependent stream"));

    assert!(ExtractionPlan::build(&catalog, Some(&names(&["a", "b"]))).is_ok());
}

// ============================================================================
// SyncEngine Tests
// ============================================================================

#[tokio::test]
async fn test_incremental_commits_max_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .and(query_param("UpdatedSince", "2000-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Page": 1,
            "Total": 2,
            "SaleList": [
                {"SaleID": "1", "Updated": "2021-05-01T00:00:00Z"},
                {"SaleID": "2", "Updated": "2021-04-01T00:00:00Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let engine = engine(&server, state.clone());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale"]))).unwrap();

    let (report, messages) = run(&engine, &plan).await;
    assert!(report.is_success());
    assert_eq!(records_of(&messages, "sale").len(), 2);

    assert_eq!(
        state.to_json().await.unwrap(),
        r#"{"sale":{"Updated":"2021-05-01T00:00:00Z"}}"#
    );

    let last_state = messages.iter().rev().find(|m| m.is_state()).unwrap();
    assert_eq!(
        last_state,
        &Message::state(json!({"sale": {"Updated": "2021-05-01T00:00:00Z"}}))
    );
}

#[tokio::test]
async fn test_request_watermark_fixed_across_pages() {
    let server = MockServer::start().await;
    let page_one: Vec<serde_json::Value> = (0..100)
        .map(|i| json!({"SaleID": i.to_string(), "Updated": "2021-05-01T00:00:00Z"}))
        .collect();

    for (page, sales) in [
        (1, json!(page_one)),
        (2, json!([{"SaleID": "100", "Updated": "2021-06-01T00:00:00Z"}])),
    ] {
        Mock::given(method("GET"))
            .and(path("/v2/saleList"))
            .and(query_param("Page", page.to_string()))
            .and(query_param("UpdatedSince", "2020-01-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Page": page,
                "Total": 101,
                "SaleList": sales
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let state =
        StateManager::from_json(r#"{"sale": {"Updated": "2020-01-01T00:00:00Z"}}"#).unwrap();
    let engine = engine(&server, state.clone());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale"]))).unwrap();

    let (report, messages) = run(&engine, &plan).await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.get("sale").unwrap().stats.pages, 2);
    assert_eq!(records_of(&messages, "sale").len(), 101);
    assert_eq!(
        state.get_cursor("sale", "Updated").await,
        Some(CursorValue::new("2021-06-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_incremental_resumes_from_saved_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .and(query_param("UpdatedSince", "2021-05-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Page": 1, "Total": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let state =
        StateManager::from_json(r#"{"sale": {"Updated": "2021-05-01T00:00:00Z"}}"#).unwrap();
    let engine = engine(&server, state.clone()).with_config(
        SyncConfig::new().with_initial_watermark(Some("2019-01-01T00:00:00Z".to_string())),
    );
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale"]))).unwrap();

    let (report, _) = run(&engine, &plan).await;
    assert!(report.is_success());
    assert_eq!(
        state.get_cursor("sale", "Updated").await,
        Some(CursorValue::new("2021-05-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_failed_stream_is_isolated_and_commits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .and(query_param("Page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Page": 1,
            "Total": 150,
            "SaleList": [{"SaleID": "1", "Updated": "2022-01-01T00:00:00Z"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .and(query_param("Page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Page": 1, "Total": 1, "CustomerList": [{"ID": "c1"}]
        })))
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let engine = engine(&server, state.clone());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["customer", "sale"]))).unwrap();

    let (report, messages) = run(&engine, &plan).await;
    assert!(!report.is_success());
    assert!(report.get("customer").unwrap().is_success());

    match &report.get("sale").unwrap().status {
        StreamStatus::Failed { error, last_status } => {
            assert_eq!(*last_status, Some(503));
            assert!(error.contains("Retries exhausted"));
        }
        other => panic!("Expected Failed, got {other:?}"),
    }

    assert!(state.get_cursor("sale", "Updated").await.is_none());
    assert!(!messages.iter().any(Message::is_state));
    assert!(messages.iter().any(|m| matches!(
        m,
        Message::Log { log } if log.level == LogLevel::Error && log.message.contains("sale")
    )));
}

#[tokio::test]
async fn test_dependent_stream_with_sentinel() {
    let server = MockServer::start().await;
    mount_sales(&server, json!([{"SaleID": 1}, {"SaleID": 2}])).await;
    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .and(query_param("SaleID", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Invoices": [{"TaskID": "t1"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .and(query_param("SaleID", "2"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let engine = engine(&server, state.clone());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale_invoice"]))).unwrap();

    let (report, messages) = run(&engine, &plan).await;
    let invoice = report.get("sale_invoice").unwrap();
    assert!(invoice.is_success());
    assert_eq!(invoice.stats.groups, 2);
    assert_eq!(invoice.stats.sentinels, 1);

    let records: Vec<serde_json::Value> = records_of(&messages, "sale_invoice")
        .into_iter()
        .map(|r| serde_json::Value::Object(r.clone()))
        .collect();
    assert_eq!(records, vec![json!({"TaskID": "t1"}), json!({})]);

    // The parent traversal does not move the parent's cursor
    assert!(state.get_cursor("sale", "Updated").await.is_none());
}

#[tokio::test]
async fn test_parent_and_dependent_traverse_separately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/saleList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Page": 1, "Total": 1, "SaleList": [{"SaleID": "1", "Updated": "2021-05-01T00:00:00Z"}]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Invoices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server, StateManager::in_memory());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale", "sale_invoice"]))).unwrap();

    let (report, _) = run(&engine, &plan).await;
    assert!(report.is_success());
    assert_eq!(
        report.streams.iter().map(|s| s.stream.as_str()).collect::<Vec<_>>(),
        vec!["sale", "sale_invoice"]
    );
}

#[tokio::test]
async fn test_concurrent_streams_report_in_plan_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/customer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Page": 1, "Total": 1, "CustomerList": [{"ID": "c"}]}))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    mount_sales(&server, json!([{"SaleID": "s", "Updated": "2021-01-01T00:00:00Z"}])).await;

    let engine = engine(&server, StateManager::in_memory())
        .with_config(SyncConfig::new().with_max_concurrent_streams(2));
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["customer", "sale"]))).unwrap();

    let (report, messages) = run(&engine, &plan).await;
    assert!(report.is_success());
    assert_eq!(report.streams[0].stream, "customer");
    assert_eq!(report.streams[1].stream, "sale");
    assert_eq!(report.total_records(), 2);
    assert_eq!(records_of(&messages, "customer").len(), 1);
}

#[tokio::test]
async fn test_cancel_before_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let engine = engine(&server, state.clone());
    engine.cancel_handle().cancel();
    let plan = ExtractionPlan::build(&catalog(), None).unwrap();

    let (report, _) = run(&engine, &plan).await;
    assert!(report
        .streams
        .iter()
        .all(|s| s.status == StreamStatus::Cancelled));
    assert!(state.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_closed_channel_cancels() {
    let server = MockServer::start().await;
    mount_sales(&server, json!([{"SaleID": "1", "Updated": "2021-05-01T00:00:00Z"}])).await;

    let state = StateManager::in_memory();
    let engine = engine(&server, state.clone());
    let plan = ExtractionPlan::build(&catalog(), Some(&names(&["sale"]))).unwrap();

    let (tx, rx) = mpsc::channel(8);
    drop(rx);
    let report = engine.run(&plan, tx).await.unwrap();

    assert_eq!(report.streams[0].status, StreamStatus::Cancelled);
    assert!(engine.cancel_handle().is_cancelled());
    assert!(state.get_cursor("sale", "Updated").await.is_none());
}
