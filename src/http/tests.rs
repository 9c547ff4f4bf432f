//! Tests for the HTTP client module

use super::*;
use crate::auth::ApiKeyAuth;
use crate::config::HttpConfig;
use crate::error::Error;
use crate::types::BackoffType;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(base_url: &str, max_retries: Option<u32>) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(base_url)
        .max_retries(max_retries)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
        .no_rate_limit()
        .build()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, Some(5));
    assert_eq!(config.initial_backoff, Duration::from_secs(60));
    assert_eq!(config.backoff_type, BackoffType::Constant);
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
}

#[test]
fn test_http_client_config_from_settings() {
    let settings = HttpConfig {
        timeout_seconds: 10,
        max_retries: None,
        backoff_seconds: 60,
        backoff_type: BackoffType::Constant,
        requests_per_minute: 30,
    };
    let config = HttpClientConfig::from_settings("https://example.com/api/", &settings);

    assert_eq!(config.base_url.as_deref(), Some("https://example.com/api/"));
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.max_retries, None);
    assert_eq!(config.initial_backoff, Duration::from_secs(60));
    assert_eq!(config.rate_limit.unwrap().requests_per_minute, 30);
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("Page", "1")
        .query("Limit", "100")
        .retry(RetryMode::Never);

    assert_eq!(config.query.get("Page"), Some(&"1".to_string()));
    assert_eq!(config.query.get("Limit"), Some(&"100".to_string()));
    assert_eq!(config.retry, RetryMode::Never);
}

#[test]
fn test_build_url_joins_base_and_path() {
    let client =
        HttpClient::with_config(fast_config("https://inventory.example.com/ExternalApi", None))
            .unwrap();

    let mut query = BTreeMap::new();
    query.insert("Page".to_string(), "2".to_string());
    query.insert("Limit".to_string(), "100".to_string());

    let url = client.build_url("/v2/saleList", &query).unwrap();
    assert_eq!(
        url.as_str(),
        "https://inventory.example.com/ExternalApi/v2/saleList?Limit=100&Page=2"
    );
}

#[test]
fn test_build_url_encodes_values() {
    let client = HttpClient::with_config(fast_config("https://example.com/", None)).unwrap();
    let mut query = BTreeMap::new();
    query.insert(
        "UpdatedSince".to_string(),
        "2021-05-01T00:00:00+10:00".to_string(),
    );

    let url = client.build_url("v2/saleList", &query).unwrap();
    assert!(url.as_str().ends_with("UpdatedSince=2021-05-01T00%3A00%3A00%2B10%3A00"));
}

#[test]
fn test_calculate_backoff() {
    let constant = HttpClient::with_config(
        HttpClientConfig::builder()
            .backoff(
                BackoffType::Constant,
                Duration::from_secs(60),
                Duration::from_secs(600),
            )
            .build(),
    )
    .unwrap();
    assert_eq!(constant.calculate_backoff(0), Duration::from_secs(60));
    assert_eq!(constant.calculate_backoff(7), Duration::from_secs(60));

    let exponential = HttpClient::with_config(
        HttpClientConfig::builder()
            .backoff(
                BackoffType::Exponential,
                Duration::from_secs(1),
                Duration::from_secs(10),
            )
            .build(),
    )
    .unwrap();
    assert_eq!(exponential.calculate_backoff(2), Duration::from_secs(4));
    assert_eq!(exponential.calculate_backoff(40), Duration::from_secs(10));
}

#[tokio::test]
async fn test_get_json_sends_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/customer"))
        .and(header("api-auth-applicationkey", "key-1"))
        .and(header("api-auth-accountid", "acc-1"))
        .and(query_param("Page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Page": 1, "Total": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = ApiKeyAuth::new("acc-1", "key-1").unwrap();
    let client = HttpClient::with_auth(fast_config(&server.uri(), Some(0)), auth).unwrap();

    let body = client
        .get_json("v2/customer", &RequestConfig::new().query("Page", "1"))
        .await
        .unwrap();
    assert_eq!(body["Total"], 0);
}

#[tokio::test]
async fn test_get_json_retries_non_200() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/product"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(3))).unwrap();
    let body = client
        .get_json("v2/product", &RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_get_json_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/product"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(2))).unwrap();
    let err = client
        .get_json("v2/product", &RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::RetriesExhausted {
            attempts: 3,
            last_status: Some(503)
        }
    ));
    assert_eq!(err.http_status_code(), Some(503));
}

#[tokio::test]
async fn test_get_json_never_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .respond_with(ResponseTemplate::new(400).set_body_string("no invoice"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(5))).unwrap();
    let err = client
        .get_json(
            "v2/sale/invoice",
            &RequestConfig::new().retry(RetryMode::Never),
        )
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "no invoice");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_json_invalid_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/product"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(0))).unwrap();
    let err = client
        .get_json("v2/product", &RequestConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_get_json_transient_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Invoices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(3))).unwrap();
    let body = client
        .get_json(
            "v2/sale/invoice",
            &RequestConfig::new().retry(RetryMode::Transient),
        )
        .await
        .unwrap();
    assert_eq!(body, json!({"Invoices": []}));
}

#[tokio::test]
async fn test_get_json_transient_returns_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/sale/invoice"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::with_config(fast_config(&server.uri(), Some(3))).unwrap();
    let err = client
        .get_json(
            "v2/sale/invoice",
            &RequestConfig::new().retry(RetryMode::Transient),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
}
