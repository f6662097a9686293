use pretty_assertions::assert_eq;
use ratelink_adapters::*;
use ratelink_core::{CancellationToken, DataType, ErrorKind, IntegrationError, Record};
use ratelink_mapping::{FieldMapping, MappingSpec};
use ratelink_transport::{AuthMethod, ConnectionConfig, MemoryRequestLogger};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rate_mapping() -> MappingSpec {
    MappingSpec::new()
        .field("attorney_id", FieldMapping::new("tk.id"))
        .field("attorney_name", FieldMapping::new("name"))
        .field("rate_amount", FieldMapping::new("rate").with_transform("float", Value::Null))
}

fn base_profile(server: &MockServer) -> VendorProfile {
    let connection = ConnectionConfig::new(server.uri(), AuthMethod::None)
        .with_max_retries(1)
        .with_retry_delays(Duration::from_millis(1), Duration::from_millis(2));
    VendorProfile::new("acme", connection)
        .with_endpoint(
            DataType::Rate,
            EndpointConfig::new("/rates")
                .with_results_path("data")
                .with_send_path("/rates/batch"),
        )
        .with_mapping(DataType::Rate, rate_mapping())
}

fn adapter(profile: VendorProfile) -> RestAdapter {
    RestAdapter::from_profile(profile, &AdapterContext::default()).unwrap()
}

fn vendor_rates(range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| json!({"tk": {"id": format!("T-{}", i)}, "name": format!("Attorney {}", i), "rate": format!("{}.50", 100 + i)}))
        .collect()
}

fn canonical(i: usize) -> Record {
    json!({"attorney_id": format!("T-{}", i), "attorney_name": format!("A{}", i), "rate_amount": 500.0})
        .as_object()
        .cloned()
        .unwrap()
}

// ===== Pagination Tests =====

#[tokio::test]
async fn test_offset_limit_drains_250_items_in_order() {
    let server = MockServer::start().await;

    for (offset, end) in [(0, 100), (100, 200), (200, 250)] {
        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("offset", offset.to_string()))
            .and(query_param("limit", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": vendor_rates(offset..end), "total_count": 250})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let profile = base_profile(&server).with_pagination(PaginationConfig::offset_limit(100, Some("total_count")));
    let outcome = adapter(profile)
        .get_data(DataType::Rate, FetchParams::new())
        .await
        .unwrap();

    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.records.len(), 250);
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert!(!outcome.cancelled);

    let ids: Vec<String> = outcome
        .records
        .iter()
        .map(|r| r["attorney_id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..250).map(|i| format!("T-{}", i)).collect();
    assert_eq!(ids, expected);
    assert_eq!(outcome.records[0]["rate_amount"], json!(100.5));
    assert_eq!(outcome.records[0]["attorney_name"], json!("Attorney 0"));
}

#[tokio::test]
async fn test_page_number_with_total_pages() {
    let server = MockServer::start().await;

    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path("/rates"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": vendor_rates((page - 1) * 2..page * 2),
                "meta": {"pages": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let pagination = PaginationConfig::new(PaginationStyle::PageNumber {
        page_param: "page".into(),
        size_param: "per_page".into(),
        page_size: 2,
        first_page: 1,
        total_pages_path: Some("meta.pages".into()),
        total_path: None,
    });
    let outcome = adapter(base_profile(&server).with_pagination(pagination))
        .get_data(DataType::Rate, FetchParams::new())
        .await
        .unwrap();

    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.records.len(), 4);
}

#[tokio::test]
async fn test_cursor_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rates"))
        .and(query_param("cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": vendor_rates(2..3), "next": null})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rates"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": vendor_rates(0..2), "next": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let pagination = PaginationConfig::new(PaginationStyle::Cursor {
        cursor_param: "cursor".into(),
        next_cursor_path: "next".into(),
        size_param: None,
        page_size: None,
    });
    let outcome = adapter(base_profile(&server).with_pagination(pagination))
        .get_data(DataType::Rate, FetchParams::new())
        .await
        .unwrap();

    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[2]["attorney_id"], json!("T-2"));
}

#[tokio::test]
async fn test_next_link_pagination() {
    let server = MockServer::start().await;
    let next = format!("{}/rates/page-2", server.uri());

    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": vendor_rates(0..1), "links": {"next": next}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rates/page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": vendor_rates(1..2), "links": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let pagination = PaginationConfig::new(PaginationStyle::NextLink {
        next_url_path: "links.next".into(),
    });
    let outcome = adapter(base_profile(&server).with_pagination(pagination))
        .get_data(DataType::Rate, FetchParams::new())
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test]
async fn test_cancelled_fetch_sends_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();
    let outcome = adapter(base_profile(&server))
        .get_data(DataType::Rate, FetchParams::new().with_cancellation(token))
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.records.is_empty());
}

// ===== Error Propagation Tests =====

#[tokio::test]
async fn test_transport_errors_keep_their_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(base_profile(&server))
        .get_data(DataType::Rate, FetchParams::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert!(matches!(err, AdapterError::Integration(IntegrationError::NotFound { .. })));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unsupported_data_type() {
    let server = MockServer::start().await;
    let err = adapter(base_profile(&server))
        .get_data(DataType::Billing, FetchParams::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AdapterError::UnsupportedDataType { data_type: DataType::Billing, .. }
    ));
}

// ===== Send Tests =====

#[tokio::test]
async fn test_send_data_batches_reverse_mapped_records() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rates/batch"))
        .and(body_partial_json(json!({"records": [{"tk": {"id": "T-0"}, "name": "A0", "rate": 500.0}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": [{"id": "T-1"}]})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rates/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": []})))
        .expect(2)
        .mount(&server)
        .await;

    let mut profile = base_profile(&server).with_send_batch_size(2);
    if let Some(endpoint) = profile.endpoints.get_mut(&DataType::Rate) {
        endpoint.send_wrapper = Some("records".into());
        endpoint.failed_path = Some("failed".into());
    }

    let records: Vec<Record> = (0..5).map(canonical).collect();
    let summary = adapter(profile).send_data(DataType::Rate, &records).await.unwrap();

    assert_eq!(summary.sent, 5);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.failed_records, vec![json!({"id": "T-1"})]);
}

#[tokio::test]
async fn test_failed_later_batch_keeps_what_was_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rates/batch"))
        .and(body_partial_json(json!([{"tk": {"id": "T-0"}}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rates/batch"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let profile = base_profile(&server).with_send_batch_size(2);
    let records: Vec<Record> = (0..5).map(canonical).collect();
    let err = adapter(profile).send_data(DataType::Rate, &records).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    let sent = err.partial_send().unwrap();
    assert_eq!(sent.sent, 2);
    assert_eq!(sent.batches, 1);
}

#[tokio::test]
async fn test_send_without_send_path_is_a_configuration_error() {
    let server = MockServer::start().await;
    let mut profile = base_profile(&server);
    if let Some(endpoint) = profile.endpoints.get_mut(&DataType::Rate) {
        endpoint.send_path = None;
    }

    let err = adapter(profile)
        .send_data(DataType::Rate, &[canonical(0)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Configuration));
}

// ===== Connection and Mapping Tests =====

#[tokio::test]
async fn test_connection_check_never_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut profile = base_profile(&server);
    profile.health_check_path = Some("/health".into());
    assert!(adapter(profile).test_connection().await.success);

    let unreachable = VendorProfile::new(
        "down",
        ConnectionConfig::new("http://127.0.0.1:9", AuthMethod::None)
            .with_max_retries(0)
            .with_timeout_seconds(1),
    );
    let result = adapter(unreachable).test_connection().await;
    assert!(!result.success);
    assert!(!result.message.is_empty());
}

#[tokio::test]
async fn test_attempts_go_to_injected_logger() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": vendor_rates(0..1)})))
        .mount(&server)
        .await;

    let logger = MemoryRequestLogger::new();
    let context = AdapterContext::default().with_logger(Arc::new(logger.clone()));
    let adapter = RestAdapter::from_profile(base_profile(&server), &context).unwrap();

    adapter.get_data(DataType::Rate, FetchParams::new()).await.unwrap();
    assert_eq!(logger.len(), 1);
}

#[test]
fn test_map_data_is_soft_on_bad_values() {
    let server_less = VendorProfile::new(
        "offline",
        ConnectionConfig::new("https://offline.example.com", AuthMethod::None),
    )
    .with_mapping(DataType::Rate, rate_mapping());
    let adapter = adapter(server_less);

    let source = json!({"name": "Jane", "rate": "not a number"}).as_object().cloned().unwrap();
    let mapped = adapter.map_data(DataType::Rate, &[source]).unwrap();

    assert_eq!(mapped[0].record["attorney_name"], json!("Jane"));
    assert_eq!(mapped[0].record["rate_amount"], Value::Null);
    assert_eq!(mapped[0].warnings.len(), 1);
}

#[test]
fn test_import_file_through_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rates.csv");
    std::fs::write(
        &file,
        "Firm Name,Attorney Name,Rate Amount,Currency,Effective Date\nAcme LLP,Jane,500,USD,2025-01-01\n",
    )
    .unwrap();

    let adapter = adapter(VendorProfile::new(
        "offline",
        ConnectionConfig::new("https://offline.example.com", AuthMethod::None),
    ));
    let sink = InMemorySink::new();
    let outcome = adapter
        .import_file(&file, DataType::Rate, None, Some(&sink), None)
        .unwrap();

    assert!(outcome.result.success);
    assert_eq!(outcome.result.created, 1);
    assert_eq!(sink.len(), 1);

    let missing = adapter.import_file(&dir.path().join("none.csv"), DataType::Rate, None, None, None);
    assert!(matches!(missing, Err(AdapterError::Import(_))));
}

#[test]
fn test_cancelled_import_through_adapter_returns_partial_result() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("rates.csv");
    std::fs::write(
        &file,
        "Firm Name,Attorney Name,Rate Amount,Currency,Effective Date
Acme LLP,Jane,500,USD,2025-01-01
",
    )
    .unwrap();

    let adapter = adapter(VendorProfile::new(
        "offline",
        ConnectionConfig::new("https://offline.example.com", AuthMethod::None),
    ));
    let token = CancellationToken::new();
    token.cancel();

    let cancelled = adapter
        .import_file(&file, DataType::Rate, None, None, Some(&token))
        .unwrap();
    assert!(cancelled.result.cancelled);
    assert_eq!(cancelled.result.processed(), 0);

    let again = adapter.import_file(&file, DataType::Rate, None, None, None).unwrap();
    assert!(!again.result.cancelled);
    assert_eq!(again.result.created, 1);
}
