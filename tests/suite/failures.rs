//! Fatal and degraded failure paths.

use std::time::Duration;

use dataverse_batch::client::AuthError;
use dataverse_batch::types::{RecordStatus, ValidationError};
use dataverse_batch::{BatchError, CreateOptions, DataverseBatch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    BATCH_PATH, accounts, connect, fake_environment, mount_probe, mount_token, options, settings,
};

#[tokio::test]
async fn auth_failure_aborts_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"invalid_client\"}"))
        .mount(&server)
        .await;

    let err = DataverseBatch::connect(settings(&server)).await.unwrap_err();
    match err {
        BatchError::Auth(AuthError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid_client"));
        }
        other => panic!("expected auth failure, got {other:?}"),
    }
}

#[tokio::test]
async fn stalled_token_endpoint_fails_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "late"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = DataverseBatch::connect(settings(&server).with_request_timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::Auth(AuthError::Network(_))), "{err:?}");
}

#[tokio::test]
async fn failed_probe_is_not_fatal() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 503).await;

    assert!(DataverseBatch::connect(settings(&server)).await.is_ok());
}

#[tokio::test]
async fn server_error_degrades_to_per_record_errors() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let report = client
        .create_multiple(accounts(4), "accounts", &CreateOptions::parallel(2, 2))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 4);
    for (i, result) in report.results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.status, RecordStatus::Error);
        assert_eq!(result.error.as_deref(), Some("HTTP 500"));
    }
    assert_eq!(report.summary.top_errors[0].count, 4);
}

#[tokio::test]
async fn validation_happens_before_any_batch_request() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let err = client
        .create_multiple_json(serde_json::json!("not a list"), "accounts", &options(10))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::Validation(ValidationError::NotAList)));

    let err = client
        .create_multiple(accounts(3), "accounts", &options(0))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::Validation(ValidationError::ZeroBatchSize)));

    let report = client
        .create_multiple(Vec::new(), "accounts", &options(10))
        .await
        .unwrap();
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn one_failing_chunk_leaves_the_others_intact() {
    let server = fake_environment().await;
    // Higher priority than the default responder: fail the chunk holding acct-2.
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(wiremock::matchers::body_string_contains("\"acct-2\""))
        .respond_with(ResponseTemplate::new(502))
        .with_priority(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let report = client
        .create_multiple(accounts(6), "accounts", &options(2))
        .await
        .unwrap();

    let statuses: Vec<RecordStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [
            RecordStatus::Success,
            RecordStatus::Success,
            RecordStatus::Error,
            RecordStatus::Error,
            RecordStatus::Success,
            RecordStatus::Success,
        ]
    );
    assert_eq!(report.results[3].error.as_deref(), Some("HTTP 502"));
}
