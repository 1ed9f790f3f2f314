//! End-to-end record creation against a fake environment.

use dataverse_batch::CreateOptions;
use dataverse_batch::types::{Record, RecordStatus};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    BATCH_PATH, ChangesetResponder, TOKEN, accounts, connect, fake_environment, mount_probe,
    mount_token, options,
};

#[tokio::test]
async fn sequential_run_creates_every_record_in_order() {
    let server = fake_environment().await;
    let client = connect(&server).await;

    let report = client
        .create_multiple(accounts(7), "accounts", &options(3))
        .await
        .unwrap();

    assert_eq!(report.summary.total, 7);
    assert_eq!(report.summary.success, 7);
    assert!((report.summary.success_rate - 100.0).abs() < f64::EPSILON);
    for (i, result) in report.results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.status, RecordStatus::Success);
        assert_eq!(result.id.as_deref(), Some(format!("id-acct-{i}").as_str()));
        assert_eq!(result.record.get("name"), Some(&serde_json::json!(format!("acct-{i}"))));
    }

    let batches = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == BATCH_PATH)
        .count();
    assert_eq!(batches, 3);
}

#[tokio::test]
async fn parallel_run_matches_sequential_results() {
    let server = fake_environment().await;
    let client = connect(&server).await;

    let sequential = client
        .create_multiple(accounts(25), "accounts", &options(4))
        .await
        .unwrap();
    let parallel = client
        .create_multiple(accounts(25), "accounts", &CreateOptions::parallel(4, 3))
        .await
        .unwrap();

    assert_eq!(sequential.results, parallel.results);
    assert_eq!(parallel.summary.success, 25);
}

#[tokio::test]
async fn rejected_records_fail_individually() {
    let server = fake_environment().await;
    let client = connect(&server).await;

    let mut records = accounts(5);
    records[1] = Record::new()
        .with("name", "dup")
        .with("reject", "A record with matching key values already exists.");
    records[3] = Record::new().with("name", "bad").with("reject", "Invalid owner");

    let report = client
        .create_multiple(records, "accounts", &CreateOptions::parallel(2, 2))
        .await
        .unwrap();

    let statuses: Vec<RecordStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [
            RecordStatus::Success,
            RecordStatus::Error,
            RecordStatus::Success,
            RecordStatus::Error,
            RecordStatus::Success,
        ]
    );
    assert_eq!(
        report.results[1].error.as_deref(),
        Some("A record with matching key values already exists.")
    );
    assert_eq!(report.results[3].error.as_deref(), Some("Invalid owner"));
    assert_eq!(report.summary.error, 2);
    assert_eq!(report.summary.top_errors.len(), 2);
    assert_eq!(report.summary.top_errors[0].message, "A record with matching key values already exists.");
}

#[tokio::test]
async fn json_input_is_accepted() {
    let server = fake_environment().await;
    let client = connect(&server).await;

    let report = client
        .create_multiple_json(
            serde_json::json!([{"name": "a"}, {"name": "b", "revenue": 12.5}]),
            "accounts",
            &options(10),
        )
        .await
        .unwrap();

    assert_eq!(report.summary.success, 2);
    assert_eq!(report.results[1].id.as_deref(), Some("id-b"));
}

#[tokio::test]
async fn batch_requests_carry_bearer_token() {
    let server = wiremock::MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ChangesetResponder)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let report = client
        .create_multiple(accounts(2), "accounts", &options(10))
        .await
        .unwrap();
    assert_eq!(report.summary.success, 2);
}

#[tokio::test]
async fn recommendations_follow_input_size() {
    let server = fake_environment().await;
    let client = connect(&server).await;

    let r = client.recommendations(5000);
    assert_eq!((r.batch_size, r.parallel, r.workers), (500, true, 10));

    let report = client
        .create_multiple(
            accounts(12),
            "accounts",
            &CreateOptions::parallel(r.batch_size, r.workers),
        )
        .await
        .unwrap();
    assert_eq!(report.summary.success, 12);
}

#[tokio::test]
async fn unexpected_batch_body_yields_error_per_record() {
    let server = wiremock::MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not multipart"))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let report = client
        .create_multiple(accounts(3), "accounts", &options(10))
        .await
        .unwrap();

    assert_eq!(report.summary.error, 3);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.error.as_deref() == Some("response not found for this record"))
    );
}
