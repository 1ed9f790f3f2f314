//! Shared test utilities and fixtures
//!
//! A wiremock-backed fake Dataverse environment: token endpoint, connectivity
//! probe and a `$batch` endpoint that answers each sub-request individually.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dataverse_batch::client::HttpOptions;
use dataverse_batch::types::{ClientCredentials, ClientSecret, Record};
use dataverse_batch::{ConnectionSettings, CreateOptions, DataverseBatch, NoopTelemetry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT: &str = "tenant-1";
pub const TOKEN: &str = "token-abc";
pub const BATCH_PATH: &str = "/api/data/v9.2/$batch";
pub const PROBE_PATH: &str = "/api/data/v9.2";

pub fn settings(server: &MockServer) -> ConnectionSettings {
    ConnectionSettings::new(
        server.uri(),
        ClientCredentials::new(TENANT, "client-1234567890", ClientSecret::new("s3cret")),
    )
    .with_authority_host(server.uri())
    .with_request_timeout(Duration::from_secs(5))
    .with_http_options(HttpOptions { https_only: false })
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": TOKEN
        })))
        .mount(server)
        .await;
}

pub async fn mount_probe(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(PROBE_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("{}"))
        .mount(server)
        .await;
}

/// Token + healthy probe + per-record `$batch` responder.
pub async fn fake_environment() -> MockServer {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_probe(&server, 200).await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ChangesetResponder)
        .mount(&server)
        .await;
    server
}

pub async fn connect(server: &MockServer) -> DataverseBatch {
    DataverseBatch::connect(settings(server))
        .await
        .expect("connect to fake environment")
        .with_telemetry(Arc::new(NoopTelemetry))
}

pub fn accounts(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new().with("name", format!("acct-{i}")))
        .collect()
}

pub fn options(batch_size: usize) -> CreateOptions {
    CreateOptions::sequential(batch_size).with_pause(Duration::ZERO)
}

/// Answers a `$batch` request the way Dataverse does: one sub-response per
/// sub-request inside a change-set, in reverse order so correlation has to go
/// through `Content-ID`.
///
/// A record with `"reject": "<message>"` gets a `400` carrying that message;
/// every other record gets `204` with an entity id derived from its `name`.
pub struct ChangesetResponder;

impl Respond for ChangesetResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        let mut parts = sub_requests(&body);
        parts.reverse();

        let mut out = String::from("--batchresponse_e2e\r\n");
        out.push_str("Content-Type: multipart/mixed; boundary=changesetresponse_e2e\r\n\r\n");
        for (content_id, record) in parts {
            out.push_str("--changesetresponse_e2e\r\n");
            out.push_str("Content-Type: application/http\r\n");
            out.push_str("Content-Transfer-Encoding: binary\r\n");
            out.push_str(&format!("Content-ID: {content_id}\r\n\r\n"));

            if let Some(message) = record["reject"].as_str() {
                out.push_str("HTTP/1.1 400 Bad Request\r\n");
                out.push_str("Content-Type: application/json; odata.metadata=minimal\r\n\r\n");
                out.push_str(
                    &serde_json::json!({"error": {"code": "0x80040203", "message": message}})
                        .to_string(),
                );
                out.push_str("\r\n");
            } else {
                let name = record["name"].as_str().unwrap_or("unnamed");
                out.push_str("HTTP/1.1 204 No Content\r\n");
                out.push_str(&format!(
                    "OData-EntityId: http://dataverse.test/api/data/v9.2/accounts(id-{name})\r\n\r\n"
                ));
            }
            out.push_str("\r\n");
        }
        out.push_str("--changesetresponse_e2e--\r\n--batchresponse_e2e--\r\n");

        ResponseTemplate::new(200)
            .insert_header("Content-Type", "multipart/mixed; boundary=batchresponse_e2e")
            .set_body_string(out)
    }
}

/// `(content_id, record)` for each sub-request in an encoded envelope.
pub fn sub_requests(body: &str) -> Vec<(usize, serde_json::Value)> {
    let mut out = Vec::new();
    let mut content_id = None;
    for line in body.split("\r\n") {
        if let Some(id) = line.strip_prefix("Content-ID: ") {
            content_id = id.trim().parse().ok();
        } else if line.starts_with('{')
            && let Some(id) = content_id.take()
            && let Ok(record) = serde_json::from_str(line)
        {
            out.push((id, record));
        }
    }
    out
}
