//! OData `$batch` envelope codec.
//!
//! A chunk of records becomes one `multipart/mixed` body holding a single
//! change-set with one `POST` sub-request per record. Sub-requests are tagged
//! with a 1-based `Content-ID`, and [`decode`] maps sub-responses back to
//! input positions by that id, never by arrival order.

use std::collections::HashMap;

use dataverse_types::{Record, RecordOutcome, TableName};
use serde_json::Value;
use uuid::Uuid;

use crate::multipart::{self, HttpMessage, Part};

/// Error for a correlation id with no sub-response in the batch response.
pub const RESPONSE_NOT_FOUND: &str = "response not found for this record";
/// Error for a failed sub-request whose body carries no readable message.
pub const GENERIC_RECORD_ERROR: &str = "error creating record";

const CRLF: &str = "\r\n";
// Nested multipart deeper than batch -> change-set is not produced by the service.
const MAX_NESTING: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to serialize record {position}: {source}")]
    Serialize {
        position: usize,
        source: serde_json::Error,
    },
}

/// One encoded chunk, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEnvelope {
    body: String,
    content_type: String,
    batch_boundary: String,
    changeset_boundary: String,
    request_count: usize,
}

impl BatchEnvelope {
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Value for the outer `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn batch_boundary(&self) -> &str {
        &self.batch_boundary
    }

    #[must_use]
    pub fn changeset_boundary(&self) -> &str {
        &self.changeset_boundary
    }

    /// Number of sub-requests, i.e. the chunk length.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Encode `records` as a `$batch` body posting each one to `{api_base}/{table}`.
///
/// Boundaries are fresh UUID-derived tokens per call. Every line ends in CRLF.
pub fn encode(
    records: &[Record],
    table: &TableName,
    api_base: &str,
) -> Result<BatchEnvelope, CodecError> {
    let batch_boundary = format!("batch_{}", Uuid::new_v4().simple());
    let changeset_boundary = format!("changeset_{}", Uuid::new_v4().simple());
    let target = format!("{}/{}", api_base.trim_end_matches('/'), table.as_str());

    let mut body = String::new();
    let mut line = |text: &str| {
        body.push_str(text);
        body.push_str(CRLF);
    };

    line(&format!("--{batch_boundary}"));
    line(&format!(
        "Content-Type: multipart/mixed; boundary={changeset_boundary}"
    ));
    line("");

    for (position, record) in records.iter().enumerate() {
        let json = serde_json::to_string(record)
            .map_err(|source| CodecError::Serialize { position, source })?;

        line(&format!("--{changeset_boundary}"));
        line("Content-Type: application/http");
        line("Content-Transfer-Encoding: binary");
        line(&format!("Content-ID: {}", position + 1));
        line("");
        line(&format!("POST {target} HTTP/1.1"));
        line("Content-Type: application/json;type=entry");
        line("");
        line(&json);
    }

    line(&format!("--{changeset_boundary}--"));
    line(&format!("--{batch_boundary}--"));

    Ok(BatchEnvelope {
        body,
        content_type: format!("multipart/mixed; boundary={batch_boundary}"),
        batch_boundary,
        changeset_boundary,
        request_count: records.len(),
    })
}

/// Decode a `$batch` response into exactly `chunk_size` outcomes, where
/// `outcomes[i]` belongs to `Content-ID: i + 1`.
///
/// Never fails: an unreadable response yields an error outcome per record.
#[must_use]
pub fn decode(response: &str, chunk_size: usize) -> Vec<RecordOutcome> {
    let responses = sub_responses(response);
    if responses.is_empty() && chunk_size > 0 {
        tracing::warn!(
            response_bytes = response.len(),
            "Batch response contained no sub-responses"
        );
    }

    (1..=chunk_size)
        .map(|content_id| match responses.get(&content_id) {
            Some(part) => outcome_for(part),
            None => RecordOutcome::error(RESPONSE_NOT_FOUND),
        })
        .collect()
}

/// Sub-response parts keyed by `Content-ID`; the first part with a given id wins.
fn sub_responses(response: &str) -> HashMap<usize, Part<'_>> {
    let mut found = HashMap::new();
    if let Some(boundary) = multipart::first_boundary(response) {
        collect_parts(response, boundary, 0, &mut found);
    }
    found
}

fn collect_parts<'a>(
    text: &'a str,
    boundary: &str,
    depth: usize,
    found: &mut HashMap<usize, Part<'a>>,
) {
    for raw in multipart::split_parts(text, boundary) {
        let part = Part::parse(raw);
        let content_type = part.content_type().unwrap_or_default();

        if multipart::is_multipart(content_type) {
            match multipart::boundary_param(content_type) {
                Some(inner) if depth < MAX_NESTING => {
                    collect_parts(part.body, inner, depth + 1, found);
                }
                _ => tracing::debug!(content_type, depth, "Skipping nested multipart part"),
            }
            continue;
        }

        // Outside a change-set the service may answer with a bare
        // application/http part (e.g. the change-set as a whole failed).
        if let Some(content_id) = part.header("Content-ID").and_then(parse_content_id) {
            found.entry(content_id).or_insert(part);
        }
    }
}

fn parse_content_id(value: &str) -> Option<usize> {
    let value = value.trim();
    let value = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value);
    value.trim().parse().ok()
}

fn outcome_for(part: &Part<'_>) -> RecordOutcome {
    let Some(message) = HttpMessage::parse(part.body) else {
        return RecordOutcome::unknown();
    };

    match message.status {
        200..=299 => RecordOutcome::success(
            message
                .header("OData-EntityId")
                .and_then(entity_id_from_header),
        ),
        400..=599 => RecordOutcome::error(
            error_message(message.body()).unwrap_or_else(|| GENERIC_RECORD_ERROR.to_string()),
        ),
        _ => RecordOutcome::unknown(),
    }
}

/// `.../accounts(00000000-0000-0000-0000-000000000001)` -> the text in the last parentheses.
fn entity_id_from_header(value: &str) -> Option<String> {
    let open = value.rfind('(')?;
    let rest = &value[open + 1..];
    let id = rest.find(')').map_or(rest, |close| &rest[..close]).trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// `error.message` from the JSON object embedded in a failed sub-response.
fn error_message(body: &str) -> Option<String> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    let payload: Value = serde_json::from_str(&body[start..=end]).ok()?;
    payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
