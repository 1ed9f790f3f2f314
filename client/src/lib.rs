//! Dataverse Web API client pieces used by the batch engine.
//!
//! # Architecture
//!
//! - [`codec`] - Encodes a chunk of records into an OData `$batch` envelope and
//!   decodes the multipart response into one outcome per record
//! - [`multipart`] - Boundary-delimited part scanner the codec is built on
//! - [`auth`] - OAuth2 client-credentials token exchange
//! - [`transport`] - Sends one envelope over HTTP; connectivity probe
//!
//! # Error Handling
//!
//! Decoding never fails: malformed or missing sub-responses degrade to
//! per-record `error`/`unknown` outcomes. Transport failures are returned as
//! [`TransportError`] and are turned into per-record results by the caller.
//! Only authentication failures are meant to be fatal.

pub mod auth;
pub mod codec;
pub mod multipart;
pub mod transport;

use std::time::Duration;

pub use auth::{AccessToken, AuthError, ClientCredentialsAuth};
pub use codec::{BatchEnvelope, CodecError, decode, encode};
pub use transport::{BatchTransport, HttpTransport, SendFut, TransportError};

pub use dataverse_types;
pub use dataverse_types::{DEFAULT_API_VERSION, DEFAULT_AUTHORITY_HOST};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Options for the shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Refuse plain `http://` URLs. Default: true.
    pub https_only: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self { https_only: true }
    }
}

/// Build the client shared by auth, transport and probe calls.
///
/// One client is built per facade instance; there is no process-wide client.
pub fn http_client(options: &HttpOptions) -> Result<reqwest::Client, reqwest::Error> {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    default_headers.insert("OData-MaxVersion", HeaderValue::from_static("4.0"));
    default_headers.insert("OData-Version", HeaderValue::from_static("4.0"));

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(options.https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .default_headers(default_headers)
        .build()
}

/// URLs derived from an environment URL such as `https://contoso.crm.dynamics.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    resource_url: String,
    api_base: String,
}

impl Endpoints {
    #[must_use]
    pub fn new(resource_url: &str, api_version: &str) -> Self {
        let resource_url = resource_url.trim_end_matches('/').to_string();
        let api_base = format!("{resource_url}/api/data/{api_version}");
        Self {
            resource_url,
            api_base,
        }
    }

    /// Environment URL without trailing slash; also the token audience.
    #[must_use]
    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// `{resource}/api/data/{version}`; sub-requests are addressed below it.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    #[must_use]
    pub fn batch_url(&self) -> String {
        format!("{}/$batch", self.api_base)
    }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
