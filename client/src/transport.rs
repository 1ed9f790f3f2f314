//! Sending encoded batches.
//!
//! [`BatchTransport`] is the seam between the orchestrator and the network;
//! [`HttpTransport`] is the real implementation. Test doubles implement the
//! trait directly.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::auth::AccessToken;
use crate::codec::BatchEnvelope;
use crate::{DEFAULT_REQUEST_TIMEOUT, Endpoints, read_capped_error_body};

/// Send future type alias.
pub type SendFut<'a> = Pin<Box<dyn Future<Output = Result<String, TransportError>> + Send + 'a>>;

/// Failure of the outer `$batch` call. Per-record failures inside a
/// successful envelope are not transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP {status}")]
    HttpStatus { status: u16, body: String },
}

/// Sends one envelope and returns the raw response text.
pub trait BatchTransport: Send + Sync {
    fn send<'a>(&'a self, envelope: &'a BatchEnvelope) -> SendFut<'a>;
}

/// POSTs envelopes to `{resource}/api/data/{version}/$batch`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: AccessToken,
    timeout: Duration,
}

impl HttpTransport {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoints: Endpoints, token: AccessToken) -> Self {
        Self {
            http,
            endpoints,
            token,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    async fn post_batch(&self, envelope: &BatchEnvelope) -> Result<String, TransportError> {
        tracing::debug!(
            requests = envelope.request_count(),
            body_bytes = envelope.body().len(),
            "Sending $batch request"
        );

        let response = self
            .http
            .post(self.endpoints.batch_url())
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, envelope.content_type())
            .header("OData-Version", "4.0")
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .body(envelope.body().to_owned())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Connection error in batch");
                TransportError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            tracing::error!(status = status.as_u16(), body = %body, "HTTP error in batch");
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(TransportError::Network)
    }

    /// `GET {resource}/api/data/{version}` with the bearer token; `true` on 2xx.
    pub async fn probe_connection(&self) -> bool {
        let result = self
            .http
            .get(self.endpoints.api_base())
            .header(AUTHORIZATION, self.bearer())
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Dataverse connection test successful");
                true
            }
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "Connection test failed"
                );
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Connection test failed");
                false
            }
        }
    }
}

impl BatchTransport for HttpTransport {
    fn send<'a>(&'a self, envelope: &'a BatchEnvelope) -> SendFut<'a> {
        Box::pin(self.post_batch(envelope))
    }
}
