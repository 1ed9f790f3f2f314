//! OAuth2 client-credentials token exchange.
//!
//! The token is fetched once and used for the lifetime of the caller. There is
//! no refresh: runs that outlive `expires_in` will start seeing `401` batch
//! failures, which surface as per-record errors.

use std::sync::Arc;
use std::time::Duration;

use dataverse_types::ClientCredentials;
use serde::Deserialize;

use crate::{DEFAULT_AUTHORITY_HOST, DEFAULT_REQUEST_TIMEOUT, read_capped_error_body};

/// Bearer token shared read-only by every worker.
#[derive(Clone)]
pub struct AccessToken {
    value: Arc<str>,
    expires_in: Option<Duration>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl AccessToken {
    #[must_use]
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self {
            value: value.into(),
            expires_in: None,
        }
    }

    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    /// Lifetime reported by the identity endpoint at issue time.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("connection error during authentication: {0}")]
    Network(#[source] reqwest::Error),
    #[error("authentication failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint returned an unreadable response: {0}")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("access token not found in response")]
    MissingAccessToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Exchanges client credentials for a bearer token at
/// `{authority_host}/{tenant}/oauth2/v2.0/token`.
#[derive(Debug, Clone)]
pub struct ClientCredentialsAuth {
    http: reqwest::Client,
    authority_host: String,
    timeout: Duration,
}

impl ClientCredentialsAuth {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_authority_host(http, DEFAULT_AUTHORITY_HOST)
    }

    #[must_use]
    pub fn with_authority_host(http: reqwest::Client, authority_host: &str) -> Self {
        Self {
            http,
            authority_host: authority_host.trim_end_matches('/').to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound on the whole token request, response body included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{tenant_id}/oauth2/v2.0/token", self.authority_host)
    }

    /// Request a token scoped to `{resource_url}/.default`.
    pub async fn authenticate(
        &self,
        credentials: &ClientCredentials,
        resource_url: &str,
    ) -> Result<AccessToken, AuthError> {
        let scope = format!("{}/.default", resource_url.trim_end_matches('/'));
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
            ("scope", scope.as_str()),
            ("grant_type", "client_credentials"),
        ];

        tracing::info!(tenant_id = %credentials.tenant_id, "Starting authentication with Dataverse");

        let response = self
            .http
            .post(self.token_url(&credentials.tenant_id))
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Connection error during authentication");
                AuthError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            tracing::error!(status = status.as_u16(), "HTTP error during authentication");
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(AuthError::Network)?;
        let token: TokenResponse =
            serde_json::from_str(&text).map_err(AuthError::InvalidResponse)?;

        let Some(value) = token.access_token.filter(|t| !t.is_empty()) else {
            tracing::error!("Access token not found in response");
            return Err(AuthError::MissingAccessToken);
        };

        let mut access_token = AccessToken::new(value);
        if let Some(secs) = token.expires_in {
            access_token = access_token.with_expires_in(Duration::from_secs(secs));
            tracing::info!(
                expires_in_secs = secs,
                "Authentication successful; token is not refreshed during a run"
            );
        } else {
            tracing::info!("Authentication successful");
        }
        Ok(access_token)
    }
}
