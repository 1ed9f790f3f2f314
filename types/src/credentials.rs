//! Client-credentials material for the identity endpoint.

/// Application secret. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClientSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: ClientSecret,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: ClientSecret,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Client id shortened for log output (first 8 characters).
    #[must_use]
    pub fn client_id_hint(&self) -> String {
        let prefix: String = self.client_id.chars().take(8).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let creds = ClientCredentials::new("tenant", "client", ClientSecret::new("hunter2"));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn client_id_hint_truncates() {
        let creds = ClientCredentials::new(
            "tenant",
            "0123456789abcdef",
            ClientSecret::new("s"),
        );
        assert_eq!(creds.client_id_hint(), "01234567...");

        let short = ClientCredentials::new("tenant", "abc", ClientSecret::new("s"));
        assert_eq!(short.client_id_hint(), "abc...");
    }
}
