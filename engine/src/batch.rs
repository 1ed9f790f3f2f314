//! The [`DataverseBatch`] facade: connect once, then create records in bulk.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dataverse_client::{
    AuthError, BatchTransport, ClientCredentialsAuth, DEFAULT_API_VERSION, DEFAULT_AUTHORITY_HOST,
    DEFAULT_REQUEST_TIMEOUT, Endpoints, HttpOptions, HttpTransport, http_client,
};
use dataverse_config::{BatchConfig, ConfigError, DataverseConfig};
use dataverse_types::{
    BatchSize, ClientCredentials, Record, TableName, ValidationError, WorkerCount,
    records_from_json,
};

use crate::orchestrator::{BatchProcessor, DEFAULT_PAUSE};
use crate::recommend::{BatchRecommendation, recommend};
use crate::report::BatchReport;
use crate::telemetry::{BatchTelemetry, ExecutionMode, TracingTelemetry};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything needed to reach one Dataverse environment.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub resource_url: String,
    pub credentials: ClientCredentials,
    pub authority_host: String,
    pub api_version: String,
    pub request_timeout: Duration,
    pub http: HttpOptions,
}

impl ConnectionSettings {
    #[must_use]
    pub fn new(resource_url: impl Into<String>, credentials: ClientCredentials) -> Self {
        Self {
            resource_url: resource_url.into(),
            credentials,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            http: HttpOptions::default(),
        }
    }

    /// Build from the `[environment]` and `[batch]` sections.
    pub fn from_config(config: &DataverseConfig) -> Result<Self, ConfigError> {
        let env = config.environment()?;
        Ok(Self {
            resource_url: env.resource_url()?,
            credentials: env.credentials()?,
            authority_host: env.authority_host(),
            api_version: env.api_version(),
            request_timeout: Duration::from_secs(config.batch.request_timeout_secs),
            http: HttpOptions::default(),
        })
    }

    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_http_options(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }
}

/// Per-call batching options. Counts are validated by
/// [`DataverseBatch::create_multiple`] before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    pub batch_size: usize,
    pub parallel: bool,
    /// Only consulted when `parallel` is set.
    pub workers: usize,
    /// Pause between sequential chunks; zero disables it.
    pub pause: Duration,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            batch_size: BatchSize::DEFAULT.get(),
            parallel: false,
            workers: WorkerCount::DEFAULT.get(),
            pause: DEFAULT_PAUSE,
        }
    }
}

impl CreateOptions {
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            parallel: config.parallel,
            workers: config.workers,
            pause: Duration::from_millis(config.pause_ms),
        }
    }

    #[must_use]
    pub fn sequential(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parallel(batch_size: usize, workers: usize) -> Self {
        Self {
            batch_size,
            parallel: true,
            workers,
            ..Self::default()
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    fn validate(&self) -> Result<(BatchSize, ExecutionMode), ValidationError> {
        let batch_size = BatchSize::new(self.batch_size)?;
        let mode = if self.parallel {
            ExecutionMode::Concurrent {
                workers: WorkerCount::new(self.workers)?,
            }
        } else {
            ExecutionMode::Sequential { pause: self.pause }
        };
        Ok((batch_size, mode))
    }
}

/// Authenticated connection to one environment.
///
/// The bearer token is fetched once by [`DataverseBatch::connect`] and never
/// refreshed; runs that outlive it see `HTTP 401` chunk failures.
#[derive(Clone)]
pub struct DataverseBatch {
    transport: Arc<dyn BatchTransport>,
    api_base: Arc<str>,
    telemetry: Arc<dyn BatchTelemetry>,
}

impl std::fmt::Debug for DataverseBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataverseBatch")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl DataverseBatch {
    /// Authenticate and probe the environment.
    ///
    /// Authentication failure is fatal. A failed connectivity probe is only
    /// logged; the first batch will report the real problem per record.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self, BatchError> {
        let ConnectionSettings {
            resource_url,
            credentials,
            authority_host,
            api_version,
            request_timeout,
            http,
        } = settings;

        let endpoints = Endpoints::new(&resource_url, &api_version);
        tracing::info!(
            url = %endpoints.resource_url(),
            client_id = %credentials.client_id_hint(),
            tenant_id = %credentials.tenant_id,
            "Initializing Dataverse batch client"
        );

        let http = http_client(&http).map_err(BatchError::HttpClient)?;
        let token = ClientCredentialsAuth::with_authority_host(http.clone(), &authority_host)
            .with_timeout(request_timeout)
            .authenticate(&credentials, endpoints.resource_url())
            .await?;

        let transport =
            HttpTransport::new(http, endpoints.clone(), token).with_timeout(request_timeout);
        if !transport.probe_connection().await {
            tracing::warn!(
                url = %endpoints.resource_url(),
                "Connection test failed; continuing"
            );
        }

        Ok(Self::from_transport(Arc::new(transport), endpoints.api_base()))
    }

    /// Connect using the `[environment]` section of a loaded config.
    pub async fn connect_from_config(config: &DataverseConfig) -> Result<Self, BatchError> {
        Self::connect(ConnectionSettings::from_config(config)?).await
    }

    /// Use a caller-supplied transport. `api_base` is the
    /// `{resource}/api/data/{version}` prefix written into sub-requests.
    #[must_use]
    pub fn from_transport(transport: Arc<dyn BatchTransport>, api_base: impl Into<Arc<str>>) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            telemetry: Arc::new(TracingTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn BatchTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Create `records` in `table`. Returns one result per record in input
    /// order; only invalid input is an error.
    pub async fn create_multiple(
        &self,
        records: Vec<Record>,
        table: &str,
        options: &CreateOptions,
    ) -> Result<BatchReport, BatchError> {
        let table = TableName::new(table)?;
        let (batch_size, mode) = options.validate()?;

        if records.is_empty() {
            tracing::warn!(table = %table, "No records to process");
            return Ok(BatchReport::empty());
        }

        tracing::info!(
            table = %table,
            records = records.len(),
            batch_size = batch_size.get(),
            parallel = mode.is_concurrent(),
            "Starting creation of records"
        );

        let start = Instant::now();
        let report = BatchProcessor::new(Arc::clone(&self.transport), table, Arc::clone(&self.api_base))
            .with_batch_size(batch_size)
            .with_telemetry(Arc::clone(&self.telemetry))
            .run(records, mode)
            .await;

        let secs = start.elapsed().as_secs_f64();
        tracing::info!(
            total = report.summary.total,
            elapsed_secs = format_args!("{secs:.2}"),
            records_per_second = format_args!("{:.2}", report.summary.records_per_second),
            "Processing completed"
        );
        Ok(report)
    }

    /// Like [`Self::create_multiple`] for a JSON array of objects.
    pub async fn create_multiple_json(
        &self,
        data: serde_json::Value,
        table: &str,
        options: &CreateOptions,
    ) -> Result<BatchReport, BatchError> {
        let records = records_from_json(data)?;
        self.create_multiple(records, table, options).await
    }

    #[must_use]
    pub fn recommendations(&self, total_records: usize) -> BatchRecommendation {
        recommend(total_records)
    }
}
