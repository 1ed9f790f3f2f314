//! Bulk record creation for Dataverse.
//!
//! # Architecture
//!
//! - [`batch`] - [`DataverseBatch`] facade: authenticate once, validate input,
//!   run a batch job and return a [`BatchReport`]
//! - [`orchestrator`] - sequential and worker-pool dispatch of chunks
//! - [`chunk`] / [`sink`] - order-preserving partition and index-addressed
//!   result collection
//! - [`telemetry`] - injected run and chunk lifecycle hooks
//! - [`report`] - counters, top errors and throughput for a finished run
//! - [`recommend`] - batch settings suggested from input size
//! - [`logging`] - `tracing` subscriber setup from `[logging]` config
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use dataverse_batch::{ConnectionSettings, CreateOptions, DataverseBatch};
//! use dataverse_batch::types::{ClientCredentials, ClientSecret, Record};
//!
//! let credentials = ClientCredentials::new("tenant", "client", ClientSecret::new("secret"));
//! let client = DataverseBatch::connect(ConnectionSettings::new(
//!     "https://contoso.crm.dynamics.com",
//!     credentials,
//! ))
//! .await?;
//!
//! let records = vec![Record::new().with("name", "Contoso")];
//! let report = client
//!     .create_multiple(records, "accounts", &CreateOptions::parallel(100, 4))
//!     .await?;
//! println!("{} of {} created", report.summary.success, report.summary.total);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod chunk;
pub mod logging;
pub mod orchestrator;
pub mod recommend;
pub mod report;
pub mod sink;
pub mod telemetry;

pub use batch::{BatchError, ConnectionSettings, CreateOptions, DataverseBatch};
pub use orchestrator::BatchProcessor;
pub use recommend::{BatchRecommendation, recommend};
pub use report::{BatchReport, ErrorCount, RunSummary};
pub use telemetry::{
    BatchTelemetry, ChunkState, ExecutionMode, NoopTelemetry, RunPlan, TracingTelemetry,
};

pub use dataverse_client as client;
pub use dataverse_config as config;
pub use dataverse_types as types;
