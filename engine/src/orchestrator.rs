//! Chunk dispatch: encode, send, decode per chunk, merged in input order.
//!
//! Two strategies share one per-chunk pipeline ([`BatchProcessor::process_chunk`]):
//!
//! - sequential: chunk N starts after chunk N-1 finished, optionally pausing
//!   between chunks
//! - concurrent: every chunk is spawned on a [`JoinSet`] up front and a
//!   [`Semaphore`] bounds how many are in flight
//!
//! Failures never abort a run. A chunk whose transport call fails (or whose
//! task panics) produces one error result per record in that chunk; the other
//! chunks are unaffected.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dataverse_client::{BatchTransport, decode, encode};
use dataverse_types::{BatchSize, Record, RecordResult, RecordStatus, TableName, WorkerCount};
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chunk::{Chunk, chunk};
use crate::report::BatchReport;
use crate::sink::ResultSink;
use crate::telemetry::{BatchTelemetry, ChunkState, ExecutionMode, RunPlan, TracingTelemetry};

/// Message for records whose worker ended without reporting.
pub const WORKER_STOPPED: &str = "worker stopped before reporting a result";

/// Default pause between sequential chunks.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Sends chunks of records to one table through a [`BatchTransport`].
///
/// Cloning is cheap; concurrent workers each hold a clone.
#[derive(Clone)]
pub struct BatchProcessor {
    transport: Arc<dyn BatchTransport>,
    table: TableName,
    api_base: Arc<str>,
    batch_size: BatchSize,
    telemetry: Arc<dyn BatchTelemetry>,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("table", &self.table)
            .field("api_base", &self.api_base)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    /// `api_base` is the `{resource}/api/data/{version}` prefix used in
    /// every sub-request URL.
    #[must_use]
    pub fn new(
        transport: Arc<dyn BatchTransport>,
        table: TableName,
        api_base: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            transport,
            table,
            api_base: api_base.into(),
            batch_size: BatchSize::DEFAULT,
            telemetry: Arc::new(TracingTelemetry),
        }
    }

    pub fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn BatchTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Run `records` with `mode` and build the report.
    pub async fn run(&self, records: Vec<Record>, mode: ExecutionMode) -> BatchReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let results = match mode {
            ExecutionMode::Sequential { pause } => self.run_sequential(records, pause).await,
            ExecutionMode::Concurrent { workers } => self.run_concurrent(records, workers).await,
        };

        let report = BatchReport::new(results, started_at, start.elapsed());
        self.telemetry.run_finished(&report.summary);
        report
    }

    /// One chunk at a time. `pause` is slept between chunks, never after the
    /// last; `Duration::ZERO` disables it.
    pub async fn run_sequential(&self, records: Vec<Record>, pause: Duration) -> Vec<RecordResult> {
        let total = records.len();
        let chunks = self.plan(records, ExecutionMode::Sequential { pause });
        let mut results = Vec::with_capacity(total);
        let last = chunks.len().saturating_sub(1);

        for chunk in &chunks {
            results.extend(self.process_chunk(chunk).await);
            self.telemetry.records_processed(results.len(), total);

            if chunk.index < last && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        results
    }

    /// All chunks spawned up front; at most `workers` hold a permit at once.
    /// Results are merged by absolute index, so completion order is irrelevant.
    pub async fn run_concurrent(
        &self,
        records: Vec<Record>,
        workers: WorkerCount,
    ) -> Vec<RecordResult> {
        let total = records.len();
        let chunks: Vec<Arc<Chunk>> = self
            .plan(records, ExecutionMode::Concurrent { workers })
            .into_iter()
            .map(Arc::new)
            .collect();

        // More permits than chunks would never be used.
        let permits = workers
            .get()
            .min(chunks.len().max(1))
            .min(Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for chunk in &chunks {
            let processor = self.clone();
            let chunk = Arc::clone(chunk);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                let results = match AssertUnwindSafe(processor.process_chunk(&chunk))
                    .catch_unwind()
                    .await
                {
                    Ok(results) => results,
                    Err(payload) => {
                        let message =
                            format!("worker panicked: {}", panic_payload_to_string(&payload));
                        tracing::error!(chunk = chunk.index, error = %message, "Chunk worker panicked");
                        processor.telemetry.chunk_state(
                            chunk.index,
                            &ChunkState::TransportFailed {
                                message: message.clone(),
                            },
                        );
                        chunk.failed(&message)
                    }
                };
                (chunk.index, results)
            });
        }

        let mut sink = ResultSink::new(total);
        let mut reported = HashSet::with_capacity(chunks.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, results)) => {
                    reported.insert(index);
                    sink.fill(results);
                    self.telemetry.records_processed(sink.filled(), total);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Chunk task join error");
                }
            }
        }

        for chunk in chunks.iter().filter(|c| !reported.contains(&c.index)) {
            self.telemetry.chunk_state(
                chunk.index,
                &ChunkState::TransportFailed {
                    message: WORKER_STOPPED.to_string(),
                },
            );
        }

        let size = self.batch_size.get();
        sink.finish(|index| {
            let record = chunks
                .get(index / size)
                .and_then(|c| c.records.get(index % size))
                .cloned()
                .unwrap_or_default();
            RecordResult::failed(index, WORKER_STOPPED, record)
        })
    }

    /// Encode, send and decode one chunk. Never fails: transport and encode
    /// errors become one error result per record.
    pub async fn process_chunk(&self, chunk: &Chunk) -> Vec<RecordResult> {
        let envelope = match encode(&chunk.records, &self.table, &self.api_base) {
            Ok(envelope) => envelope,
            Err(e) => return self.chunk_failed(chunk, &e.to_string()),
        };

        self.telemetry.chunk_state(
            chunk.index,
            &ChunkState::Sent {
                records: chunk.len(),
            },
        );

        let text = match self.transport.send(&envelope).await {
            Ok(text) => text,
            Err(e) => return self.chunk_failed(chunk, &e.to_string()),
        };

        let results = chunk.attach(decode(&text, chunk.len()));
        let count = |status: RecordStatus| results.iter().filter(|r| r.status == status).count();
        self.telemetry.chunk_state(
            chunk.index,
            &ChunkState::Decoded {
                success: count(RecordStatus::Success),
                error: count(RecordStatus::Error),
                unknown: count(RecordStatus::Unknown),
            },
        );
        results
    }

    fn chunk_failed(&self, chunk: &Chunk, message: &str) -> Vec<RecordResult> {
        self.telemetry.chunk_state(
            chunk.index,
            &ChunkState::TransportFailed {
                message: message.to_string(),
            },
        );
        chunk.failed(message)
    }

    fn plan(&self, records: Vec<Record>, mode: ExecutionMode) -> Vec<Chunk> {
        let total_records = records.len();
        let chunks = chunk(records, self.batch_size);

        self.telemetry.run_started(&RunPlan {
            table: self.table.to_string(),
            total_records,
            chunks: chunks.len(),
            batch_size: self.batch_size.get(),
            mode,
        });
        for c in &chunks {
            self.telemetry.chunk_state(c.index, &ChunkState::Pending);
        }

        chunks
    }
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
