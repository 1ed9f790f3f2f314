//! Run and chunk lifecycle hooks.
//!
//! The orchestrator reports progress through an injected [`BatchTelemetry`]
//! instead of a process-wide logger. Hooks are advisory: nothing they do can
//! change which results are produced or their order.

use std::time::Duration;

use dataverse_types::WorkerCount;

use crate::report::RunSummary;

/// How the chunks of a run are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One chunk at a time, with an optional pause between chunks.
    Sequential { pause: Duration },
    /// Up to `workers` chunks in flight.
    Concurrent { workers: WorkerCount },
}

impl ExecutionMode {
    #[must_use]
    pub const fn is_concurrent(&self) -> bool {
        matches!(self, Self::Concurrent { .. })
    }
}

/// Shape of a run, reported once before the first chunk is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub table: String,
    pub total_records: usize,
    pub chunks: usize,
    pub batch_size: usize,
    pub mode: ExecutionMode,
}

/// `Pending -> Sent -> {Decoded | TransportFailed}`. No state is revisited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Sent { records: usize },
    Decoded { success: usize, error: usize, unknown: usize },
    TransportFailed { message: String },
}

impl ChunkState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Decoded { .. } | Self::TransportFailed { .. })
    }
}

pub trait BatchTelemetry: Send + Sync {
    fn run_started(&self, _plan: &RunPlan) {}

    fn chunk_state(&self, _chunk: usize, _state: &ChunkState) {}

    /// Cumulative count of records whose chunk reached a terminal state.
    fn records_processed(&self, _done: usize, _total: usize) {}

    fn run_finished(&self, _summary: &RunSummary) {}
}

/// Emits `tracing` events with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl BatchTelemetry for TracingTelemetry {
    fn run_started(&self, plan: &RunPlan) {
        match plan.mode {
            ExecutionMode::Sequential { pause } => tracing::info!(
                table = %plan.table,
                records = plan.total_records,
                chunks = plan.chunks,
                batch_size = plan.batch_size,
                pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                "Starting sequential processing"
            ),
            ExecutionMode::Concurrent { workers } => tracing::info!(
                table = %plan.table,
                records = plan.total_records,
                chunks = plan.chunks,
                batch_size = plan.batch_size,
                workers = workers.get(),
                "Starting parallel processing"
            ),
        }
    }

    fn chunk_state(&self, chunk: usize, state: &ChunkState) {
        match state {
            ChunkState::Pending => tracing::trace!(chunk, "Chunk queued"),
            ChunkState::Sent { records } => tracing::debug!(chunk, records, "Chunk sent"),
            ChunkState::Decoded {
                success,
                error,
                unknown,
            } => tracing::debug!(chunk, success, error, unknown, "Chunk decoded"),
            ChunkState::TransportFailed { message } => {
                tracing::warn!(chunk, error = %message, "Chunk failed");
            }
        }
    }

    fn records_processed(&self, done: usize, total: usize) {
        tracing::info!(done, total, "Processed {done}/{total} records");
    }

    fn run_finished(&self, summary: &RunSummary) {
        summary.log();
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl BatchTelemetry for NoopTelemetry {}
