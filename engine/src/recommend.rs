//! Batch settings suggested from the size of the input.

use serde::Serialize;

const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 1000;
const MIN_WORKERS: usize = 2;
const MAX_WORKERS: usize = 10;
/// Inputs above this many records are worth sending concurrently.
const PARALLEL_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRecommendation {
    pub batch_size: usize,
    pub parallel: bool,
    pub workers: usize,
}

#[must_use]
pub fn recommend(total_records: usize) -> BatchRecommendation {
    BatchRecommendation {
        batch_size: (total_records / 10).clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
        parallel: total_records > PARALLEL_THRESHOLD,
        workers: (total_records / 500).clamp(MIN_WORKERS, MAX_WORKERS),
    }
}
