//! Order-preserving partition of the input into batch-sized chunks.

use dataverse_types::{BatchSize, Record, RecordOutcome, RecordResult};

/// A contiguous run of input records sent as one `$batch` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position among all chunks.
    pub index: usize,
    /// Absolute input index of `records[0]`.
    pub start: usize,
    pub records: Vec<Record>,
}

impl Chunk {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Absolute input indices covered by this chunk.
    #[must_use]
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.records.len()
    }

    /// Pair decoded outcomes with their records. `outcomes[i]` belongs to `records[i]`.
    #[must_use]
    pub fn attach(&self, outcomes: Vec<RecordOutcome>) -> Vec<RecordResult> {
        debug_assert_eq!(outcomes.len(), self.records.len());
        outcomes
            .into_iter()
            .zip(&self.records)
            .enumerate()
            .map(|(offset, (outcome, record))| {
                RecordResult::new(self.start + offset, outcome, record.clone())
            })
            .collect()
    }

    /// One error result per record, used when the chunk as a whole failed.
    #[must_use]
    pub fn failed(&self, message: &str) -> Vec<RecordResult> {
        self.records
            .iter()
            .enumerate()
            .map(|(offset, record)| RecordResult::failed(self.start + offset, message, record.clone()))
            .collect()
    }
}

/// Split `records` into chunks of `batch_size`; only the last may be shorter.
///
/// Empty input yields no chunks.
#[must_use]
pub fn chunk(records: Vec<Record>, batch_size: BatchSize) -> Vec<Chunk> {
    let size = batch_size.get();
    let mut chunks = Vec::with_capacity(records.len().div_ceil(size));
    let mut remaining = records.into_iter().peekable();

    while remaining.peek().is_some() {
        let index = chunks.len();
        chunks.push(Chunk {
            index,
            start: index * size,
            records: remaining.by_ref().take(size).collect(),
        });
    }

    chunks
}
