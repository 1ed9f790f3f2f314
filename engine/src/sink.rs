//! Index-addressed result collection.
//!
//! Chunks finish in any order; each result is written into the slot for its
//! absolute input index, so the final collection is in input order no matter
//! which worker finished first.

use dataverse_types::RecordResult;

#[derive(Debug)]
pub struct ResultSink {
    slots: Vec<Option<RecordResult>>,
    filled: usize,
}

impl ResultSink {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
            filled: 0,
        }
    }

    /// Store results at their indices. Slots are write-once: a second write
    /// for the same index, or an index past the end, is dropped and logged.
    pub fn fill(&mut self, results: Vec<RecordResult>) {
        for result in results {
            let index = result.index;
            match self.slots.get_mut(index) {
                Some(slot @ None) => {
                    *slot = Some(result);
                    self.filled += 1;
                }
                Some(Some(_)) => {
                    tracing::error!(index, "Duplicate result for record; keeping the first");
                }
                None => {
                    tracing::error!(index, len = self.slots.len(), "Result index out of range");
                }
            }
        }
    }

    #[must_use]
    pub fn filled(&self) -> usize {
        self.filled
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Results in input order. A slot nobody filled is replaced by
    /// `missing(index)` so the output always has one result per input.
    #[must_use]
    pub fn finish(self, mut missing: impl FnMut(usize) -> RecordResult) -> Vec<RecordResult> {
        if !self.is_complete() {
            tracing::error!(
                filled = self.filled,
                len = self.slots.len(),
                "Result sink finished with unfilled slots"
            );
        }
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| missing(index)))
            .collect()
    }
}
