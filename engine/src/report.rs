//! Aggregate counters for a finished run.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dataverse_types::{RecordResult, RecordStatus};
use serde::Serialize;

/// Number of distinct error messages kept in [`RunSummary::top_errors`].
pub const TOP_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub unknown: usize,
    /// Percent of records created, `0.0` for an empty run.
    pub success_rate: f64,
    /// Most frequent error messages, highest count first, ties alphabetical.
    pub top_errors: Vec<ErrorCount>,
    pub elapsed: Duration,
    pub records_per_second: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(
        results: &[RecordResult],
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let total = results.len();
        let mut success = 0;
        let mut error = 0;
        let mut unknown = 0;
        let mut messages: HashMap<&str, usize> = HashMap::new();

        for result in results {
            match result.status {
                RecordStatus::Success => success += 1,
                RecordStatus::Error => {
                    error += 1;
                    if let Some(message) = result.error.as_deref() {
                        *messages.entry(message).or_default() += 1;
                    }
                }
                RecordStatus::Unknown => unknown += 1,
            }
        }

        let mut top_errors: Vec<ErrorCount> = messages
            .into_iter()
            .map(|(message, count)| ErrorCount {
                message: message.to_string(),
                count,
            })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_errors.truncate(TOP_ERRORS);

        let success_rate = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64 * 100.0
        };

        let secs = elapsed.as_secs_f64();
        let records_per_second = if secs > 0.0 { total as f64 / secs } else { 0.0 };

        let finished_at = started_at
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            total,
            success,
            error,
            unknown,
            success_rate,
            top_errors,
            elapsed,
            records_per_second,
            started_at,
            finished_at,
        }
    }

    /// Emit the processing report through `tracing`.
    pub fn log(&self) {
        tracing::info!(
            total = self.total,
            success = self.success,
            error = self.error,
            unknown = self.unknown,
            success_rate = format_args!("{:.2}%", self.success_rate),
            elapsed_secs = format_args!("{:.2}", self.elapsed.as_secs_f64()),
            records_per_second = format_args!("{:.2}", self.records_per_second),
            "Processing report"
        );
        for entry in &self.top_errors {
            tracing::warn!(count = entry.count, message = %entry.message, "Frequent error");
        }
    }
}

/// Ordered per-record results plus the summary computed from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<RecordResult>,
    pub summary: RunSummary,
}

impl BatchReport {
    #[must_use]
    pub fn new(results: Vec<RecordResult>, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        let summary = RunSummary::from_results(&results, started_at, elapsed);
        Self { results, summary }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now(), Duration::ZERO)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
