//! Reliable batch writes.
//!
//! A `put_records` call can accept some entries of a batch and reject the
//! rest. [`RecordWriter::write`] keeps resubmitting only the rejected entries
//! until none are left:
//!
//! ```text
//! round 1   [e0 e1 e2 e3 e4]  →  [ok  ERR ok  ERR ERR]
//! round 2   [e1 e3 e4]        →  [ok  ERR ok ]
//! round 3   [e3]              →  [ok ]
//! done: 5 records, 3 attempts
//! ```
//!
//! ## Guarantees
//!
//! - Outcomes are matched to entries by position. Entries are never compared
//!   with each other, so duplicates in a batch are retried independently.
//! - Every round builds a new [`PutRecordsRequest`] from the entries that
//!   failed in the previous round. Accepted entries are never resubmitted.
//! - Entries accepted in a later round may land after entries that were
//!   submitted behind them in the original batch.
//!
//! ## Retry budget
//!
//! Rounds are separated by the jittered backoff of the configured
//! [`RetryPolicy`] and capped at `max_retries` retries. Whole-call throttling
//! errors spend the same budget and resubmit the same entries. Any other
//! whole-call error propagates, since the service may already have stored the
//! batch. When the budget runs out the write fails with
//! [`ClientError::RetriesExhausted`].

use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;
use crate::service::{PutRecordsRequest, StreamService};
use shardlog_core::{RecordEntry, WriteOutcome};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// What a successful [`RecordWriter::write`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Entries in the batch, all of which were accepted
    pub records: usize,

    /// `put_records` calls made, including the first
    pub attempts: usize,
}

pub struct RecordWriter {
    service: Arc<dyn StreamService>,
    stream_name: String,
    retry_policy: RetryPolicy,
}

impl RecordWriter {
    pub fn new(
        service: Arc<dyn StreamService>,
        stream_name: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            service,
            stream_name: stream_name.into(),
            retry_policy,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Write every entry of `batch`, retrying rejected entries.
    ///
    /// An empty batch is a no-op and makes no service call.
    ///
    /// # Errors
    ///
    /// - `RetriesExhausted`: entries were still failing after the last round
    /// - `Service`: a whole-call error other than throttling. The batch may
    ///   or may not have been stored.
    /// - `Protocol`: the service returned the wrong number of outcomes
    pub async fn write(&self, batch: Vec<RecordEntry>) -> Result<WriteSummary> {
        let records = batch.len();
        if records == 0 {
            return Ok(WriteSummary {
                records: 0,
                attempts: 0,
            });
        }

        let mut pending = batch;
        let mut attempts = 0usize;

        loop {
            let request = PutRecordsRequest {
                stream_name: self.stream_name.clone(),
                entries: pending,
            };
            attempts += 1;

            let result = self.service.put_records(&request).await;
            let last_error = match result {
                Ok(output) => {
                    if output.outcomes.len() != request.entries.len() {
                        return Err(ClientError::Protocol(format!(
                            "put_records returned {} outcomes for {} entries",
                            output.outcomes.len(),
                            request.entries.len()
                        )));
                    }

                    let last_error = last_failure(&output.outcomes);
                    pending = failed_entries(request.entries, &output.outcomes);

                    match last_error {
                        None => {
                            debug!(
                                stream = %self.stream_name,
                                records,
                                attempts,
                                "Batch fully accepted"
                            );
                            return Ok(WriteSummary { records, attempts });
                        }
                        Some(last_error) => {
                            warn!(
                                stream = %self.stream_name,
                                attempt = attempts,
                                failed = pending.len(),
                                last_error = %last_error,
                                "Records rejected, retrying failed subset"
                            );
                            last_error
                        }
                    }
                }
                Err(e) if self.retry_policy.is_retryable(&e) => {
                    warn!(
                        stream = %self.stream_name,
                        attempt = attempts,
                        kind = %e.kind,
                        message = %e.message,
                        "Batch throttled, resubmitting"
                    );
                    pending = request.entries;
                    e.to_string()
                }
                Err(e) => return Err(e.into()),
            };

            let retries_done = attempts - 1;
            if retries_done >= self.retry_policy.max_retries {
                warn!(
                    stream = %self.stream_name,
                    attempts,
                    max_retries = self.retry_policy.max_retries,
                    failed = pending.len(),
                    "Max retries exhausted, giving up"
                );
                return Err(ClientError::RetriesExhausted {
                    attempts,
                    failed: pending.len(),
                    last_error,
                });
            }

            let backoff = self.retry_policy.jittered_backoff(retries_done);
            debug!(
                stream = %self.stream_name,
                backoff_ms = backoff.as_millis() as u64,
                "Backing off before next round"
            );
            sleep(backoff).await;
        }
    }
}

/// Entries whose aligned outcome is a failure, in their original order.
fn failed_entries(entries: Vec<RecordEntry>, outcomes: &[WriteOutcome]) -> Vec<RecordEntry> {
    entries
        .into_iter()
        .zip(outcomes)
        .filter(|(_, outcome)| outcome.is_failure())
        .map(|(entry, _)| entry)
        .collect()
}

fn last_failure(outcomes: &[WriteOutcome]) -> Option<String> {
    outcomes.iter().rev().find_map(|outcome| match outcome {
        WriteOutcome::Failed {
            error_code,
            error_message,
        } => Some(format!("{}: {}", error_code, error_message)),
        WriteOutcome::Accepted { .. } => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, data: &'static str) -> RecordEntry {
        RecordEntry::new(key, data)
    }

    #[test]
    fn test_failed_entries_positional() {
        let entries = vec![entry("a", "1"), entry("b", "2"), entry("c", "3")];
        let outcomes = vec![
            WriteOutcome::failed("InternalFailure", "x"),
            WriteOutcome::accepted("10", "shardId-000000000000"),
            WriteOutcome::failed("ProvisionedThroughputExceededException", "y"),
        ];

        let failed = failed_entries(entries, &outcomes);

        assert_eq!(failed, vec![entry("a", "1"), entry("c", "3")]);
    }

    #[test]
    fn test_failed_entries_with_identical_entries() {
        // Same key and payload three times; only the middle copy failed.
        let entries = vec![entry("k", "same"), entry("k", "same"), entry("k", "same")];
        let outcomes = vec![
            WriteOutcome::accepted("1", "shardId-000000000000"),
            WriteOutcome::failed("InternalFailure", "x"),
            WriteOutcome::accepted("2", "shardId-000000000000"),
        ];

        let failed = failed_entries(entries, &outcomes);

        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn test_last_failure_reports_latest() {
        let outcomes = vec![
            WriteOutcome::failed("InternalFailure", "first"),
            WriteOutcome::accepted("1", "shardId-000000000000"),
            WriteOutcome::failed("ProvisionedThroughputExceededException", "second"),
        ];
        assert_eq!(
            last_failure(&outcomes).as_deref(),
            Some("ProvisionedThroughputExceededException: second")
        );
        assert_eq!(
            last_failure(&[WriteOutcome::accepted("1", "shardId-000000000000")]),
            None
        );
    }
}
