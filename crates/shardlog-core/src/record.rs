//! Record Data Structures
//!
//! This module defines the two record shapes that cross the client boundary:
//!
//! - [`Record`]: a record read back from a shard, carrying the sequence number
//!   the service assigned when it was accepted.
//! - [`RecordEntry`]: a record the caller wants ingested. It has no sequence
//!   number yet; the service picks the shard from the partition key (or from
//!   the explicit hash key, when one is given).
//!
//! Submitting a batch of entries yields one [`WriteOutcome`] per entry, in the
//! same order as the entries were submitted.
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for payloads so batches can be narrowed and resubmitted
//!   without copying record data
//! - Sequence numbers are kept as opaque strings: the service hands out
//!   arbitrarily large decimal values and the client only ever echoes them back
//!
//! ## Example
//! ```ignore
//! let entry = RecordEntry::new("user123", Bytes::from(r#"{"action": "click"}"#));
//! ```

use crate::shard::ShardId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-shard sequence number assigned by the service to an accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(String);

impl SequenceNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SequenceNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A record read from a shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Sequence number of this record within its shard
    pub sequence_number: SequenceNumber,

    /// Partition key the record was written with
    pub partition_key: String,

    /// Payload
    pub data: Bytes,

    /// Approximate time the service accepted the record, in milliseconds since epoch
    pub approximate_arrival_timestamp: Option<i64>,
}

impl Record {
    pub fn new(
        sequence_number: SequenceNumber,
        partition_key: impl Into<String>,
        data: Bytes,
    ) -> Self {
        Self {
            sequence_number,
            partition_key: partition_key.into(),
            data,
            approximate_arrival_timestamp: None,
        }
    }

    /// Estimate the size of this record in bytes
    pub fn estimated_size(&self) -> usize {
        self.sequence_number.as_str().len() + self.partition_key.len() + self.data.len()
    }
}

/// A record submitted for ingestion.
///
/// Entries are immutable once built. The writer matches them to their outcomes
/// by position only, so two identical entries in one batch are two distinct
/// submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Key hashed by the service to choose the destination shard
    pub partition_key: String,

    /// Payload
    pub data: Bytes,

    /// Overrides the hash of `partition_key` when set
    pub explicit_hash_key: Option<String>,
}

impl RecordEntry {
    pub fn new(partition_key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            partition_key: partition_key.into(),
            data: data.into(),
            explicit_hash_key: None,
        }
    }

    pub fn with_explicit_hash_key(mut self, hash_key: impl Into<String>) -> Self {
        self.explicit_hash_key = Some(hash_key.into());
        self
    }
}

/// Result of submitting a single [`RecordEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// The entry was appended to `shard_id` at `sequence_number`.
    Accepted {
        sequence_number: SequenceNumber,
        shard_id: ShardId,
    },

    /// The entry was rejected; it may be resubmitted.
    Failed {
        error_code: String,
        error_message: String,
    },
}

impl WriteOutcome {
    pub fn accepted(
        sequence_number: impl Into<SequenceNumber>,
        shard_id: impl Into<ShardId>,
    ) -> Self {
        WriteOutcome::Accepted {
            sequence_number: sequence_number.into(),
            shard_id: shard_id.into(),
        }
    }

    pub fn failed(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        WriteOutcome::Failed {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::Failed { .. })
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            WriteOutcome::Accepted { .. } => None,
            WriteOutcome::Failed { error_code, .. } => Some(error_code),
        }
    }
}
