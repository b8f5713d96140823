//! Stream Service Boundary
//!
//! Every network round trip the client makes goes through the
//! [`StreamService`] trait. Implementations own the session with the stream
//! store (endpoint, credentials, wire encoding); the client only decides
//! *which* calls to make and how to react to their results.
//!
//! ## Operations
//!
//! ```text
//! describe_shards     one page of shards, plus whether more remain
//! get_shard_iterator  a cursor at trim horizon or after a sequence number
//! get_records         up to `limit` records from a cursor, plus the next cursor
//! put_records         one outcome per submitted entry, order-aligned
//! shutdown            release the underlying connection
//! ```
//!
//! ## Errors
//!
//! Whole-call failures are reported as [`ServiceError`]. Per-entry write
//! failures are *not* errors: they come back inside
//! [`PutRecordsOutput::outcomes`].

use async_trait::async_trait;
use shardlog_core::{Cursor, Record, RecordEntry, SequenceNumber, Shard, ShardId, WriteOutcome};
use std::fmt;
use thiserror::Error;

/// Where a new cursor should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    /// The oldest record still retained in the shard.
    TrimHorizon,

    /// Immediately after the given sequence number.
    AfterSequenceNumber(SequenceNumber),
}

/// One page of a shard listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeShardsPage {
    pub shards: Vec<Shard>,
    pub has_more_shards: bool,
}

/// Result of a single `get_records` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRecordsOutput {
    pub records: Vec<Record>,

    /// `None` once a closed shard has been read to its end.
    pub next_cursor: Option<Cursor>,

    /// How far the returned records trail the tip of the shard.
    pub millis_behind_latest: Option<u64>,
}

/// An immutable ingestion request. A new one is built for every round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecordsRequest {
    pub stream_name: String,
    pub entries: Vec<RecordEntry>,
}

/// Result of a `put_records` call: `outcomes[i]` belongs to `entries[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecordsOutput {
    pub outcomes: Vec<WriteOutcome>,
}

impl PutRecordsOutput {
    pub fn failed_record_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Category of a whole-call service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// Stream or shard does not exist
    ResourceNotFound,
    /// Malformed request, or a sequence number outside the retained range
    InvalidArgument,
    /// The cursor's validity window has passed
    ExpiredIterator,
    /// Request rate above the shard's provisioned throughput
    ProvisionedThroughputExceeded,
    /// Account-level limit hit
    LimitExceeded,
    /// Service temporarily unavailable
    Unavailable,
    /// Service-side failure
    Internal,
    /// Connection or protocol failure below the service
    Transport,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceErrorKind::ResourceNotFound => "ResourceNotFound",
            ServiceErrorKind::InvalidArgument => "InvalidArgument",
            ServiceErrorKind::ExpiredIterator => "ExpiredIterator",
            ServiceErrorKind::ProvisionedThroughputExceeded => "ProvisionedThroughputExceeded",
            ServiceErrorKind::LimitExceeded => "LimitExceeded",
            ServiceErrorKind::Unavailable => "Unavailable",
            ServiceErrorKind::Internal => "Internal",
            ServiceErrorKind::Transport => "Transport",
        };
        f.write_str(name)
    }
}

/// A failed service call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::ResourceNotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidArgument, message)
    }

    pub fn expired_iterator(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::ExpiredIterator, message)
    }

    pub fn throughput_exceeded(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::ProvisionedThroughputExceeded, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unavailable, message)
    }
}

/// Capability the client needs from the stream store.
///
/// Calls are awaited one at a time by the client. Implementations must be
/// `Send + Sync` so a client can be moved between tasks, but the client never
/// issues concurrent calls on its own.
#[async_trait]
pub trait StreamService: Send + Sync {
    /// List one page of shards, starting after `exclusive_start_shard_id`.
    async fn describe_shards(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&ShardId>,
    ) -> Result<DescribeShardsPage, ServiceError>;

    /// Obtain a cursor into `shard_id` at `position`.
    async fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &ShardId,
        position: &IteratorPosition,
    ) -> Result<Cursor, ServiceError>;

    /// Fetch at most `limit` records from `cursor`.
    async fn get_records(&self, cursor: &Cursor, limit: usize)
        -> Result<GetRecordsOutput, ServiceError>;

    /// Submit a batch of entries for ingestion.
    async fn put_records(&self, request: &PutRecordsRequest)
        -> Result<PutRecordsOutput, ServiceError>;

    /// Release the underlying connection.
    async fn shutdown(&self) -> Result<(), ServiceError>;
}
