//! Error types for shardlog client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Service errors**: `Service` wraps whatever the stream service reported.
//!   Shard discovery, cursor resolution and reads never retry them; the
//!   caller decides whether to repeat the whole operation.
//! - **Write budget**: `RetriesExhausted` is returned when a batch still has
//!   failing entries after the configured number of retry rounds.
//! - **Client errors**: `ConfigError`, `Closed`
//! - **Service misbehaviour**: `Protocol`
//!
//! ## Examples
//!
//! ```ignore
//! use shardlog_client::{ClientError, ServiceErrorKind};
//!
//! match client.read(&cursor).await {
//!     Ok(batch) => process(batch.records),
//!     Err(ClientError::Service(e)) if e.kind == ServiceErrorKind::ExpiredIterator => {
//!         // resolve a fresh cursor from the last processed sequence number
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use crate::service::ServiceError;
use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The stream service rejected or failed a call.
    ///
    /// Automatically converted from `ServiceError` via `#[from]`.
    #[error("Stream service error: {0}")]
    Service(#[from] ServiceError),

    /// A batch still had failing entries after the last permitted round.
    ///
    /// `attempts` counts every submission made for the batch, including the
    /// first. `failed` is the number of entries that were never accepted and
    /// `last_error` describes the most recent failure seen for them.
    #[error("Write retries exhausted after {attempts} attempts, {failed} records still failing (last error: {last_error})")]
    RetriesExhausted {
        attempts: usize,
        failed: usize,
        last_error: String,
    },

    /// The service returned a response that breaks the call contract.
    ///
    /// ## Causes
    /// - `put_records` returned a different number of outcomes than entries
    /// - shard pagination reported more shards but made no progress
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Invalid client configuration.
    ///
    /// ## Causes
    /// - Required builder fields missing (service, stream name)
    /// - Read limit outside the accepted range
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The connection was already released.
    #[error("Client connection already closed")]
    Closed,
}

impl ClientError {
    /// The underlying service error, if this error came from the service.
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            ClientError::Service(e) => Some(e),
            _ => None,
        }
    }
}
