//! Stream client facade.
//!
//! [`StreamClient`] binds one stream name and one service connection to the
//! four components and owns the connection's lifecycle.
//!
//! ## Examples
//!
//! ```ignore
//! use shardlog_client::{RecordEntry, StreamClient};
//!
//! let client = StreamClient::builder()
//!     .service(service)
//!     .stream_name("orders")
//!     .read_limit(500)
//!     .build()?;
//!
//! for shard in client.list_shards().await? {
//!     let cursor = client.resolve_iterator(&shard.shard_id, None).await?;
//!     let batch = client.read(&cursor).await?;
//!     println!("{}: {} records", shard.shard_id, batch.records.len());
//! }
//!
//! client.write(vec![RecordEntry::new("user123", "order data")]).await?;
//! client.close().await?;
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Creation**: `StreamClient::builder()` validates the configuration
//! 2. **Usage**: any number of sequential operations
//! 3. **Cleanup**: `close()` consumes the client and shuts the connection down.
//!    A client dropped without `close()` still releases its connection in the
//!    background (see [`ServiceConnection`]).
//!
//! ## Concurrency
//!
//! Every operation awaits its service calls one after another. Reading many
//! shards in parallel is up to the caller, e.g. one task per shard.

use crate::catalog::ShardCatalog;
use crate::connection::ServiceConnection;
use crate::error::{ClientError, Result};
use crate::reader::{ReadBatch, RecordReader, DEFAULT_READ_LIMIT, MAX_READ_LIMIT};
use crate::resolver::IteratorResolver;
use crate::retry::RetryPolicy;
use crate::service::StreamService;
use crate::writer::{RecordWriter, WriteSummary};
use shardlog_core::{Cursor, RecordEntry, SequenceNumber, Shard, ShardId};
use std::sync::Arc;
use tracing::info;

/// Client configuration, produced by [`StreamClientBuilder`].
///
/// - `stream_name`: required
/// - `read_limit`: records per read (default: 1000, max: 10000)
/// - `retry_policy`: write retry budget and backoff (default: `RetryPolicy::default()`)
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub stream_name: String,
    pub read_limit: usize,
    pub retry_policy: RetryPolicy,
}

impl ClientConfig {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            read_limit: DEFAULT_READ_LIMIT,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_name.trim().is_empty() {
            return Err(ClientError::ConfigError(
                "stream_name must not be empty".to_string(),
            ));
        }
        if self.read_limit == 0 || self.read_limit > MAX_READ_LIMIT {
            return Err(ClientError::ConfigError(format!(
                "read_limit must be between 1 and {}, got {}",
                MAX_READ_LIMIT, self.read_limit
            )));
        }
        if self.retry_policy.backoff_multiplier < 1.0 {
            return Err(ClientError::ConfigError(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.retry_policy.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Access to one stream through one service connection.
pub struct StreamClient {
    config: ClientConfig,
    connection: ServiceConnection,
}

impl StreamClient {
    /// Create a new `StreamClientBuilder`.
    ///
    /// # Returns
    ///
    /// A builder with the default read limit and retry policy. `service` and
    /// `stream_name` must be set before `build()`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let client = StreamClient::builder()
    ///     .service(service)
    ///     .stream_name("orders")
    ///     .build()?;
    /// ```
    pub fn builder() -> StreamClientBuilder {
        StreamClientBuilder::new()
    }

    /// Create a client from an already assembled configuration.
    ///
    /// # Arguments
    ///
    /// * `service` - Stream service the connection is opened on
    /// * `config` - Validated before use
    ///
    /// # Errors
    ///
    /// `ConfigError` if `config` fails [`ClientConfig::validate`].
    pub fn new(service: Arc<dyn StreamService>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        info!(
            stream = %config.stream_name,
            read_limit = config.read_limit,
            max_retries = config.retry_policy.max_retries,
            "Stream client initialized"
        );
        Ok(Self {
            connection: ServiceConnection::new(service, config.stream_name.clone()),
            config,
        })
    }

    /// The validated configuration this client runs with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// A [`ShardCatalog`] bound to this client's stream and connection.
    ///
    /// The component factories return `Closed` once the connection has been
    /// released.
    pub fn catalog(&self) -> Result<ShardCatalog> {
        Ok(ShardCatalog::new(
            self.connection.service()?,
            self.config.stream_name.clone(),
        ))
    }

    /// An [`IteratorResolver`] bound to this client's stream and connection.
    pub fn resolver(&self) -> Result<IteratorResolver> {
        Ok(IteratorResolver::new(
            self.connection.service()?,
            self.config.stream_name.clone(),
        ))
    }

    /// A [`RecordReader`] using the configured read limit.
    pub fn reader(&self) -> Result<RecordReader> {
        Ok(RecordReader::new(
            self.connection.service()?,
            self.config.read_limit,
        ))
    }

    /// A [`RecordWriter`] using the configured retry policy.
    pub fn writer(&self) -> Result<RecordWriter> {
        Ok(RecordWriter::new(
            self.connection.service()?,
            self.config.stream_name.clone(),
            self.config.retry_policy.clone(),
        ))
    }

    /// All shards of the stream. See [`ShardCatalog::list_shards`].
    pub async fn list_shards(&self) -> Result<Vec<Shard>> {
        self.catalog()?.list_shards().await
    }

    /// Cursor at trim horizon, or after `last_sequence_number`. See [`IteratorResolver::resolve`].
    pub async fn resolve_iterator(
        &self,
        shard_id: &ShardId,
        last_sequence_number: Option<&SequenceNumber>,
    ) -> Result<Cursor> {
        self.resolver()?.resolve(shard_id, last_sequence_number).await
    }

    /// One bounded batch of records. See [`RecordReader::read`].
    pub async fn read(&self, cursor: &Cursor) -> Result<ReadBatch> {
        self.reader()?.read(cursor).await
    }

    /// Write a batch until every entry is accepted. See [`RecordWriter::write`].
    pub async fn write(&self, batch: Vec<RecordEntry>) -> Result<WriteSummary> {
        self.writer()?.write(batch).await
    }

    /// Release the service connection.
    ///
    /// # Note
    ///
    /// This method consumes `self`, so the client cannot be used after
    /// closing. Components obtained earlier from `catalog()`, `reader()` and
    /// the like keep their own handle to the service, but the service itself
    /// has been shut down.
    ///
    /// # Errors
    ///
    /// The service's error if `shutdown` fails. The connection counts as
    /// released either way and is not shut down again on drop.
    pub async fn close(mut self) -> Result<()> {
        self.connection.release().await
    }
}

/// Builder for [`StreamClient`].
pub struct StreamClientBuilder {
    service: Option<Arc<dyn StreamService>>,
    stream_name: Option<String>,
    read_limit: usize,
    retry_policy: RetryPolicy,
}

impl StreamClientBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            stream_name: None,
            read_limit: DEFAULT_READ_LIMIT,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the stream service (required).
    pub fn service(mut self, service: Arc<dyn StreamService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the stream to operate on (required).
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    /// Set the maximum number of records returned by one read.
    ///
    /// # Default
    ///
    /// 1000 records. The service rejects values above 10000.
    pub fn read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }

    /// Set the write retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set only the number of write retry rounds, keeping the backoff settings.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.retry_policy.max_retries = retries;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<StreamClient> {
        let service = self
            .service
            .ok_or_else(|| ClientError::ConfigError("service is required".to_string()))?;
        let stream_name = self
            .stream_name
            .ok_or_else(|| ClientError::ConfigError("stream_name is required".to_string()))?;

        let config = ClientConfig {
            stream_name,
            read_limit: self.read_limit,
            retry_policy: self.retry_policy,
        };

        StreamClient::new(service, config)
    }
}

impl Default for StreamClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("orders");
        assert_eq!(config.read_limit, 1000);
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_empty_stream_name() {
        let config = ClientConfig::new("  ");
        assert!(matches!(config.validate(), Err(ClientError::ConfigError(_))));
    }

    #[test]
    fn test_config_read_limit_bounds() {
        let mut config = ClientConfig::new("orders");

        config.read_limit = 0;
        assert!(config.validate().is_err());

        config.read_limit = MAX_READ_LIMIT + 1;
        assert!(config.validate().is_err());

        config.read_limit = MAX_READ_LIMIT;
        assert!(config.validate().is_ok());

        config.read_limit = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_shrinking_backoff() {
        let mut config = ClientConfig::new("orders");
        config.retry_policy =
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1), 0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_requires_service() {
        let result = StreamClient::builder().stream_name("orders").build();
        match result {
            Err(ClientError::ConfigError(msg)) => assert!(msg.contains("service")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }
}
