//! Shardlog Client - shard discovery, cursor reads and reliable batch writes
//!
//! This crate is the client-side access layer for a shard-partitioned,
//! append-only stream service. It talks to the service only through the
//! [`StreamService`] trait, so the same logic runs against a real backend or
//! the bundled [`InMemoryStreamService`].
//!
//! # Components
//!
//! - [`ShardCatalog`]: every shard of a stream, across paginated listings
//! - [`IteratorResolver`]: a cursor at trim horizon or after a sequence number
//! - [`RecordReader`]: one bounded batch of records plus the next cursor
//! - [`RecordWriter`]: a batch written until every entry is accepted, retrying
//!   only the rejected entries
//! - [`ServiceConnection`]: releases the service connection exactly once
//!
//! [`StreamClient`] ties them to one stream name and one connection.
//!
//! # Examples
//!
//! ## Reading a stream
//!
//! ```ignore
//! use shardlog_client::StreamClient;
//!
//! let client = StreamClient::builder()
//!     .service(service)
//!     .stream_name("orders")
//!     .build()?;
//!
//! for shard in client.list_shards().await? {
//!     let mut cursor = Some(client.resolve_iterator(&shard.shard_id, None).await?);
//!     while let Some(current) = cursor {
//!         let batch = client.read(&current).await?;
//!         for record in &batch.records {
//!             println!("{} {:?}", record.sequence_number, record.data);
//!         }
//!         if batch.records.is_empty() {
//!             break;
//!         }
//!         cursor = batch.next_cursor;
//!     }
//! }
//! ```
//!
//! ## Writing a batch
//!
//! ```ignore
//! use shardlog_client::RecordEntry;
//!
//! let summary = client
//!     .write(vec![
//!         RecordEntry::new("user123", "order 1"),
//!         RecordEntry::new("user456", "order 2"),
//!     ])
//!     .await?;
//! println!("{} records in {} attempts", summary.records, summary.attempts);
//!
//! client.close().await?;
//! ```

pub mod catalog;
pub mod client;
pub mod connection;
pub mod error;
pub mod memory;
pub mod reader;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod writer;

pub use catalog::ShardCatalog;
pub use client::{ClientConfig, StreamClient, StreamClientBuilder};
pub use connection::ServiceConnection;
pub use error::{ClientError, Result};
pub use memory::{InMemoryStreamService, PutFault};
pub use reader::{ReadBatch, RecordReader, DEFAULT_READ_LIMIT, MAX_READ_LIMIT};
pub use resolver::IteratorResolver;
pub use retry::RetryPolicy;
pub use service::{
    DescribeShardsPage, GetRecordsOutput, IteratorPosition, PutRecordsOutput, PutRecordsRequest,
    ServiceError, ServiceErrorKind, StreamService,
};
pub use writer::{RecordWriter, WriteSummary};

pub use shardlog_core::{
    Cursor, HashKeyRange, Record, RecordEntry, SequenceNumber, SequenceNumberRange, Shard, ShardId,
    WriteOutcome,
};
