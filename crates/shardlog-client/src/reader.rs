//! Bounded record reads from a cursor.
//!
//! One [`RecordReader::read`] is one `get_records` call. The caller loops:
//!
//! ```ignore
//! let mut cursor = Some(client.resolve_iterator(&shard_id, None).await?);
//! while let Some(current) = cursor {
//!     let batch = client.read(&current).await?;
//!     process(&batch.records);
//!     cursor = batch.next_cursor;
//! }
//! ```
//!
//! An empty batch is normal (nothing new yet). A missing next cursor means
//! the shard was closed by a split or merge and every record has been read.
//! Expired cursors come back as a service error and are not re-resolved here.

use crate::error::Result;
use crate::service::StreamService;
use shardlog_core::{Cursor, Record};
use std::sync::Arc;
use tracing::debug;

/// Default cap on records returned by one read.
pub const DEFAULT_READ_LIMIT: usize = 1000;

/// Largest cap the service accepts for one read.
pub const MAX_READ_LIMIT: usize = 10_000;

/// Records returned by one read, plus where to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    pub records: Vec<Record>,
    pub next_cursor: Option<Cursor>,
    pub millis_behind_latest: Option<u64>,
}

impl ReadBatch {
    /// True once the shard is closed and fully consumed.
    pub fn is_end_of_shard(&self) -> bool {
        self.next_cursor.is_none()
    }
}

pub struct RecordReader {
    service: Arc<dyn StreamService>,
    read_limit: usize,
}

impl RecordReader {
    /// `read_limit` is validated by the client builder.
    pub fn new(service: Arc<dyn StreamService>, read_limit: usize) -> Self {
        Self {
            service,
            read_limit,
        }
    }

    pub fn read_limit(&self) -> usize {
        self.read_limit
    }

    /// Fetch at most `read_limit` records starting at `cursor`.
    pub async fn read(&self, cursor: &Cursor) -> Result<ReadBatch> {
        let output = self.service.get_records(cursor, self.read_limit).await?;

        debug!(
            cursor = ?cursor,
            records = output.records.len(),
            end_of_shard = output.next_cursor.is_none(),
            millis_behind_latest = ?output.millis_behind_latest,
            "Read records"
        );

        Ok(ReadBatch {
            records: output.records,
            next_cursor: output.next_cursor,
            millis_behind_latest: output.millis_behind_latest,
        })
    }
}
