//! Cursor resolution.
//!
//! Turns "where did I leave off in this shard" into a cursor the reader can
//! use. With no checkpoint the cursor starts at the trim horizon; with one it
//! starts right after the checkpointed sequence number.

use crate::error::Result;
use crate::service::{IteratorPosition, StreamService};
use shardlog_core::{Cursor, SequenceNumber, ShardId};
use std::sync::Arc;
use tracing::debug;

pub struct IteratorResolver {
    service: Arc<dyn StreamService>,
    stream_name: String,
}

impl IteratorResolver {
    pub fn new(service: Arc<dyn StreamService>, stream_name: impl Into<String>) -> Self {
        Self {
            service,
            stream_name: stream_name.into(),
        }
    }

    /// Position a cursor for `shard_id`.
    ///
    /// The token is returned exactly as the service issued it. Unknown shards
    /// and sequence numbers outside the retained range fail with the service's
    /// error.
    pub async fn resolve(
        &self,
        shard_id: &ShardId,
        last_sequence_number: Option<&SequenceNumber>,
    ) -> Result<Cursor> {
        let position = Self::position_for(last_sequence_number);

        debug!(
            stream = %self.stream_name,
            shard = %shard_id,
            position = ?position,
            "Resolving shard iterator"
        );

        let cursor = self
            .service
            .get_shard_iterator(&self.stream_name, shard_id, &position)
            .await?;
        Ok(cursor)
    }

    fn position_for(last_sequence_number: Option<&SequenceNumber>) -> IteratorPosition {
        match last_sequence_number {
            Some(seq) => IteratorPosition::AfterSequenceNumber(seq.clone()),
            None => IteratorPosition::TrimHorizon,
        }
    }
}
