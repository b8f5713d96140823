//! Shard discovery.
//!
//! The service lists shards a page at a time. [`ShardCatalog::list_shards`]
//! keeps asking for the next page, starting after the last shard accumulated
//! so far, until the service says there is nothing more:
//!
//! ```text
//! describe(start = None)          → [s0, s1, s2]  has_more
//! describe(start = s2)            → [s3, s4]      has_more
//! describe(start = s4)            → [s5]          done
//! result                          = [s0 .. s5]
//! ```
//!
//! A failed page aborts the whole listing; nothing partial is returned.

use crate::error::{ClientError, Result};
use crate::service::StreamService;
use shardlog_core::{Shard, ShardId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Enumerates every shard of one stream.
pub struct ShardCatalog {
    service: Arc<dyn StreamService>,
    stream_name: String,
}

impl ShardCatalog {
    pub fn new(service: Arc<dyn StreamService>, stream_name: impl Into<String>) -> Self {
        Self {
            service,
            stream_name: stream_name.into(),
        }
    }

    /// List all shards of the stream, duplicate-free, in first-seen order.
    ///
    /// # Errors
    ///
    /// - `Service`: any describe call failed (not retried)
    /// - `Protocol`: the service kept reporting more shards without returning
    ///   any new ones
    pub async fn list_shards(&self) -> Result<Vec<Shard>> {
        let mut shards: Vec<Shard> = Vec::new();
        let mut seen: HashSet<ShardId> = HashSet::new();
        let mut exclusive_start: Option<ShardId> = None;
        let mut page_number = 0usize;

        loop {
            let page = self
                .service
                .describe_shards(&self.stream_name, exclusive_start.as_ref())
                .await?;
            page_number += 1;

            let page_len = page.shards.len();
            let mut added = 0usize;
            for shard in page.shards {
                if seen.insert(shard.shard_id.clone()) {
                    shards.push(shard);
                    added += 1;
                }
            }

            debug!(
                stream = %self.stream_name,
                page = page_number,
                shards = page_len,
                new_shards = added,
                has_more = page.has_more_shards,
                "Described shard page"
            );

            let last_accumulated = match shards.last() {
                Some(shard) if page.has_more_shards => shard.shard_id.clone(),
                _ => break,
            };

            if exclusive_start.as_ref() == Some(&last_accumulated) {
                return Err(ClientError::Protocol(format!(
                    "stream '{}' reported more shards after '{}' but returned none",
                    self.stream_name, last_accumulated
                )));
            }
            exclusive_start = Some(last_accumulated);
        }

        Ok(shards)
    }
}
