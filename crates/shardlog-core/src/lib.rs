//! Shardlog Core
//!
//! Value types shared by every layer of the shardlog client: shard metadata,
//! read cursors, inbound records, outbound record entries and per-entry write
//! outcomes.

pub mod record;
pub mod shard;

pub use record::{Record, RecordEntry, SequenceNumber, WriteOutcome};
pub use shard::{Cursor, HashKeyRange, SequenceNumberRange, Shard, ShardId};
