//! Shard Metadata
//!
//! A stream is split into shards. Each shard owns a contiguous range of the
//! hash-key space and an independent, append-only sequence of records.
//!
//! ## Lifecycle of a Shard
//! ```text
//!            split                      merge
//!  shard-0 ────────→ shard-1 (parent 0)    shard-1 ─┐
//!         └────────→ shard-2 (parent 0)    shard-2 ─┴──→ shard-3 (parent 1, adjacent parent 2)
//! ```
//! While a shard accepts writes its sequence-number range has no upper bound.
//! Once it is split or merged the range is closed and readers eventually reach
//! the end of it.
//!
//! Shard values are facts reported by the service. The client never mutates
//! them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a shard, unique within its stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ShardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque read position inside one shard.
///
/// Cursors are issued by the service and expire after a service-defined
/// window. They are passed back verbatim and never inspected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens can be long; keep log lines short.
impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREFIX: usize = 16;
        match self.0.char_indices().nth(PREFIX) {
            Some((idx, _)) => write!(f, "Cursor({}…)", &self.0[..idx]),
            None => write!(f, "Cursor({})", self.0),
        }
    }
}

/// Inclusive range of hash keys (128-bit values rendered as decimal strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashKeyRange {
    pub starting_hash_key: String,
    pub ending_hash_key: String,
}

/// Range of sequence numbers held by a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumberRange {
    pub starting_sequence_number: String,

    /// `None` while the shard is still open for writes.
    pub ending_sequence_number: Option<String>,
}

/// A shard of a stream, as reported by shard discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub shard_id: ShardId,

    /// Shard this one was split from (or the first of two merged shards)
    pub parent_shard_id: Option<ShardId>,

    /// Second parent when this shard is the product of a merge
    pub adjacent_parent_shard_id: Option<ShardId>,

    pub hash_key_range: HashKeyRange,

    pub sequence_number_range: SequenceNumberRange,
}

impl Shard {
    /// Create a root shard (no parents) that is still open.
    pub fn new(
        shard_id: impl Into<ShardId>,
        hash_key_range: HashKeyRange,
        starting_sequence_number: impl Into<String>,
    ) -> Self {
        Self {
            shard_id: shard_id.into(),
            parent_shard_id: None,
            adjacent_parent_shard_id: None,
            hash_key_range,
            sequence_number_range: SequenceNumberRange {
                starting_sequence_number: starting_sequence_number.into(),
                ending_sequence_number: None,
            },
        }
    }

    /// Whether the shard still accepts new records.
    pub fn is_open(&self) -> bool {
        self.sequence_number_range.ending_sequence_number.is_none()
    }

    /// Whether `parent` is one of this shard's parents.
    pub fn is_child_of(&self, parent: &ShardId) -> bool {
        self.parent_shard_id.as_ref() == Some(parent)
            || self.adjacent_parent_shard_id.as_ref() == Some(parent)
    }
}
