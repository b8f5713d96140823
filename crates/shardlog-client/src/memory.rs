//! In-memory stream service.
//!
//! A complete [`StreamService`] that keeps streams, shards and records in
//! process memory. It exists for tests and demos: no network, deterministic
//! sequence numbers, and hooks to reproduce the awkward cases of a real
//! service:
//!
//! - shard listings split over several pages (`with_page_size`)
//! - shard splits that close a parent and open two children (`split_shard`)
//! - cursors that stop being valid (`expire_cursors`)
//! - partial and whole-call write failures (`inject_put_fault`)
//!
//! ## Routing
//!
//! Each shard owns a slice of the 128-bit hash-key space. A record goes to the
//! open shard whose range contains its explicit hash key, or else the SipHash
//! of its partition key spread over 128 bits.
//!
//! ## Cursors
//!
//! Tokens encode `epoch|stream|shard|position`. Bumping the epoch with
//! `expire_cursors` turns every outstanding token into an `ExpiredIterator`
//! error.

use crate::reader::MAX_READ_LIMIT;
use crate::service::{
    DescribeShardsPage, GetRecordsOutput, IteratorPosition, PutRecordsOutput, PutRecordsRequest,
    ServiceError, ServiceErrorKind, StreamService,
};
use async_trait::async_trait;
use shardlog_core::{
    Cursor, HashKeyRange, Record, RecordEntry, SequenceNumber, Shard, ShardId, WriteOutcome,
};
use siphasher::sip::SipHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Default number of shards returned per `describe_shards` page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A scripted disturbance for the next `put_records` call.
#[derive(Debug, Clone)]
pub enum PutFault {
    /// Reject the entries at these positions of the request with
    /// `ProvisionedThroughputExceededException`; accept the rest.
    Reject(Vec<usize>),

    /// Fail the whole call with this error.
    Error(ServiceError),
}

struct ShardState {
    shard: Shard,
    records: Vec<Record>,
}

impl ShardState {
    fn owns(&self, hash_key: u128) -> bool {
        let start = self.shard.hash_key_range.starting_hash_key.parse::<u128>();
        let end = self.shard.hash_key_range.ending_hash_key.parse::<u128>();
        matches!((start, end), (Ok(s), Ok(e)) if s <= hash_key && hash_key <= e)
    }
}

#[derive(Default)]
struct StreamState {
    // Kept sorted by shard id.
    shards: Vec<ShardState>,
    next_shard_index: u64,
}

impl StreamState {
    fn shard(&self, shard_id: &ShardId) -> Option<&ShardState> {
        self.shards.iter().find(|s| &s.shard.shard_id == shard_id)
    }

    fn shard_mut(&mut self, shard_id: &ShardId) -> Option<&mut ShardState> {
        self.shards.iter_mut().find(|s| &s.shard.shard_id == shard_id)
    }

    fn allocate_shard_id(&mut self) -> ShardId {
        let id = ShardId::new(format!("shardId-{:012}", self.next_shard_index));
        self.next_shard_index += 1;
        id
    }
}

#[derive(Default)]
struct State {
    streams: HashMap<String, StreamState>,
    put_faults: VecDeque<PutFault>,
    next_sequence: u64,
    cursor_epoch: u64,
    shut_down: bool,
    shutdown_calls: usize,
    put_calls: usize,
}

/// Stream service backed by process memory.
pub struct InMemoryStreamService {
    state: Mutex<State>,
    page_size: usize,
}

impl InMemoryStreamService {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Return at most `page_size` shards per describe call (minimum 1).
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State {
                next_sequence: 1,
                ..State::default()
            }),
            page_size: page_size.max(1),
        }
    }

    /// Create a stream whose hash-key space is split evenly over `shard_count` shards.
    pub async fn create_stream(
        &self,
        stream_name: &str,
        shard_count: usize,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        if state.streams.contains_key(stream_name) {
            return Err(ServiceError::new(
                ServiceErrorKind::InvalidArgument,
                format!("stream '{}' already exists", stream_name),
            ));
        }
        if shard_count == 0 {
            return Err(ServiceError::invalid_argument("shard_count must be at least 1"));
        }

        let starting_sequence = state.next_sequence.to_string();
        let mut stream = StreamState::default();
        let width = u128::MAX / shard_count as u128;
        for i in 0..shard_count {
            let start = width * i as u128;
            let end = if i + 1 == shard_count {
                u128::MAX
            } else {
                start + width - 1
            };
            let shard_id = stream.allocate_shard_id();
            stream.shards.push(ShardState {
                shard: Shard::new(shard_id, hash_range(start, end), starting_sequence.clone()),
                records: Vec::new(),
            });
        }

        state.streams.insert(stream_name.to_string(), stream);
        Ok(())
    }

    /// Close `shard_id` and replace it with two children that split its hash range.
    ///
    /// Returns the ids of the two new shards.
    pub async fn split_shard(
        &self,
        stream_name: &str,
        shard_id: &ShardId,
    ) -> Result<(ShardId, ShardId), ServiceError> {
        let mut state = self.state.lock().await;
        let starting_sequence = state.next_sequence.to_string();
        let stream = stream_mut(&mut state.streams, stream_name)?;

        let parent = stream
            .shard_mut(shard_id)
            .ok_or_else(|| shard_not_found(stream_name, shard_id))?;
        if !parent.shard.is_open() {
            return Err(ServiceError::invalid_argument(format!(
                "shard '{}' is already closed",
                shard_id
            )));
        }

        let start = parse_hash(&parent.shard.hash_key_range.starting_hash_key)?;
        let end = parse_hash(&parent.shard.hash_key_range.ending_hash_key)?;
        if start == end {
            return Err(ServiceError::invalid_argument(format!(
                "shard '{}' covers a single hash key and cannot be split",
                shard_id
            )));
        }
        let ending_sequence = match parent.records.last() {
            Some(record) => record.sequence_number.as_str().to_string(),
            None => parent
                .shard
                .sequence_number_range
                .starting_sequence_number
                .clone(),
        };
        parent.shard.sequence_number_range.ending_sequence_number = Some(ending_sequence);
        let mid = start + (end - start) / 2;

        let left_id = stream.allocate_shard_id();
        let right_id = stream.allocate_shard_id();
        for (id, range) in [
            (left_id.clone(), hash_range(start, mid)),
            (right_id.clone(), hash_range(mid + 1, end)),
        ] {
            let mut child = Shard::new(id, range, starting_sequence.clone());
            child.parent_shard_id = Some(shard_id.clone());
            stream.shards.push(ShardState {
                shard: child,
                records: Vec::new(),
            });
        }
        stream.shards.sort_by(|a, b| a.shard.shard_id.cmp(&b.shard.shard_id));

        Ok((left_id, right_id))
    }

    /// Invalidate every cursor issued so far.
    pub async fn expire_cursors(&self) {
        self.state.lock().await.cursor_epoch += 1;
    }

    /// Queue a fault for the next `put_records` call without one.
    pub async fn inject_put_fault(&self, fault: PutFault) {
        self.state.lock().await.put_faults.push_back(fault);
    }

    /// Records currently stored in `shard_id`, oldest first.
    pub async fn records(&self, stream_name: &str, shard_id: &ShardId) -> Vec<Record> {
        let state = self.state.lock().await;
        state
            .streams
            .get(stream_name)
            .and_then(|stream| stream.shard(shard_id))
            .map(|shard| shard.records.clone())
            .unwrap_or_default()
    }

    pub async fn put_calls(&self) -> usize {
        self.state.lock().await.put_calls
    }

    pub async fn shutdown_calls(&self) -> usize {
        self.state.lock().await.shutdown_calls
    }

    fn ensure_open(state: &State) -> Result<(), ServiceError> {
        if state.shut_down {
            return Err(ServiceError::new(
                ServiceErrorKind::Transport,
                "connection has been shut down",
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryStreamService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamService for InMemoryStreamService {
    async fn describe_shards(
        &self,
        stream_name: &str,
        exclusive_start_shard_id: Option<&ShardId>,
    ) -> Result<DescribeShardsPage, ServiceError> {
        let state = self.state.lock().await;
        Self::ensure_open(&state)?;
        let stream = stream_ref(&state.streams, stream_name)?;

        let mut remaining = stream
            .shards
            .iter()
            .filter(|s| exclusive_start_shard_id.map_or(true, |start| &s.shard.shard_id > start));

        let shards: Vec<Shard> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|s| s.shard.clone())
            .collect();
        let has_more_shards = remaining.next().is_some();

        Ok(DescribeShardsPage {
            shards,
            has_more_shards,
        })
    }

    async fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &ShardId,
        position: &IteratorPosition,
    ) -> Result<Cursor, ServiceError> {
        let state = self.state.lock().await;
        Self::ensure_open(&state)?;
        let stream = stream_ref(&state.streams, stream_name)?;
        let shard = stream
            .shard(shard_id)
            .ok_or_else(|| shard_not_found(stream_name, shard_id))?;

        let index = match position {
            IteratorPosition::TrimHorizon => 0,
            IteratorPosition::AfterSequenceNumber(seq) => {
                let found = shard
                    .records
                    .iter()
                    .position(|r| &r.sequence_number == seq)
                    .ok_or_else(|| {
                        ServiceError::invalid_argument(format!(
                            "sequence number {} is not in shard '{}'",
                            seq, shard_id
                        ))
                    })?;
                found + 1
            }
        };

        Ok(encode_cursor(state.cursor_epoch, stream_name, shard_id, index))
    }

    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<GetRecordsOutput, ServiceError> {
        if limit == 0 || limit > MAX_READ_LIMIT {
            return Err(ServiceError::invalid_argument(format!(
                "limit must be between 1 and {}",
                MAX_READ_LIMIT
            )));
        }

        let state = self.state.lock().await;
        Self::ensure_open(&state)?;
        let (epoch, stream_name, shard_id, index) = decode_cursor(cursor)?;
        if epoch != state.cursor_epoch {
            return Err(ServiceError::expired_iterator("iterator has expired"));
        }

        let stream = stream_ref(&state.streams, &stream_name)?;
        let shard = stream
            .shard(&shard_id)
            .ok_or_else(|| shard_not_found(&stream_name, &shard_id))?;

        let start = index.min(shard.records.len());
        let end = (start + limit).min(shard.records.len());
        let records = shard.records[start..end].to_vec();

        let caught_up = end == shard.records.len();
        let next_cursor = if caught_up && !shard.shard.is_open() {
            None
        } else {
            Some(encode_cursor(state.cursor_epoch, &stream_name, &shard_id, end))
        };

        let millis_behind_latest = match (records.last(), shard.records.last()) {
            (_, _) if caught_up => Some(0),
            (Some(read), Some(latest)) => Some(
                latest
                    .approximate_arrival_timestamp
                    .zip(read.approximate_arrival_timestamp)
                    .map(|(latest_ms, read_ms)| latest_ms.saturating_sub(read_ms).max(0) as u64)
                    .unwrap_or(0),
            ),
            _ => None,
        };

        Ok(GetRecordsOutput {
            records,
            next_cursor,
            millis_behind_latest,
        })
    }

    async fn put_records(
        &self,
        request: &PutRecordsRequest,
    ) -> Result<PutRecordsOutput, ServiceError> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;
        state.put_calls += 1;

        if request.entries.is_empty() {
            return Err(ServiceError::invalid_argument("request must contain at least one entry"));
        }
        stream_ref(&state.streams, &request.stream_name)?;

        let rejected = match state.put_faults.pop_front() {
            Some(PutFault::Error(e)) => return Err(e),
            Some(PutFault::Reject(positions)) => positions,
            None => Vec::new(),
        };

        let hash_keys = request
            .entries
            .iter()
            .map(routing_key)
            .collect::<Result<Vec<u128>, ServiceError>>()?;

        let arrival = now_ms();
        let mut outcomes = Vec::with_capacity(request.entries.len());
        for (i, (entry, hash_key)) in request.entries.iter().zip(hash_keys).enumerate() {
            if rejected.contains(&i) {
                outcomes.push(WriteOutcome::failed(
                    "ProvisionedThroughputExceededException",
                    "Rate exceeded for shard",
                ));
                continue;
            }

            let sequence_number = SequenceNumber::new(state.next_sequence.to_string());
            let stream = stream_mut(&mut state.streams, &request.stream_name)?;
            let shard = stream
                .shards
                .iter_mut()
                .find(|s| s.shard.is_open() && s.owns(hash_key))
                .ok_or_else(|| {
                    ServiceError::new(
                        ServiceErrorKind::Internal,
                        format!("no open shard owns hash key {}", hash_key),
                    )
                })?;

            let mut record = Record::new(
                sequence_number.clone(),
                entry.partition_key.clone(),
                entry.data.clone(),
            );
            record.approximate_arrival_timestamp = Some(arrival);
            shard.records.push(record);
            let shard_id = shard.shard.shard_id.clone();

            state.next_sequence += 1;
            outcomes.push(WriteOutcome::Accepted {
                sequence_number,
                shard_id,
            });
        }

        Ok(PutRecordsOutput { outcomes })
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        state.shutdown_calls += 1;
        state.shut_down = true;
        Ok(())
    }
}

fn stream_ref<'a>(
    streams: &'a HashMap<String, StreamState>,
    stream_name: &str,
) -> Result<&'a StreamState, ServiceError> {
    streams
        .get(stream_name)
        .ok_or_else(|| stream_not_found(stream_name))
}

fn stream_mut<'a>(
    streams: &'a mut HashMap<String, StreamState>,
    stream_name: &str,
) -> Result<&'a mut StreamState, ServiceError> {
    streams
        .get_mut(stream_name)
        .ok_or_else(|| stream_not_found(stream_name))
}

fn stream_not_found(stream_name: &str) -> ServiceError {
    ServiceError::resource_not_found(format!("stream '{}' not found", stream_name))
}

fn shard_not_found(stream_name: &str, shard_id: &ShardId) -> ServiceError {
    ServiceError::resource_not_found(format!(
        "shard '{}' not found in stream '{}'",
        shard_id, stream_name
    ))
}

fn hash_range(start: u128, end: u128) -> HashKeyRange {
    HashKeyRange {
        starting_hash_key: start.to_string(),
        ending_hash_key: end.to_string(),
    }
}

fn parse_hash(value: &str) -> Result<u128, ServiceError> {
    value
        .parse::<u128>()
        .map_err(|_| ServiceError::invalid_argument(format!("invalid hash key '{}'", value)))
}

fn routing_key(entry: &RecordEntry) -> Result<u128, ServiceError> {
    match &entry.explicit_hash_key {
        Some(explicit) => parse_hash(explicit),
        None => {
            let mut hasher = SipHasher::new();
            entry.partition_key.hash(&mut hasher);
            let hash = hasher.finish() as u128;
            Ok((hash << 64) | hash)
        }
    }
}

fn encode_cursor(epoch: u64, stream_name: &str, shard_id: &ShardId, index: usize) -> Cursor {
    Cursor::new(format!("{}|{}|{}|{}", epoch, stream_name, shard_id, index))
}

fn decode_cursor(cursor: &Cursor) -> Result<(u64, String, ShardId, usize), ServiceError> {
    let invalid = || ServiceError::invalid_argument("malformed shard iterator");
    let mut parts = cursor.as_str().rsplitn(3, '|');
    let index = parts.next().ok_or_else(invalid)?.parse::<usize>().map_err(|_| invalid())?;
    let shard_id = ShardId::new(parts.next().ok_or_else(invalid)?);
    let head = parts.next().ok_or_else(invalid)?;
    let (epoch, stream_name) = head.split_once('|').ok_or_else(invalid)?;
    let epoch = epoch.parse::<u64>().map_err(|_| invalid())?;
    Ok((epoch, stream_name.to_string(), shard_id, index))
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_token_round_trip_with_pipe_in_stream_name() {
        let cursor = encode_cursor(3, "team|orders", &ShardId::new("shardId-000000000001"), 42);
        let (epoch, stream, shard, index) = decode_cursor(&cursor).unwrap();
        assert_eq!(epoch, 3);
        assert_eq!(stream, "team|orders");
        assert_eq!(shard, ShardId::new("shardId-000000000001"));
        assert_eq!(index, 42);
    }

    #[test]
    fn test_malformed_cursor_rejected() {
        let err = decode_cursor(&Cursor::new("garbage")).unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::InvalidArgument);
    }

    #[test]
    fn test_routing_key_prefers_explicit_hash_key() {
        let entry = RecordEntry::new("user123", "x").with_explicit_hash_key("7");
        assert_eq!(routing_key(&entry).unwrap(), 7);

        let bad = RecordEntry::new("user123", "x").with_explicit_hash_key("not-a-number");
        assert!(routing_key(&bad).is_err());
    }

    #[test]
    fn test_routing_key_is_stable_for_partition_key() {
        let a = routing_key(&RecordEntry::new("user123", "x")).unwrap();
        let b = routing_key(&RecordEntry::new("user123", "y")).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_create_stream_covers_whole_hash_space() {
        let service = InMemoryStreamService::new();
        service.create_stream("orders", 3).await.unwrap();

        let page = service.describe_shards("orders", None).await.unwrap();
        assert_eq!(page.shards.len(), 3);
        assert!(!page.has_more_shards);
        assert_eq!(page.shards[0].hash_key_range.starting_hash_key, "0");
        assert_eq!(page.shards[2].hash_key_range.ending_hash_key, u128::MAX.to_string());
    }

    #[tokio::test]
    async fn test_describe_pages_respect_page_size() {
        let service = InMemoryStreamService::with_page_size(2);
        service.create_stream("orders", 5).await.unwrap();

        let first = service.describe_shards("orders", None).await.unwrap();
        assert_eq!(first.shards.len(), 2);
        assert!(first.has_more_shards);

        let last_id = first.shards[1].shard_id.clone();
        let second = service.describe_shards("orders", Some(&last_id)).await.unwrap();
        assert_eq!(second.shards[0].shard_id, ShardId::new("shardId-000000000002"));
    }

    #[tokio::test]
    async fn test_split_ends_parent_at_its_own_last_record() {
        let service = InMemoryStreamService::new();
        service.create_stream("orders", 2).await.unwrap();
        service.create_stream("audit", 1).await.unwrap();

        let shard_id = ShardId::new("shardId-000000000000");
        let request = PutRecordsRequest {
            stream_name: "orders".to_string(),
            entries: vec![RecordEntry::new("k", "v").with_explicit_hash_key("1")],
        };
        service.put_records(&request).await.unwrap();
        // Later writes elsewhere must not move the parent's end.
        let other = PutRecordsRequest {
            stream_name: "audit".to_string(),
            entries: vec![RecordEntry::new("k", "v"), RecordEntry::new("k", "w")],
        };
        service.put_records(&other).await.unwrap();

        service.split_shard("orders", &shard_id).await.unwrap();

        let page = service.describe_shards("orders", None).await.unwrap();
        let range = &page.shards[0].sequence_number_range;
        assert_eq!(range.starting_sequence_number, "1");
        assert_eq!(range.ending_sequence_number.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_split_before_any_write_ends_at_start() {
        let service = InMemoryStreamService::new();
        service.create_stream("orders", 1).await.unwrap();

        let shard_id = ShardId::new("shardId-000000000000");
        service.split_shard("orders", &shard_id).await.unwrap();

        let page = service.describe_shards("orders", None).await.unwrap();
        let range = &page.shards[0].sequence_number_range;
        assert_eq!(range.ending_sequence_number.as_deref(), Some("1"));
        assert_eq!(page.shards.len(), 3);
        assert!(page.shards[1].is_child_of(&shard_id));
        assert!(page.shards[2].is_child_of(&shard_id));
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let service = InMemoryStreamService::new();
        let err = service.describe_shards("missing", None).await.unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_calls_fail_after_shutdown() {
        let service = InMemoryStreamService::new();
        service.create_stream("orders", 1).await.unwrap();
        service.shutdown().await.unwrap();

        let err = service.describe_shards("orders", None).await.unwrap_err();
        assert_eq!(err.kind, ServiceErrorKind::Transport);
        assert_eq!(service.shutdown_calls().await, 1);
    }
}
